//! Streamed download of attachments into scoped temporary storage.

use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use {
    futures::StreamExt,
    reqwest::header::HeaderMap,
    tempfile::TempDir,
    tokio::io::AsyncWriteExt,
    tracing::debug,
};

use crate::error::{Context, Error, Result};

/// Default host that relative media paths are resolved against.
pub const DEFAULT_MEDIA_HOST: &str = "https://mmg.whatsapp.net";

/// Default download cap. Matches the Whisper upload limit.
pub const DEFAULT_MAX_BYTES: u64 = 25 * 1024 * 1024;

/// Downloads attachments over HTTP.
#[derive(Debug, Clone)]
pub struct MediaFetcher {
    client: reqwest::Client,
    media_host: String,
    timeout: Duration,
    max_bytes: u64,
}

/// A downloaded attachment on disk.
///
/// Owns its temporary directory; dropping the handle deletes the file.
#[derive(Debug)]
pub struct FetchedMedia {
    _dir: TempDir,
    path: PathBuf,
}

impl FetchedMedia {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the whole download into memory.
    pub async fn read(&self) -> Result<Vec<u8>> {
        Ok(tokio::fs::read(&self.path).await?)
    }
}

impl MediaFetcher {
    pub fn new(client: reqwest::Client, media_host: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client,
            media_host: media_host.into(),
            timeout,
            max_bytes: DEFAULT_MAX_BYTES,
        }
    }

    /// Abort downloads larger than `max_bytes`.
    #[must_use]
    pub fn with_max_bytes(mut self, max_bytes: u64) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    /// Absolute URL for `url`, joining relative paths onto the media host.
    pub fn resolve_url(&self, url: &str) -> String {
        if url.starts_with("http://") || url.starts_with("https://") {
            return url.to_string();
        }
        let host = self.media_host.trim_end_matches('/');
        if url.starts_with('/') {
            format!("{host}{url}")
        } else {
            format!("{host}/{url}")
        }
    }

    /// Stream `url` into `download{ext}` inside a fresh temporary directory.
    ///
    /// Fails with [`Error::TooLarge`] as soon as the body exceeds the cap;
    /// the partial file is removed with its directory.
    pub async fn fetch(&self, url: &str, ext: &str, headers: HeaderMap) -> Result<FetchedMedia> {
        let full_url = self.resolve_url(url);

        let response = self
            .client
            .get(&full_url)
            .headers(headers)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| Error::external("media request failed", e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Status {
                status: status.as_u16(),
                url: full_url,
            });
        }
        if response
            .content_length()
            .is_some_and(|len| len > self.max_bytes)
        {
            return Err(Error::TooLarge {
                limit: self.max_bytes,
            });
        }

        let dir = tempfile::Builder::new()
            .prefix("murmur-media-")
            .tempdir()
            .context("creating media temp dir")?;
        let path = dir.path().join(format!("download{ext}"));
        let mut file = tokio::fs::File::create(&path).await?;

        let mut size = 0u64;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| Error::external("reading media body", e))?;
            size += chunk.len() as u64;
            if size > self.max_bytes {
                return Err(Error::TooLarge {
                    limit: self.max_bytes,
                });
            }
            file.write_all(&chunk).await?;
        }
        file.flush().await?;
        drop(file);

        debug!(url = %full_url, bytes = size, "media downloaded");

        Ok(FetchedMedia { _dir: dir, path })
    }
}
