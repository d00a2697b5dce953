//! Attachment to text: fetch, decrypt, interpret.

use std::{sync::Arc, time::Duration};

use {
    murmur_common::MediaRef,
    reqwest::header::HeaderMap,
    tracing::{debug, warn},
};

use crate::{
    decrypt::decrypt_media,
    fetch::MediaFetcher,
    interpret::{MediaInterpreter, MediaPayload, tagged},
    mime::extension_for,
};

/// Default bound on one interpreter call.
pub const DEFAULT_INTERPRET_TIMEOUT: Duration = Duration::from_secs(60);

/// Converts a [`MediaRef`] into a text fragment.
///
/// Never fails: an unsupported kind, a download failure, or an
/// interpretation failure or timeout yields the configured apology text so
/// the sender still gets a reply. A decrypt failure falls back to the raw
/// downloaded bytes.
#[derive(Clone)]
pub struct MediaPipeline {
    fetcher: MediaFetcher,
    interpreter: Arc<dyn MediaInterpreter>,
    unavailable_text: String,
    interpret_timeout: Duration,
}

impl MediaPipeline {
    pub fn new(
        fetcher: MediaFetcher,
        interpreter: Arc<dyn MediaInterpreter>,
        unavailable_text: impl Into<String>,
    ) -> Self {
        Self {
            fetcher,
            interpreter,
            unavailable_text: unavailable_text.into(),
            interpret_timeout: DEFAULT_INTERPRET_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_interpret_timeout(mut self, timeout: Duration) -> Self {
        self.interpret_timeout = timeout;
        self
    }

    pub async fn to_text(&self, media: &MediaRef) -> String {
        if !self.interpreter.supports(media.kind) {
            debug!(kind = %media.kind, "no interpreter for media kind, skipping download");
            return self.unavailable_text.clone();
        }

        let ext = extension_for(media.kind, &media.mime);

        let fetched = match self.fetcher.fetch(&media.url, ext, HeaderMap::new()).await {
            Ok(fetched) => fetched,
            Err(e) => {
                warn!(kind = %media.kind, error = %e, "media download failed");
                return self.unavailable_text.clone();
            },
        };
        let raw = match fetched.read().await {
            Ok(raw) => raw,
            Err(e) => {
                warn!(kind = %media.kind, error = %e, "reading downloaded media failed");
                return self.unavailable_text.clone();
            },
        };

        let data = match &media.key {
            Some(key) => match decrypt_media(&raw, key, media.kind) {
                Ok(plain) => {
                    debug!(kind = %media.kind, bytes = plain.len(), "media decrypted");
                    plain
                },
                Err(e) => {
                    warn!(kind = %media.kind, error = %e, "decryption failed, using raw bytes");
                    raw
                },
            },
            None => raw,
        };

        let payload = MediaPayload {
            kind: media.kind,
            mime: media.mime.clone(),
            filename: format!("{}{ext}", media.kind),
            data,
        };
        match tokio::time::timeout(self.interpret_timeout, self.interpreter.interpret(&payload))
            .await
        {
            Ok(Ok(text)) => tagged(media.kind, &text),
            Ok(Err(e)) => {
                warn!(kind = %media.kind, error = %e, "media interpretation failed");
                self.unavailable_text.clone()
            },
            Err(_) => {
                warn!(
                    kind = %media.kind,
                    after = ?self.interpret_timeout,
                    "media interpretation timed out"
                );
                self.unavailable_text.clone()
            },
        }
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::{Error, Result},
        async_trait::async_trait,
        murmur_common::{MediaKey, MediaKind},
        std::{sync::Mutex, time::Duration},
    };

    const SECRET_B64: &str = "AAECAwQFBgcICQoLDA0ODxAREhMUFRYXGBkaGxwdHh8=";
    const AUDIO_CIPHERTEXT: &str = "23e878ca755220cdae43270ccc933dc626ac39f7f0c5572a9a3d51b3d86573e6ba5ac47760c25e739cd6";
    const SORRY: &str = "[attachment unavailable]";

    /// Echoes the payload as UTF-8 (lossy) and records filenames.
    #[derive(Default)]
    struct EchoInterpreter {
        seen: Mutex<Vec<String>>,
        fail: bool,
        stall: bool,
        audio_only: bool,
    }

    #[async_trait]
    impl MediaInterpreter for EchoInterpreter {
        async fn interpret(&self, media: &MediaPayload) -> Result<String> {
            self.seen.lock().unwrap().push(media.filename.clone());
            if self.stall {
                std::future::pending::<()>().await;
            }
            if self.fail {
                return Err(Error::unsupported("no model"));
            }
            Ok(String::from_utf8_lossy(&media.data).into_owned())
        }

        fn supports(&self, kind: MediaKind) -> bool {
            !self.audio_only || kind == MediaKind::Audio
        }
    }

    fn pipeline(host: &str, interpreter: Arc<EchoInterpreter>) -> MediaPipeline {
        let fetcher = MediaFetcher::new(reqwest::Client::new(), host, Duration::from_secs(5));
        MediaPipeline::new(fetcher, interpreter, SORRY)
    }

    fn audio_ref(key: Option<MediaKey>) -> MediaRef {
        MediaRef {
            url: "/v/t62/voice.enc".into(),
            key,
            mime: "audio/ogg; codecs=opus".into(),
            kind: MediaKind::Audio,
        }
    }

    async fn serve_vector(server: &mut mockito::ServerGuard) -> mockito::Mock {
        server
            .mock("GET", "/v/t62/voice.enc")
            .with_body(hex::decode(AUDIO_CIPHERTEXT).unwrap())
            .create_async()
            .await
    }

    #[tokio::test]
    async fn encrypted_voice_note_becomes_tagged_text() {
        let mut server = mockito::Server::new_async().await;
        let _m = serve_vector(&mut server).await;
        let interp = Arc::new(EchoInterpreter::default());

        let key = MediaKey::from_base64(SECRET_B64).unwrap();
        let text = pipeline(&server.url(), interp.clone())
            .to_text(&audio_ref(Some(key)))
            .await;

        assert_eq!(text, "[voice message] voice note: see you at noon");
        assert_eq!(*interp.seen.lock().unwrap(), vec!["audio.ogg".to_string()]);
    }

    #[tokio::test]
    async fn decrypt_failure_falls_back_to_raw_bytes() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/v/t62/voice.enc")
            .with_body("plain audio")
            .create_async()
            .await;
        let interp = Arc::new(EchoInterpreter::default());

        let text = pipeline(&server.url(), interp)
            .to_text(&audio_ref(Some(MediaKey::new([9; 32]))))
            .await;
        assert_eq!(text, "[voice message] plain audio");
    }

    #[tokio::test]
    async fn download_failure_yields_apology() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/v/t62/voice.enc")
            .with_status(403)
            .create_async()
            .await;
        let interp = Arc::new(EchoInterpreter::default());

        let text = pipeline(&server.url(), interp.clone())
            .to_text(&audio_ref(None))
            .await;
        assert_eq!(text, SORRY);
        assert!(interp.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn interpreter_failure_yields_apology() {
        let mut server = mockito::Server::new_async().await;
        let _m = serve_vector(&mut server).await;
        let interp = Arc::new(EchoInterpreter {
            fail: true,
            ..Default::default()
        });

        let text = pipeline(&server.url(), interp).to_text(&audio_ref(None)).await;
        assert_eq!(text, SORRY);
    }

    #[tokio::test]
    async fn stalled_interpreter_times_out_with_apology() {
        let mut server = mockito::Server::new_async().await;
        let _m = serve_vector(&mut server).await;
        let interp = Arc::new(EchoInterpreter {
            stall: true,
            ..Default::default()
        });

        let text = pipeline(&server.url(), interp.clone())
            .with_interpret_timeout(Duration::from_millis(50))
            .to_text(&audio_ref(None))
            .await;
        assert_eq!(text, SORRY);
        assert_eq!(interp.seen.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn unsupported_kind_is_not_downloaded() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", mockito::Matcher::Any)
            .expect(0)
            .create_async()
            .await;
        let interp = Arc::new(EchoInterpreter {
            audio_only: true,
            ..Default::default()
        });

        let video = MediaRef {
            url: "/v/t62/clip.enc".into(),
            key: None,
            mime: "video/mp4".into(),
            kind: MediaKind::Video,
        };
        let text = pipeline(&server.url(), interp.clone()).to_text(&video).await;
        assert_eq!(text, SORRY);
        assert!(interp.seen.lock().unwrap().is_empty());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn oversized_download_yields_apology() {
        let mut server = mockito::Server::new_async().await;
        let _m = serve_vector(&mut server).await;
        let interp = Arc::new(EchoInterpreter::default());

        let fetcher = MediaFetcher::new(reqwest::Client::new(), server.url(), Duration::from_secs(5))
            .with_max_bytes(8);
        let text = MediaPipeline::new(fetcher, interp.clone(), SORRY)
            .to_text(&audio_ref(None))
            .await;
        assert_eq!(text, SORRY);
        assert!(interp.seen.lock().unwrap().is_empty());
    }
}
