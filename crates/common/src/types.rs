//! Domain types shared between the parser, the media pipeline and the buffer.

use std::fmt;

use {
    base64::{Engine, engine::general_purpose::STANDARD},
    serde::{Deserialize, Serialize},
    zeroize::{Zeroize, ZeroizeOnDrop},
};

use crate::error::{Error, Result};

/// Canonical sender identifier: country-prefixed digits, no separators.
///
/// Only construct this from an identifier that has already been normalized
/// and validated; it is used verbatim as a map key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SenderId(String);

impl SenderId {
    pub fn from_canonical(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SenderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Media category; selects the key-derivation label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Audio,
    Image,
    Video,
    Document,
}

impl MediaKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Audio => "audio",
            Self::Image => "image",
            Self::Video => "video",
            Self::Document => "document",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 32-byte media secret delivered alongside encrypted attachments.
///
/// Wiped from memory on drop.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct MediaKey([u8; MEDIA_KEY_LEN]);

const MEDIA_KEY_LEN: usize = 32;

impl MediaKey {
    pub const LEN: usize = MEDIA_KEY_LEN;

    pub fn new(bytes: [u8; Self::LEN]) -> Self {
        Self(bytes)
    }

    /// Decode the base64 `mediaKey` field of a provider payload.
    pub fn from_base64(encoded: &str) -> Result<Self> {
        let mut decoded = STANDARD.decode(encoded.trim())?;
        let result = <[u8; Self::LEN]>::try_from(decoded.as_slice())
            .map(Self)
            .map_err(|_| Error::MediaKeyLength {
                expected: Self::LEN,
                actual: decoded.len(),
            });
        decoded.zeroize();
        result
    }

    pub fn as_bytes(&self) -> &[u8; Self::LEN] {
        &self.0
    }
}

impl fmt::Debug for MediaKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("MediaKey([REDACTED])")
    }
}

/// Pointer to a remote attachment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaRef {
    /// Absolute URL or a path relative to the media host.
    pub url: String,
    /// Present for encrypted media, absent for directly fetchable media.
    pub key: Option<MediaKey>,
    pub mime: String,
    pub kind: MediaKind,
}

/// One unit of inbound content extracted from a provider event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundFragment {
    Text { body: String },
    MediaRef(MediaRef),
}

impl InboundFragment {
    pub fn text(body: impl Into<String>) -> Self {
        Self::Text { body: body.into() }
    }

    /// Text body, if this fragment is text (or text-equivalent media).
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text { body } => Some(body),
            Self::MediaRef(_) => None,
        }
    }
}
