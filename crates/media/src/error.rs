use std::error::Error as StdError;

use murmur_common::FromMessage;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("{context}: {source}")]
    External {
        context: String,
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },

    #[error("media download failed with status {status}: {url}")]
    Status { status: u16, url: String },

    #[error("media exceeds the {limit}-byte download limit")]
    TooLarge { limit: u64 },

    #[error("decryption failed: {message}")]
    Decrypt { message: String },

    #[error("unsupported media: {message}")]
    Unsupported { message: String },

    #[error("{message}")]
    InvalidInput { message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Image(#[from] image::ImageError),
}

impl Error {
    #[must_use]
    pub fn external<E>(context: impl Into<String>, source: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self::External {
            context: context.into(),
            source: Box::new(source),
        }
    }

    #[must_use]
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn decrypt(message: impl Into<String>) -> Self {
        Self::Decrypt {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::Unsupported {
            message: message.into(),
        }
    }
}

impl FromMessage for Error {
    fn from_message(message: String) -> Self {
        Self::InvalidInput { message }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

murmur_common::impl_context!();
