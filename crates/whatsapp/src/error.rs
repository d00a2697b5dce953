#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Identifier does not match the canonical pattern after normalization.
    #[error("invalid sender identifier {raw:?} (normalized to {normalized:?})")]
    InvalidSender { raw: String, normalized: String },

    #[error("invalid sender pattern: {0}")]
    Pattern(#[from] regex::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
