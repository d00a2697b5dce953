use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("reply generation failed: {0:#}")]
    Generate(anyhow::Error),

    #[error("{stage} timed out after {after:?}")]
    Timeout { stage: &'static str, after: Duration },

    #[error(transparent)]
    Dispatch(#[from] murmur_channels::Error),

    #[error("worker panicked: {0}")]
    Worker(#[from] tokio::task::JoinError),
}

pub type Result<T> = std::result::Result<T, Error>;
