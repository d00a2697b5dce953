//! Shared types and error plumbing used across all murmur crates.

pub mod error;
pub mod types;

pub use {
    error::{Error, FromMessage, Result},
    types::{InboundFragment, MediaKey, MediaKind, MediaRef, SenderId},
};
