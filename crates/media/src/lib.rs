//! Media pipeline: download, decrypt, MIME mapping, image preparation and
//! conversion of attachments into text.

pub mod decrypt;
pub mod error;
pub mod fetch;
pub mod image_ops;
pub mod interpret;
pub mod keys;
pub mod mime;
pub mod pipeline;

pub use {
    decrypt::decrypt_media,
    error::{Error, Result},
    fetch::{FetchedMedia, MediaFetcher},
    interpret::{MediaInterpreter, MediaPayload},
    keys::{DerivedKeyMaterial, derive_keys},
    pipeline::MediaPipeline,
};
