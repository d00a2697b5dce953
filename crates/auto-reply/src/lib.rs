//! Inbound coalescing and reply pipeline.
//!
//! Flow: fragment → per-sender batch (debounced) → one reply generation per
//! quiet period → dispatch back through the channel outbound.

pub mod coalesce;
pub mod error;
pub mod reply;

pub use {
    coalesce::{CoalesceConfig, CoalescingBuffer},
    error::{Error, Result},
    reply::ReplyGenerator,
};
