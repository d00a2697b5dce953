//! Outbound messaging seam.
//!
//! The coalescing buffer hands finished replies to a [`ChannelOutbound`];
//! concrete gateways (Wasender, test recorders) implement it.

pub mod error;
pub mod plugin;

pub use {
    error::{Error, Result},
    plugin::ChannelOutbound,
};
