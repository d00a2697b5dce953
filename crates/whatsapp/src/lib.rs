//! WhatsApp provider glue: sender normalization, webhook payload parsing
//! and the Wasender outbound gateway.

pub mod error;
pub mod normalize;
pub mod outbound;
pub mod payload;

pub use {
    error::{Error, Result},
    normalize::SenderNormalizer,
    outbound::WasenderOutbound,
    payload::{ParsedEvent, ParsedMessage, SkipReason, parse_event},
};
