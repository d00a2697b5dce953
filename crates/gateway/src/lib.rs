//! Gateway: webhook HTTP server wiring parsing, media conversion and the
//! per-sender coalescing buffer.
//!
//! Lifecycle:
//! 1. Load + validate config
//! 2. Build collaborators (normalizer, media pipeline, reply generator, dispatcher)
//! 3. Start HTTP server (webhook, health)
//!
//! Webhook requests are always acknowledged; everything after parsing runs
//! through [`ingest::ingest_event`] and the buffer's timers.

pub mod ingest;
pub mod server;
pub mod state;

pub use {
    server::{build_gateway_app, start_gateway},
    state::GatewayState,
};
