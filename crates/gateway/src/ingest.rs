//! Webhook event → per-sender lanes → buffered fragments.

use std::{collections::HashMap, sync::Arc};

use {
    murmur_common::{InboundFragment, SenderId},
    serde_json::Value,
    tokio::sync::{Mutex, mpsc},
    tracing::{debug, info},
};

use murmur_whatsapp::{ParsedEvent, parse_event};

use crate::state::GatewayState;

type Lane = mpsc::UnboundedSender<Vec<InboundFragment>>;

/// One FIFO lane per sender, each drained by a single spawned task.
///
/// Fragments reach the buffer in webhook arrival order even when an earlier
/// event is still converting media. A lane's task exits once the lane is
/// empty; the empty check and the removal happen under the same lock as
/// submission, so nothing is sent to a lane that is shutting down.
#[derive(Default)]
pub struct IngestLanes {
    lanes: Mutex<HashMap<SenderId, Lane>>,
}

impl IngestLanes {
    /// Number of senders with unfinished work.
    pub async fn active(&self) -> usize {
        self.lanes.lock().await.len()
    }

    async fn submit(
        &self,
        state: &Arc<GatewayState>,
        sender: SenderId,
        fragments: Vec<InboundFragment>,
    ) {
        let mut lanes = self.lanes.lock().await;
        let fragments = match lanes.get(&sender) {
            Some(lane) => match lane.send(fragments) {
                Ok(()) => return,
                // The lane's task died; start a fresh one below.
                Err(mpsc::error::SendError(fragments)) => fragments,
            },
            None => fragments,
        };

        let (lane, rx) = mpsc::unbounded_channel();
        if lane.send(fragments).is_err() {
            return;
        }
        lanes.insert(sender.clone(), lane);
        tokio::spawn(drain_lane(Arc::clone(state), sender, rx));
    }
}

async fn drain_lane(
    state: Arc<GatewayState>,
    sender: SenderId,
    mut rx: mpsc::UnboundedReceiver<Vec<InboundFragment>>,
) {
    loop {
        let fragments = {
            let mut lanes = state.lanes.lanes.lock().await;
            match rx.try_recv() {
                Ok(fragments) => fragments,
                Err(_) => {
                    lanes.remove(&sender);
                    return;
                },
            }
        };

        for fragment in fragments {
            let fragment = match fragment {
                InboundFragment::MediaRef(media) => {
                    InboundFragment::text(state.media.to_text(&media).await)
                },
                text => text,
            };
            state.buffer.enqueue(sender.clone(), fragment).await;
        }
    }
}

/// Parse one provider event and queue its fragments on the sender's lane.
///
/// Returns immediately; media conversion and buffering run on the lane's
/// task. Returns the number of fragments queued.
pub async fn ingest_event(state: &Arc<GatewayState>, event: &Value) -> usize {
    let message = match parse_event(event) {
        ParsedEvent::Message(message) => message,
        ParsedEvent::Skip(reason) => {
            debug!(reason = reason.as_str(), "webhook event skipped");
            return 0;
        },
    };

    let sender = match state.normalizer.canonicalize(&message.sender) {
        Ok(sender) => sender,
        Err(e) => {
            debug!(error = %e, "webhook event skipped");
            return 0;
        },
    };

    if message.fragments.is_empty() {
        debug!(sender = %sender, "message carried no supported content");
        return 0;
    }

    let queued = message.fragments.len();
    info!(sender = %sender, fragments = queued, "inbound message");
    state.lanes.submit(state, sender, message.fragments).await;
    queued
}
