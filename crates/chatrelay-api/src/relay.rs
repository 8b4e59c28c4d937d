//! Stream relay: one upstream completion forwarded to one connection.
//!
//! Each inbound chat message gets its own relay. A relay moves through
//! `Idle -> RequestSent -> Streaming { first_token } -> Terminated`; the
//! first fragment it writes carries the `"AI: "` marker, the rest are sent
//! verbatim in upstream order. Failures end the relay quietly: the client
//! just stops receiving tokens.

use chatrelay_runtime::llm_driver::{CompletionRequest, LlmDriver, LlmError, StreamEnd, StreamEvent};
use chatrelay_types::wire::{ConnectionId, OutboundFrame};
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Deltas buffered between the driver and the frame writer.
const EVENT_BUFFER: usize = 64;

/// Lifecycle of a single relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayPhase {
    Idle,
    RequestSent,
    Streaming { first_token: bool },
    Terminated,
}

/// Turns upstream fragments into outbound frames, prefixing only the first.
#[derive(Debug)]
pub struct ReplyFramer {
    phase: RelayPhase,
}

impl Default for ReplyFramer {
    fn default() -> Self {
        Self::new()
    }
}

impl ReplyFramer {
    pub fn new() -> Self {
        Self {
            phase: RelayPhase::Idle,
        }
    }

    pub fn phase(&self) -> RelayPhase {
        self.phase
    }

    /// The upstream request has been issued.
    pub fn request_sent(&mut self) {
        self.phase = RelayPhase::RequestSent;
    }

    /// The upstream response arrived; the next fragment is the first.
    pub fn response_started(&mut self) {
        self.phase = RelayPhase::Streaming { first_token: true };
    }

    /// Frame one fragment. Empty fragments never reach here.
    pub fn frame(&mut self, fragment: String) -> OutboundFrame {
        match self.phase {
            RelayPhase::Streaming { first_token: false } => {
                OutboundFrame::continuation(fragment)
            }
            _ => {
                self.phase = RelayPhase::Streaming { first_token: false };
                OutboundFrame::first(&fragment)
            }
        }
    }

    pub fn terminate(&mut self) {
        self.phase = RelayPhase::Terminated;
    }
}

/// What a finished relay did.
#[derive(Debug)]
pub struct RelayOutcome {
    /// Frames accepted by the connection writer.
    pub frames_sent: usize,
    /// How the upstream stream ended.
    pub result: Result<StreamEnd, LlmError>,
}

/// Run one relay to completion.
///
/// Issues exactly one upstream request for `request` and writes every
/// fragment to `frames` as it arrives. There is no retry and no
/// cancellation: if the connection goes away the upstream stream is still
/// drained and the undeliverable frames are dropped.
pub async fn relay_message(
    conn_id: ConnectionId,
    driver: &dyn LlmDriver,
    request: CompletionRequest,
    frames: &mpsc::Sender<OutboundFrame>,
) -> RelayOutcome {
    let (tx, mut rx) = mpsc::channel(EVENT_BUFFER);
    let mut framer = ReplyFramer::new();
    framer.request_sent();

    let upstream = driver.stream(request, tx);
    let forward = async {
        let mut sent = 0usize;
        while let Some(event) = rx.recv().await {
            let text = match event {
                StreamEvent::Started => {
                    framer.response_started();
                    continue;
                }
                StreamEvent::TextDelta { text } => text,
            };
            let frame = framer.frame(text);
            if frames.send(frame).await.is_ok() {
                sent += 1;
            } else {
                debug!(conn_id = %conn_id, "Connection writer closed, dropping frame");
            }
        }
        sent
    };

    let (result, frames_sent) = tokio::join!(upstream, forward);
    framer.terminate();

    match &result {
        Ok(end) => debug!(conn_id = %conn_id, frames_sent, ?end, "Relay finished"),
        Err(e @ LlmError::Stream(_)) => {
            warn!(conn_id = %conn_id, frames_sent, error = %e, "Error reading upstream stream")
        }
        Err(e) => warn!(conn_id = %conn_id, error = %e, "Error calling language model API"),
    }

    RelayOutcome {
        frames_sent,
        result,
    }
}
