//! Fire-and-forget notifications posted while advancing.
//!
//! The scheduling loop never waits for or depends on delivery; events go out
//! over a channel whose receiver lives wherever the embedder wants (UI
//! thread, script bindings, test harness).

use crossbeam_channel::Sender;

use crate::ids::ActionId;

/// Discrete signals emitted during `advance`/`seek`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ActionEvent {
    /// An action wrapped around to the start of another loop pass.
    Loop {
        action: ActionId,
        /// Completed passes so far, including the one that just ended.
        looped: u32,
        /// Unconsumed scaled time carried into the new pass.
        leftover: u64,
    },
    /// A keyframe boundary was reached.
    Keyframe {
        action: ActionId,
        frame: usize,
        /// Scaled time left over after landing on the frame.
        leftover: u64,
    },
}

/// Event sender wrapper held by the stage.
///
/// Emission is silent when no receiver is connected, and send errors are
/// ignored (the receiver may have been dropped).
#[derive(Clone, Debug, Default)]
pub struct EventSender {
    sender: Option<Sender<ActionEvent>>,
}

impl EventSender {
    /// Create an event sender connected to a channel.
    pub fn new(sender: Sender<ActionEvent>) -> Self {
        Self {
            sender: Some(sender),
        }
    }

    /// Create a disconnected sender (for tests or headless use).
    pub fn dummy() -> Self {
        Self { sender: None }
    }

    /// Emit an event, silently dropping it if nobody listens.
    pub fn emit(&self, event: ActionEvent) {
        if let Some(ref tx) = self.sender {
            let _ = tx.send(event);
        }
    }
}
