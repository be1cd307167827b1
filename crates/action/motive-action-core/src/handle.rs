//! Cloneable cross-thread handle to one action.
//!
//! A handle only enqueues commands; nothing executes until the scheduling
//! thread drains its queue at the start of the next tick. Sends are
//! fire-and-forget: if the scheduler is gone the command is silently
//! dropped, mirroring how late UI input against a closed document behaves.

use crossbeam_channel::Sender;

use crate::commands::Command;
use crate::data::ClipData;
use crate::ids::ActionId;
use crate::interp::Curve;
use crate::node::LoopLimit;
use crate::target::ActionTarget;
use crate::value::Value;

/// Remote control for one action living on a scheduling thread.
#[derive(Clone, Debug)]
pub struct ActionHandle {
    id: ActionId,
    tx: Sender<Command>,
}

impl ActionHandle {
    pub(crate) fn new(id: ActionId, tx: Sender<Command>) -> Self {
        Self { id, tx }
    }

    /// The stable identity of the action behind this handle.
    #[inline]
    pub fn id(&self) -> ActionId {
        self.id
    }

    #[inline]
    fn send(&self, command: Command) {
        let _ = self.tx.send(command);
    }

    /// Start playing the tree containing this action from its current
    /// position.
    pub fn play(&self) {
        self.send(Command::Play(self.id));
    }

    /// Freeze the tree containing this action at its current position.
    pub fn stop(&self) {
        self.send(Command::Stop(self.id));
    }

    /// Reposition this action at `time` within its own timeline.
    pub fn seek(&self, time: u64) {
        self.send(Command::Seek { id: self.id, time });
    }

    /// Seek, then ensure the tree is playing, as one atomic step.
    pub fn seek_play(&self, time: u64) {
        self.send(Command::SeekPlay { id: self.id, time });
    }

    /// Seek, then ensure the tree is stopped, as one atomic step.
    pub fn seek_stop(&self, time: u64) {
        self.send(Command::SeekStop { id: self.id, time });
    }

    pub fn set_loop(&self, limit: LoopLimit) {
        self.send(Command::SetLoop { id: self.id, limit });
    }

    pub fn set_speed(&self, speed: f32) {
        self.send(Command::SetSpeed { id: self.id, speed });
    }

    pub fn set_delay(&self, delay: u64) {
        self.send(Command::SetDelay { id: self.id, delay });
    }

    /// Append `child` as this composite's last child.
    pub fn append(&self, child: &ActionHandle) {
        self.send(Command::Append {
            parent: self.id,
            child: child.id,
        });
    }

    /// Insert `child` at `index` among this composite's children.
    pub fn insert(&self, index: usize, child: &ActionHandle) {
        self.send(Command::Insert {
            parent: self.id,
            index,
            child: child.id,
        });
    }

    /// Insert `sibling` immediately before this action under its parent.
    pub fn before(&self, sibling: &ActionHandle) {
        self.send(Command::Before {
            anchor: self.id,
            sibling: sibling.id,
        });
    }

    /// Insert `sibling` immediately after this action under its parent.
    pub fn after(&self, sibling: &ActionHandle) {
        self.send(Command::After {
            anchor: self.id,
            sibling: sibling.id,
        });
    }

    /// Detach this action from its parent.
    pub fn remove(&self) {
        self.send(Command::Remove(self.id));
    }

    /// Attach the external mutation target. Only valid on a root.
    pub fn set_target(&self, target: Box<dyn ActionTarget>) {
        self.send(Command::SetTarget {
            id: self.id,
            target,
        });
    }

    /// Detach the target; the tree stops playing as a side effect.
    pub fn del_target(&self) {
        self.send(Command::DelTarget(self.id));
    }

    /// Append a keyframe at `time` with the given easing curve.
    pub fn add_frame(&self, time: u64, curve: Curve) {
        self.send(Command::AddFrame {
            id: self.id,
            time,
            curve,
        });
    }

    /// Load a whole clip description as frames.
    pub fn load_clip(&self, clip: ClipData) {
        self.send(Command::LoadClip { id: self.id, clip });
    }

    /// Set one property value on one frame.
    pub fn set_frame_value(&self, frame: usize, key: impl Into<String>, value: Value) {
        self.send(Command::SetFrameValue {
            id: self.id,
            frame,
            key: key.into(),
            value,
        });
    }

    /// Schedule destruction of this action and its subtree. Other clones of
    /// the handle become stale.
    pub fn release(self) {
        self.send(Command::Release(self.id));
    }
}
