//! Single-thread owner of a scheduling domain.
//!
//! A `Scheduler` bundles the stage, the center, and the command queue. The
//! thread that owns it is the scheduling thread: it calls [`tick`] once per
//! frame, which first drains commands queued by [`ActionHandle`] clones on
//! other threads and then pumps the center. All direct methods are for use
//! on the scheduling thread itself and report errors eagerly; the handle
//! path is deferred and reports failures through the log.
//!
//! [`tick`]: Scheduler::tick

use crossbeam_channel::{unbounded, Receiver, Sender};

use crate::center::ActionCenter;
use crate::commands::Command;
use crate::error::ActionError;
use crate::events::{ActionEvent, EventSender};
use crate::handle::ActionHandle;
use crate::ids::{ActionId, DomainId};
use crate::stage::Stage;

pub struct Scheduler {
    stage: Stage,
    center: ActionCenter,
    tx: Sender<Command>,
    rx: Receiver<Command>,
}

impl Scheduler {
    /// Scheduler with no event listener.
    pub fn new(domain: DomainId) -> Self {
        Self::build(domain, EventSender::dummy())
    }

    /// Scheduler that posts [`ActionEvent`]s to `events`.
    pub fn with_events(domain: DomainId, events: Sender<ActionEvent>) -> Self {
        Self::build(domain, EventSender::new(events))
    }

    fn build(domain: DomainId, events: EventSender) -> Self {
        let (tx, rx) = unbounded();
        Self {
            stage: Stage::new(domain, events),
            center: ActionCenter::new(),
            tx,
            rx,
        }
    }

    #[inline]
    pub fn domain(&self) -> DomainId {
        self.stage.domain()
    }

    #[inline]
    pub fn stage(&self) -> &Stage {
        &self.stage
    }

    #[inline]
    pub fn stage_mut(&mut self) -> &mut Stage {
        &mut self.stage
    }

    /// Number of trees currently playing.
    pub fn playing_count(&self) -> usize {
        self.center.len()
    }

    // ------------------------------------------------------------- creation

    pub fn spawn(&mut self) -> ActionHandle {
        let id = self.stage.spawn();
        ActionHandle::new(id, self.tx.clone())
    }

    pub fn sequence(&mut self) -> ActionHandle {
        let id = self.stage.sequence();
        ActionHandle::new(id, self.tx.clone())
    }

    pub fn keyframe(&mut self) -> ActionHandle {
        let id = self.stage.keyframe();
        ActionHandle::new(id, self.tx.clone())
    }

    /// A fresh handle for an existing action, shippable to another thread.
    pub fn handle(&self, id: ActionId) -> ActionHandle {
        ActionHandle::new(id, self.tx.clone())
    }

    // ----------------------------------------------------- direct operations

    /// Start playing the tree containing `id`. The root must carry a target;
    /// without one there is nothing to animate and the request is refused
    /// with [`ActionError::UnsupportedOperation`].
    pub fn play(&mut self, id: ActionId) -> Result<(), ActionError> {
        let root = self.stage.root_of(id).ok_or(ActionError::Expired)?;
        if !self.stage.has_target(root) {
            return Err(ActionError::UnsupportedOperation);
        }
        self.center.register(&mut self.stage, root);
        Ok(())
    }

    /// Freeze the tree containing `id` at its current position.
    pub fn stop(&mut self, id: ActionId) -> Result<(), ActionError> {
        let root = self.stage.root_of(id).ok_or(ActionError::Expired)?;
        self.center.deregister(&mut self.stage, root);
        Ok(())
    }

    pub fn seek(&mut self, id: ActionId, time: u64) -> Result<(), ActionError> {
        self.stage.seek(id, time)
    }

    /// Seek and play without an observable intermediate state.
    pub fn seek_play(&mut self, id: ActionId, time: u64) -> Result<(), ActionError> {
        self.stage.seek(id, time)?;
        self.play(id)
    }

    /// Seek and stop without an observable intermediate state.
    pub fn seek_stop(&mut self, id: ActionId, time: u64) -> Result<(), ActionError> {
        self.stage.seek(id, time)?;
        self.stop(id)
    }

    /// Detach the root's target; the tree stops playing as a side effect.
    pub fn del_target(&mut self, id: ActionId) -> Result<(), ActionError> {
        self.stage.del_target(id)?;
        self.center.deregister(&mut self.stage, id);
        Ok(())
    }

    /// Destroy `id` and its subtree, deregistering it first if playing.
    pub fn release(&mut self, id: ActionId) {
        if self.stage.slot_of(id).is_some() {
            self.center.deregister(&mut self.stage, id);
        }
        self.stage.destroy(id);
    }

    // ----------------------------------------------------------------- tick

    /// One frame: drain queued commands, then advance every playing tree.
    /// `now` is a monotonic timestamp in milliseconds.
    pub fn tick(&mut self, now: u64) {
        self.drain();
        self.center.advance(&mut self.stage, now);
    }

    /// Apply every queued command in FIFO order without advancing time.
    pub fn drain(&mut self) {
        while let Ok(command) = self.rx.try_recv() {
            self.apply(command);
        }
    }

    fn apply(&mut self, command: Command) {
        let result = match command {
            Command::Play(id) => self.play(id),
            Command::Stop(id) => self.stop(id),
            Command::Seek { id, time } => self.seek(id, time),
            Command::SeekPlay { id, time } => self.seek_play(id, time),
            Command::SeekStop { id, time } => self.seek_stop(id, time),
            Command::SetLoop { id, limit } => self.stage.set_loop(id, limit),
            Command::SetSpeed { id, speed } => self.stage.set_speed(id, speed),
            Command::SetDelay { id, delay } => self.stage.set_delay(id, delay),
            Command::Append { parent, child } => self.stage.append(parent, child),
            Command::Insert { parent, index, child } => self.stage.insert(parent, index, child),
            Command::Before { anchor, sibling } => self.stage.insert_before(anchor, sibling),
            Command::After { anchor, sibling } => self.stage.insert_after(anchor, sibling),
            Command::Remove(id) => self.stage.remove(id),
            Command::SetTarget { id, target } => self.stage.set_target(id, target),
            Command::DelTarget(id) => self.del_target(id),
            Command::AddFrame { id, time, curve } => {
                self.stage.add_frame(id, time, curve).map(|_| ())
            }
            Command::SetFrameValue { id, frame, key, value } => {
                self.stage.set_frame_value(id, frame, &key, value)
            }
            Command::LoadClip { id, clip } => self.stage.load_clip(id, &clip).map(|_| ()),
            Command::Release(id) => {
                self.release(id);
                Ok(())
            }
        };
        match result {
            Ok(()) => {}
            Err(err @ ActionError::NoParent) => log::error!("command rejected: {err}"),
            Err(err) => log::warn!("command rejected: {err}"),
        }
    }
}
