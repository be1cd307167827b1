//! Commands shipped from foreign threads to the scheduling thread.

use crate::data::ClipData;
use crate::ids::ActionId;
use crate::interp::Curve;
use crate::node::LoopLimit;
use crate::target::ActionTarget;
use crate::value::Value;

/// One deferred mutation, applied in FIFO order during the next tick.
pub enum Command {
    Play(ActionId),
    Stop(ActionId),
    Seek { id: ActionId, time: u64 },
    SeekPlay { id: ActionId, time: u64 },
    SeekStop { id: ActionId, time: u64 },
    SetLoop { id: ActionId, limit: LoopLimit },
    SetSpeed { id: ActionId, speed: f32 },
    SetDelay { id: ActionId, delay: u64 },
    Append { parent: ActionId, child: ActionId },
    Insert { parent: ActionId, index: usize, child: ActionId },
    Before { anchor: ActionId, sibling: ActionId },
    After { anchor: ActionId, sibling: ActionId },
    Remove(ActionId),
    SetTarget { id: ActionId, target: Box<dyn ActionTarget> },
    DelTarget(ActionId),
    AddFrame { id: ActionId, time: u64, curve: Curve },
    SetFrameValue { id: ActionId, frame: usize, key: String, value: Value },
    LoadClip { id: ActionId, clip: ClipData },
    Release(ActionId),
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Command::Play(id) => f.debug_tuple("Play").field(id).finish(),
            Command::Stop(id) => f.debug_tuple("Stop").field(id).finish(),
            Command::Seek { id, time } => {
                f.debug_struct("Seek").field("id", id).field("time", time).finish()
            }
            Command::SeekPlay { id, time } => {
                f.debug_struct("SeekPlay").field("id", id).field("time", time).finish()
            }
            Command::SeekStop { id, time } => {
                f.debug_struct("SeekStop").field("id", id).field("time", time).finish()
            }
            Command::SetLoop { id, limit } => {
                f.debug_struct("SetLoop").field("id", id).field("limit", limit).finish()
            }
            Command::SetSpeed { id, speed } => {
                f.debug_struct("SetSpeed").field("id", id).field("speed", speed).finish()
            }
            Command::SetDelay { id, delay } => {
                f.debug_struct("SetDelay").field("id", id).field("delay", delay).finish()
            }
            Command::Append { parent, child } => f
                .debug_struct("Append")
                .field("parent", parent)
                .field("child", child)
                .finish(),
            Command::Insert { parent, index, child } => f
                .debug_struct("Insert")
                .field("parent", parent)
                .field("index", index)
                .field("child", child)
                .finish(),
            Command::Before { anchor, sibling } => f
                .debug_struct("Before")
                .field("anchor", anchor)
                .field("sibling", sibling)
                .finish(),
            Command::After { anchor, sibling } => f
                .debug_struct("After")
                .field("anchor", anchor)
                .field("sibling", sibling)
                .finish(),
            Command::Remove(id) => f.debug_tuple("Remove").field(id).finish(),
            Command::SetTarget { id, .. } => {
                f.debug_struct("SetTarget").field("id", id).finish_non_exhaustive()
            }
            Command::DelTarget(id) => f.debug_tuple("DelTarget").field(id).finish(),
            Command::AddFrame { id, time, curve } => f
                .debug_struct("AddFrame")
                .field("id", id)
                .field("time", time)
                .field("curve", curve)
                .finish(),
            Command::SetFrameValue { id, frame, key, .. } => f
                .debug_struct("SetFrameValue")
                .field("id", id)
                .field("frame", frame)
                .field("key", key)
                .finish_non_exhaustive(),
            Command::LoadClip { id, clip } => f
                .debug_struct("LoadClip")
                .field("id", id)
                .field("frames", &clip.frames.len())
                .finish(),
            Command::Release(id) => f.debug_tuple("Release").field(id).finish(),
        }
    }
}
