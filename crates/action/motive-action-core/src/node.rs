//! Arena node types for the action tree.
//!
//! One [`ActionNode`] carries the lifecycle state every action shares
//! (parent link, loop budget, speed, delay, aggregate duration, scheduler
//! slot); [`ActionKind`] carries what differs per variant.

use serde::{Deserialize, Serialize};

use crate::ids::{ActionId, DomainId};
use crate::interp::Curve;
use crate::target::ActionTarget;
use crate::value::PropertyMap;

/// Speed multipliers are clamped into this range.
pub const MIN_SPEED: f32 = 0.01;
pub const MAX_SPEED: f32 = 100.0;

/// How many full passes an action runs before reporting terminal leftover.
#[derive(Copy, Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum LoopLimit {
    /// Run exactly this many passes (1 = play once, no looping).
    Finite(u32),
    /// Never exhaust from looping alone.
    Infinite,
}

impl Default for LoopLimit {
    fn default() -> Self {
        LoopLimit::Finite(1)
    }
}

impl LoopLimit {
    /// Whether another pass may start after `completed` full passes.
    #[inline]
    pub fn allows_another(self, completed: u32) -> bool {
        match self {
            LoopLimit::Finite(n) => completed < n,
            LoopLimit::Infinite => true,
        }
    }
}

/// One keyframe: a time point, the curve blending into the next frame, and
/// the property snapshot that holds at this point.
#[derive(Clone, Debug)]
pub struct Frame {
    pub time: u64,
    pub curve: Curve,
    pub values: PropertyMap,
}

/// Leaf state: ordered frames plus the playback cursor.
#[derive(Debug, Default)]
pub struct KeyframeState {
    pub frames: Vec<Frame>,
    /// Last fully-reached frame; `None` until the first prime/restart.
    pub cursor: Option<usize>,
    /// Local time within the current pass, past this action's delay.
    pub time: u64,
}

/// Composite state shared by spawn and sequence variants.
#[derive(Debug, Default)]
pub struct GroupState {
    pub children: Vec<ActionId>,
}

/// Ordered composite: additionally tracks the child receiving time.
#[derive(Debug, Default)]
pub struct SequenceState {
    pub group: GroupState,
    /// Index of the current child; `None` before the sequence starts.
    pub current: Option<usize>,
}

#[derive(Debug)]
pub enum ActionKind {
    Spawn(GroupState),
    Sequence(SequenceState),
    Keyframe(KeyframeState),
}

/// One action stored in the stage arena.
pub struct ActionNode {
    pub(crate) parent: Option<ActionId>,
    pub(crate) domain: DomainId,
    pub(crate) target: Option<Box<dyn ActionTarget>>,
    pub(crate) loop_limit: LoopLimit,
    /// Completed full passes; reset on restart and on seek.
    pub(crate) looped: u32,
    pub(crate) speed: f32,
    /// Virtual dead time consumed before the first frame of every pass.
    pub(crate) delay: u64,
    pub(crate) delay_done: u64,
    /// Aggregate virtual-time length including this action's own delay.
    pub(crate) full_duration: u64,
    /// Registry index while this action is a scheduled root.
    pub(crate) slot: Option<usize>,
    pub(crate) kind: ActionKind,
}

impl ActionNode {
    pub(crate) fn new(kind: ActionKind, domain: DomainId) -> Self {
        Self {
            parent: None,
            domain,
            target: None,
            loop_limit: LoopLimit::default(),
            looped: 0,
            speed: 1.0,
            delay: 0,
            delay_done: 0,
            full_duration: 0,
            slot: None,
            kind,
        }
    }

    /// Playable length, excluding this action's own delay.
    #[inline]
    pub fn duration(&self) -> u64 {
        self.full_duration.saturating_sub(self.delay)
    }

    #[inline]
    pub(crate) fn set_speed(&mut self, speed: f32) {
        self.speed = speed.clamp(MIN_SPEED, MAX_SPEED);
    }

    #[inline]
    pub(crate) fn group(&self) -> Option<&GroupState> {
        match &self.kind {
            ActionKind::Spawn(g) => Some(g),
            ActionKind::Sequence(s) => Some(&s.group),
            ActionKind::Keyframe(_) => None,
        }
    }

    #[inline]
    pub(crate) fn group_mut(&mut self) -> Option<&mut GroupState> {
        match &mut self.kind {
            ActionKind::Spawn(g) => Some(g),
            ActionKind::Sequence(s) => Some(&mut s.group),
            ActionKind::Keyframe(_) => None,
        }
    }
}

impl std::fmt::Debug for ActionNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionNode")
            .field("parent", &self.parent)
            .field("domain", &self.domain)
            .field("target", &self.target.is_some())
            .field("loop_limit", &self.loop_limit)
            .field("looped", &self.looped)
            .field("speed", &self.speed)
            .field("delay", &self.delay)
            .field("full_duration", &self.full_duration)
            .field("slot", &self.slot)
            .field("kind", &self.kind)
            .finish()
    }
}
