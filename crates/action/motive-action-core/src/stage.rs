//! The action arena and the tree algorithms that run on it.
//!
//! A `Stage` owns every action of one scheduling domain in a generational
//! arena. Groups reference their children by [`ActionId`]; the back-reference
//! from child to parent is a plain id, so "has a parent" is "is this field
//! populated". Only the scheduling thread ever touches a `Stage`; other
//! threads go through [`ActionHandle`](crate::handle::ActionHandle).
//!
//! Loop unrolling inside one tick is iterative by construction: iterations
//! per tick are bounded by `budget / minimum-child-duration`, and a
//! zero-length pass terminates instead of spinning.

use crate::data::{ClipData, FrameData};
use crate::error::ActionError;
use crate::events::{ActionEvent, EventSender};
use crate::ids::{ActionId, DomainId};
use crate::interp::Curve;
use crate::node::{ActionKind, ActionNode, Frame, GroupState, KeyframeState, LoopLimit, SequenceState};
use crate::target::ActionTarget;
use crate::value::Value;

/// Tolerance handed to curve evaluation on the advance path.
pub const CURVE_TOLERANCE: f32 = 0.001;

#[derive(Default)]
struct Slot {
    generation: u32,
    node: Option<ActionNode>,
}

/// Arena of actions for one scheduling domain.
pub struct Stage {
    slots: Vec<Slot>,
    free: Vec<u32>,
    domain: DomainId,
    events: EventSender,
}

#[inline]
fn scale(time: u64, speed: f32) -> u64 {
    (time as f64 * speed as f64).round() as u64
}

#[inline]
fn unscale(time: u64, speed: f32) -> u64 {
    (time as f64 / speed as f64).round() as u64
}

#[inline]
fn add_signed(value: u64, diff: i64) -> u64 {
    if diff >= 0 {
        value + diff as u64
    } else {
        value.saturating_sub(diff.unsigned_abs())
    }
}

impl Stage {
    pub fn new(domain: DomainId, events: EventSender) -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            domain,
            events,
        }
    }

    #[inline]
    pub fn domain(&self) -> DomainId {
        self.domain
    }

    // ---------------------------------------------------------------- arena

    fn alloc(&mut self, node: ActionNode) -> ActionId {
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.node = Some(node);
            ActionId {
                index,
                generation: slot.generation,
            }
        } else {
            let index = self.slots.len() as u32;
            self.slots.push(Slot {
                generation: 0,
                node: Some(node),
            });
            ActionId {
                index,
                generation: 0,
            }
        }
    }

    fn dealloc(&mut self, id: ActionId) {
        if let Some(slot) = self.slots.get_mut(id.index as usize) {
            if slot.generation == id.generation && slot.node.is_some() {
                slot.node = None;
                slot.generation = slot.generation.wrapping_add(1);
                self.free.push(id.index);
            }
        }
    }

    fn node(&self, id: ActionId) -> Option<&ActionNode> {
        let slot = self.slots.get(id.index as usize)?;
        if slot.generation == id.generation {
            slot.node.as_ref()
        } else {
            None
        }
    }

    fn node_mut(&mut self, id: ActionId) -> Option<&mut ActionNode> {
        let slot = self.slots.get_mut(id.index as usize)?;
        if slot.generation == id.generation {
            slot.node.as_mut()
        } else {
            None
        }
    }

    #[inline]
    pub fn contains(&self, id: ActionId) -> bool {
        self.node(id).is_some()
    }

    // ------------------------------------------------------------- creation

    /// Create a parallel composite.
    pub fn spawn(&mut self) -> ActionId {
        self.alloc(ActionNode::new(
            ActionKind::Spawn(GroupState::default()),
            self.domain,
        ))
    }

    /// Create an ordered composite.
    pub fn sequence(&mut self) -> ActionId {
        self.alloc(ActionNode::new(
            ActionKind::Sequence(SequenceState::default()),
            self.domain,
        ))
    }

    /// Create a keyframe leaf.
    pub fn keyframe(&mut self) -> ActionId {
        self.alloc(ActionNode::new(
            ActionKind::Keyframe(KeyframeState::default()),
            self.domain,
        ))
    }

    // ------------------------------------------------------------ accessors

    /// Playable length of an action, excluding its own delay. 0 if the id is
    /// no longer live.
    pub fn duration(&self, id: ActionId) -> u64 {
        self.node(id).map(|n| n.duration()).unwrap_or(0)
    }

    pub fn delay(&self, id: ActionId) -> u64 {
        self.node(id).map(|n| n.delay).unwrap_or(0)
    }

    pub fn speed(&self, id: ActionId) -> f32 {
        self.node(id).map(|n| n.speed).unwrap_or(1.0)
    }

    pub fn looped(&self, id: ActionId) -> u32 {
        self.node(id).map(|n| n.looped).unwrap_or(0)
    }

    pub fn parent(&self, id: ActionId) -> Option<ActionId> {
        self.node(id).and_then(|n| n.parent)
    }

    /// The root of the tree containing `id`.
    pub fn root_of(&self, id: ActionId) -> Option<ActionId> {
        let mut cur = self.node(id).map(|_| id)?;
        while let Some(p) = self.node(cur).and_then(|n| n.parent) {
            cur = p;
        }
        Some(cur)
    }

    /// Whether the tree containing `id` is registered with the center.
    pub fn playing(&self, id: ActionId) -> bool {
        self.root_of(id)
            .map(|root| self.is_root_playing(root))
            .unwrap_or(false)
    }

    #[inline]
    fn is_root_playing(&self, root: ActionId) -> bool {
        self.node(root).map(|n| n.slot.is_some()).unwrap_or(false)
    }

    pub fn child_count(&self, id: ActionId) -> usize {
        self.node(id)
            .and_then(|n| n.group())
            .map(|g| g.children.len())
            .unwrap_or(0)
    }

    pub fn children(&self, id: ActionId) -> Vec<ActionId> {
        self.node(id)
            .and_then(|n| n.group())
            .map(|g| g.children.clone())
            .unwrap_or_default()
    }

    /// The child currently receiving time in a sequence.
    pub fn sequence_position(&self, id: ActionId) -> Option<usize> {
        match &self.node(id)?.kind {
            ActionKind::Sequence(s) => s.current,
            _ => None,
        }
    }

    /// Last fully-reached frame of a keyframe action.
    pub fn keyframe_cursor(&self, id: ActionId) -> Option<usize> {
        match &self.node(id)?.kind {
            ActionKind::Keyframe(ks) => ks.cursor,
            _ => None,
        }
    }

    /// Local time of a keyframe action within its current pass.
    pub fn local_time(&self, id: ActionId) -> Option<u64> {
        match &self.node(id)?.kind {
            ActionKind::Keyframe(ks) => Some(ks.time),
            _ => None,
        }
    }

    pub fn frame_count(&self, id: ActionId) -> usize {
        match self.node(id).map(|n| &n.kind) {
            Some(ActionKind::Keyframe(ks)) => ks.frames.len(),
            _ => 0,
        }
    }

    pub fn frame_time(&self, id: ActionId, frame: usize) -> Option<u64> {
        match &self.node(id)?.kind {
            ActionKind::Keyframe(ks) => ks.frames.get(frame).map(|f| f.time),
            _ => None,
        }
    }

    /// Copy of the property snapshot stored on one frame.
    pub fn frame_values(&self, id: ActionId, frame: usize) -> Option<crate::value::PropertyMap> {
        match &self.node(id)?.kind {
            ActionKind::Keyframe(ks) => ks.frames.get(frame).map(|f| f.values.clone()),
            _ => None,
        }
    }

    pub(crate) fn slot_of(&self, id: ActionId) -> Option<usize> {
        self.node(id).and_then(|n| n.slot)
    }

    pub(crate) fn set_slot(&mut self, id: ActionId, slot: Option<usize>) {
        if let Some(node) = self.node_mut(id) {
            node.slot = slot;
        }
    }

    pub(crate) fn has_target(&self, id: ActionId) -> bool {
        self.node(id).map(|n| n.target.is_some()).unwrap_or(false)
    }

    // ----------------------------------------------------------- configuration

    pub fn set_loop(&mut self, id: ActionId, limit: LoopLimit) -> Result<(), ActionError> {
        let node = self.node_mut(id).ok_or(ActionError::Expired)?;
        node.loop_limit = limit;
        Ok(())
    }

    pub fn set_speed(&mut self, id: ActionId, speed: f32) -> Result<(), ActionError> {
        let node = self.node_mut(id).ok_or(ActionError::Expired)?;
        node.set_speed(speed);
        Ok(())
    }

    pub fn set_delay(&mut self, id: ActionId, delay: u64) -> Result<(), ActionError> {
        let node = self.node_mut(id).ok_or(ActionError::Expired)?;
        let diff = delay as i64 - node.delay as i64;
        node.delay = delay;
        self.update_duration(id, diff);
        Ok(())
    }

    /// Attach the external mutation target. Only legal on a parentless action
    /// without a target; the target must belong to this stage's domain.
    pub fn set_target(
        &mut self,
        id: ActionId,
        target: Box<dyn ActionTarget>,
    ) -> Result<(), ActionError> {
        let node = self.node_mut(id).ok_or(ActionError::Expired)?;
        if node.parent.is_some() || node.target.is_some() {
            return Err(ActionError::MultipleTargets);
        }
        if target.domain() != node.domain {
            return Err(ActionError::DomainMismatch);
        }
        node.target = Some(target);
        Ok(())
    }

    /// Detach the target, returning it to the caller.
    pub fn del_target(&mut self, id: ActionId) -> Result<Option<Box<dyn ActionTarget>>, ActionError> {
        let node = self.node_mut(id).ok_or(ActionError::Expired)?;
        Ok(node.target.take())
    }

    // ------------------------------------------------------------- tree shape

    /// Append `child` as the last child of `parent`.
    pub fn append(&mut self, parent: ActionId, child: ActionId) -> Result<(), ActionError> {
        self.insert(parent, usize::MAX, child)
    }

    /// Insert `child` at `index` (clamped to the child count) in `parent`.
    pub fn insert(
        &mut self,
        parent: ActionId,
        index: usize,
        child: ActionId,
    ) -> Result<(), ActionError> {
        let pnode = self.node(parent).ok_or(ActionError::Expired)?;
        if pnode.group().is_none() {
            return Err(ActionError::UnsupportedOperation);
        }
        let (pdomain, pdelay, pfull) = (pnode.domain, pnode.delay, pnode.full_duration);

        let cnode = self.node(child).ok_or(ActionError::Expired)?;
        if cnode.slot.is_some() {
            return Err(ActionError::PlayingConflict);
        }
        if cnode.parent.is_some() || cnode.target.is_some() || child == parent {
            return Err(ActionError::IllegalChild);
        }
        if cnode.domain != pdomain {
            return Err(ActionError::DomainMismatch);
        }
        // Reject a child that is an ancestor of the parent (cycle).
        let mut cur = parent;
        while let Some(p) = self.parent(cur) {
            if p == child {
                return Err(ActionError::IllegalChild);
            }
            cur = p;
        }
        let child_full = cnode.full_duration;

        if let Some(node) = self.node_mut(child) {
            node.parent = Some(parent);
        }
        let is_spawn = {
            let pnode = self.node_mut(parent).ok_or(ActionError::Expired)?;
            let is_spawn = matches!(pnode.kind, ActionKind::Spawn(_));
            if let ActionKind::Sequence(seq) = &mut pnode.kind {
                let at = index.min(seq.group.children.len());
                seq.group.children.insert(at, child);
                if let Some(cur) = seq.current {
                    if cur >= at {
                        seq.current = Some(cur + 1);
                    }
                }
            } else if let Some(group) = pnode.group_mut() {
                let at = index.min(group.children.len());
                group.children.insert(at, child);
            }
            is_spawn
        };

        if is_spawn {
            let du = child_full + pdelay;
            if du > pfull {
                self.update_duration(parent, du as i64 - pfull as i64);
            }
        } else if child_full > 0 {
            self.update_duration(parent, child_full as i64);
        }
        Ok(())
    }

    /// Insert `sibling` immediately before `anchor` under the anchor's parent.
    pub fn insert_before(&mut self, anchor: ActionId, sibling: ActionId) -> Result<(), ActionError> {
        let parent = self.parent(anchor).ok_or(ActionError::NoParent)?;
        let index = self.child_index(parent, anchor).ok_or(ActionError::NoParent)?;
        self.insert(parent, index, sibling)
    }

    /// Insert `sibling` immediately after `anchor` under the anchor's parent.
    pub fn insert_after(&mut self, anchor: ActionId, sibling: ActionId) -> Result<(), ActionError> {
        let parent = self.parent(anchor).ok_or(ActionError::NoParent)?;
        let index = self.child_index(parent, anchor).ok_or(ActionError::NoParent)?;
        self.insert(parent, index + 1, sibling)
    }

    /// Detach `id` from its parent.
    pub fn remove(&mut self, id: ActionId) -> Result<(), ActionError> {
        let parent = self.parent(id).ok_or(ActionError::NoParent)?;
        let index = self.child_index(parent, id).ok_or(ActionError::NoParent)?;
        self.remove_child(parent, index)
    }

    fn child_index(&self, parent: ActionId, child: ActionId) -> Option<usize> {
        self.node(parent)?
            .group()?
            .children
            .iter()
            .position(|&c| c == child)
    }

    /// Unwire and detach the child at `index`. Out-of-range indices are a
    /// no-op, matching removal racing against an earlier removal.
    pub fn remove_child(&mut self, parent: ActionId, index: usize) -> Result<(), ActionError> {
        let pnode = self.node(parent).ok_or(ActionError::Expired)?;
        let (pdelay, pfull) = (pnode.delay, pnode.full_duration);
        let is_spawn = matches!(pnode.kind, ActionKind::Spawn(_));

        let child = {
            let pnode = self.node_mut(parent).ok_or(ActionError::Expired)?;
            match &mut pnode.kind {
                ActionKind::Sequence(seq) => {
                    if index >= seq.group.children.len() {
                        return Ok(());
                    }
                    let child = seq.group.children.remove(index);
                    match seq.current {
                        Some(cur) if cur == index => seq.current = None,
                        Some(cur) if cur > index => seq.current = Some(cur - 1),
                        _ => {}
                    }
                    child
                }
                ActionKind::Spawn(group) => {
                    if index >= group.children.len() {
                        return Ok(());
                    }
                    group.children.remove(index)
                }
                ActionKind::Keyframe(_) => return Err(ActionError::UnsupportedOperation),
            }
        };

        let child_full = self
            .node_mut(child)
            .map(|n| {
                n.parent = None;
                n.full_duration
            })
            .unwrap_or(0);

        if is_spawn {
            if child_full + pdelay == pfull {
                let new_full = pdelay + self.max_child_duration(parent);
                self.update_duration(parent, new_full as i64 - pfull as i64);
            }
        } else if child_full > 0 {
            self.update_duration(parent, -(child_full as i64));
        }
        Ok(())
    }

    /// Tear down `id` and its whole subtree. Safe on already-dead ids.
    pub fn destroy(&mut self, id: ActionId) {
        if !self.contains(id) {
            return;
        }
        if self.parent(id).is_some() {
            let _ = self.remove(id);
        }
        let mut stack = vec![id];
        while let Some(next) = stack.pop() {
            if let Some(node) = self.node(next) {
                if let Some(group) = node.group() {
                    stack.extend(group.children.iter().copied());
                }
            }
            self.dealloc(next);
        }
    }

    // -------------------------------------------------------------- keyframes

    /// Append a keyframe at `time` with the given easing curve, returning its
    /// index. A time not strictly greater than the previous frame's is
    /// clamped to equal it (zero-length segment); the first frame is always
    /// at time 0. The new frame starts from a copy of the previous snapshot.
    pub fn add_frame(&mut self, id: ActionId, time: u64, curve: Curve) -> Result<usize, ActionError> {
        let node = self.node_mut(id).ok_or(ActionError::Expired)?;
        let ActionKind::Keyframe(ks) = &mut node.kind else {
            return Err(ActionError::UnsupportedOperation);
        };
        let (time, delta, values) = match ks.frames.last() {
            None => (0, 0, Default::default()),
            Some(last) => {
                if time <= last.time {
                    (last.time, 0, last.values.clone())
                } else {
                    (time, time - last.time, last.values.clone())
                }
            }
        };
        ks.frames.push(Frame { time, curve, values });
        let index = ks.frames.len() - 1;
        if delta > 0 {
            self.update_duration(id, delta as i64);
        }
        Ok(index)
    }

    /// Set one property on one frame. Frames lacking the key are backfilled
    /// with the same value so every frame keeps the same key set.
    pub fn set_frame_value(
        &mut self,
        id: ActionId,
        frame: usize,
        key: &str,
        value: Value,
    ) -> Result<(), ActionError> {
        let node = self.node_mut(id).ok_or(ActionError::Expired)?;
        let ActionKind::Keyframe(ks) = &mut node.kind else {
            return Err(ActionError::UnsupportedOperation);
        };
        if frame >= ks.frames.len() {
            return Err(ActionError::FrameOutOfRange);
        }
        for (i, f) in ks.frames.iter_mut().enumerate() {
            if i == frame {
                f.values.insert(key.to_string(), value.clone());
            } else {
                f.values
                    .entry(key.to_string())
                    .or_insert_with(|| value.clone());
            }
        }
        Ok(())
    }

    /// Build frames on a keyframe action from a serializable description.
    /// Returns the index of the first loaded frame.
    pub fn load_clip(&mut self, id: ActionId, clip: &ClipData) -> Result<usize, ActionError> {
        let mut first = self.frame_count(id);
        for (i, frame) in clip.frames.iter().enumerate() {
            let index = self.add_frame(id, frame.time, frame.curve)?;
            if i == 0 {
                first = index;
            }
            for (key, value) in &frame.values {
                self.set_frame_value(id, index, key, value.clone())?;
            }
        }
        Ok(first)
    }

    /// Export a keyframe action's frames as data.
    pub fn clip_data(&self, id: ActionId) -> Result<ClipData, ActionError> {
        let node = self.node(id).ok_or(ActionError::Expired)?;
        let ActionKind::Keyframe(ks) = &node.kind else {
            return Err(ActionError::UnsupportedOperation);
        };
        Ok(ClipData {
            frames: ks
                .frames
                .iter()
                .map(|f| FrameData {
                    time: f.time,
                    curve: f.curve,
                    values: f.values.clone(),
                })
                .collect(),
        })
    }

    // -------------------------------------------------------- duration upkeep

    fn max_child_duration(&self, id: ActionId) -> u64 {
        self.node(id)
            .and_then(|n| n.group())
            .map(|g| {
                g.children
                    .iter()
                    .filter_map(|&c| self.node(c).map(|n| n.full_duration))
                    .max()
                    .unwrap_or(0)
            })
            .unwrap_or(0)
    }

    /// Propagate a duration change bottom-up. A spawn ancestor re-derives its
    /// duration from the max over children instead of adding the diff.
    fn update_duration(&mut self, id: ActionId, diff: i64) {
        if diff == 0 {
            return;
        }
        if let Some(node) = self.node_mut(id) {
            node.full_duration = add_signed(node.full_duration, diff);
        }
        let mut cur = id;
        let mut diff = diff;
        while let Some(parent) = self.parent(cur) {
            let is_spawn = self
                .node(parent)
                .map(|n| matches!(n.kind, ActionKind::Spawn(_)))
                .unwrap_or(false);
            if is_spawn {
                let (old, delay) = match self.node(parent) {
                    Some(n) => (n.full_duration, n.delay),
                    None => break,
                };
                let new = delay + self.max_child_duration(parent);
                if new == old {
                    break;
                }
                if let Some(n) = self.node_mut(parent) {
                    n.full_duration = new;
                }
                diff = new as i64 - old as i64;
            } else if let Some(n) = self.node_mut(parent) {
                n.full_duration = add_signed(n.full_duration, diff);
            }
            cur = parent;
        }
    }

    // ------------------------------------------------------------------ seek

    /// Absolute reposition of `id` within its own timeline, applying the
    /// resulting property state to the tree root's target immediately.
    pub fn seek(&mut self, id: ActionId, time: u64) -> Result<(), ActionError> {
        let node = self.node(id).ok_or(ActionError::Expired)?;
        let mut t = (time + node.delay).min(node.full_duration);

        // Translate the local time into the root's timeline: a sequence
        // parent offsets by the duration of preceding siblings, a spawn
        // parent only by its own delay.
        let mut cur = id;
        while let Some(parent) = self.parent(cur) {
            let pnode = self.node(parent).ok_or(ActionError::Expired)?;
            t += pnode.delay;
            if let ActionKind::Sequence(seq) = &pnode.kind {
                for &sibling in &seq.group.children {
                    if sibling == cur {
                        break;
                    }
                    t += self.node(sibling).map(|n| n.full_duration).unwrap_or(0);
                }
            }
            cur = parent;
        }

        let root = cur;
        let mut target = match self.node_mut(root) {
            Some(node) => node.target.take(),
            None => None,
        };
        self.seek_time(root, t, &mut target);
        if let Some(node) = self.node_mut(root) {
            node.target = target;
        }
        Ok(())
    }

    fn seek_time(
        &mut self,
        id: ActionId,
        time: u64,
        target: &mut Option<Box<dyn ActionTarget>>,
    ) {
        let kind = match self.node(id).map(|n| &n.kind) {
            Some(ActionKind::Spawn(_)) => 0,
            Some(ActionKind::Sequence(_)) => 1,
            Some(ActionKind::Keyframe(_)) => 2,
            None => return,
        };
        match kind {
            0 => self.seek_spawn(id, time, target),
            1 => self.seek_sequence(id, time, target),
            _ => self.seek_keyframe(id, time, target),
        }
    }

    fn seek_spawn(&mut self, id: ActionId, time: u64, target: &mut Option<Box<dyn ActionTarget>>) {
        let children = {
            let Some(node) = self.node_mut(id) else { return };
            if time < node.delay {
                node.delay_done = time;
                return;
            }
            node.delay_done = node.delay;
            node.looped = 0;
            self.children(id)
        };
        let local = time - self.delay(id);
        for child in children {
            self.seek_time(child, local, target);
        }
    }

    fn seek_sequence(
        &mut self,
        id: ActionId,
        time: u64,
        target: &mut Option<Box<dyn ActionTarget>>,
    ) {
        let local = {
            let Some(node) = self.node_mut(id) else { return };
            if time < node.delay {
                node.delay_done = time;
                if let ActionKind::Sequence(seq) = &mut node.kind {
                    seq.current = None;
                }
                return;
            }
            node.delay_done = node.delay;
            node.looped = 0;
            time - node.delay
        };
        let children = self.children(id);
        if children.is_empty() {
            return;
        }
        let mut acc = 0u64;
        for (i, &child) in children.iter().enumerate() {
            let child_full = self.node(child).map(|n| n.full_duration).unwrap_or(0);
            if acc + child_full > local {
                if let Some(ActionKind::Sequence(seq)) = self.node_mut(id).map(|n| &mut n.kind) {
                    seq.current = Some(i);
                }
                self.seek_time(child, local - acc, target);
                return;
            }
            acc += child_full;
        }
        // Past the end: park on the last child at its own end.
        let last = children.len() - 1;
        let before_last = acc - self.node(children[last]).map(|n| n.full_duration).unwrap_or(0);
        if let Some(ActionKind::Sequence(seq)) = self.node_mut(id).map(|n| &mut n.kind) {
            seq.current = Some(last);
        }
        self.seek_time(children[last], local - before_last, target);
    }

    fn seek_keyframe(
        &mut self,
        id: ActionId,
        time: u64,
        target: &mut Option<Box<dyn ActionTarget>>,
    ) {
        let Some(node) = self.node_mut(id) else { return };
        if time < node.delay {
            node.delay_done = time;
            if let ActionKind::Keyframe(ks) = &mut node.kind {
                ks.cursor = None;
                ks.time = 0;
            }
            return;
        }
        node.delay_done = node.delay;
        node.looped = 0;
        let local = time - node.delay;
        let duration = node.duration();

        let (index, at_boundary) = {
            let ActionKind::Keyframe(ks) = &mut node.kind else { return };
            if ks.frames.is_empty() {
                return;
            }
            let mut index = 0;
            for (i, f) in ks.frames.iter().enumerate() {
                if local < f.time {
                    break;
                }
                index = i;
            }
            ks.time = local.min(duration);
            ks.cursor = Some(index);
            (index, ks.time == ks.frames[index].time)
        };

        if let Some(node) = self.node(id) {
            if let ActionKind::Keyframe(ks) = &node.kind {
                let f2 = index + 1;
                if f2 < ks.frames.len() {
                    let t1 = ks.frames[index].time;
                    let t2 = ks.frames[f2].time;
                    let x = (ks.time - t1) as f32 / (t2 - t1) as f32;
                    let y = ks.frames[index].curve.evaluate(x, CURVE_TOLERANCE);
                    if let Some(t) = target.as_deref_mut() {
                        t.apply_blend(&ks.frames[index].values, &ks.frames[f2].values, y);
                    }
                } else if let Some(t) = target.as_deref_mut() {
                    t.apply_frame(&ks.frames[index].values);
                }
            }
        }
        if at_boundary {
            self.events.emit(ActionEvent::Keyframe {
                action: id,
                frame: index,
                leftover: 0,
            });
        }
    }

    // --------------------------------------------------------------- advance

    /// Advance the tree rooted at `id` by `budget` virtual milliseconds.
    ///
    /// Returns 0 when the whole budget was consumed; a positive leftover
    /// means the tree reached a terminal point with time to spare, and the
    /// caller (normally the center) decides what happens next. `restart`
    /// forces every cursor in the tree to reinitialize.
    pub fn advance(&mut self, id: ActionId, budget: u64, restart: bool) -> u64 {
        if !self.contains(id) {
            return budget.max(1);
        }
        let mut target = match self.node_mut(id) {
            Some(node) => node.target.take(),
            None => None,
        };
        let leftover = self.advance_action(id, budget, restart, id, &mut target);
        if let Some(node) = self.node_mut(id) {
            node.target = target;
        }
        leftover
    }

    fn advance_action(
        &mut self,
        id: ActionId,
        budget: u64,
        restart: bool,
        root: ActionId,
        target: &mut Option<Box<dyn ActionTarget>>,
    ) -> u64 {
        let kind = match self.node(id).map(|n| &n.kind) {
            Some(ActionKind::Spawn(_)) => 0,
            Some(ActionKind::Sequence(_)) => 1,
            Some(ActionKind::Keyframe(_)) => 2,
            None => return budget,
        };
        match kind {
            0 => self.advance_spawn(id, budget, restart, root, target),
            1 => self.advance_sequence(id, budget, restart, root, target),
            _ => self.advance_keyframe(id, budget, restart, root, target),
        }
    }

    /// Consume pending delay out of `budget`. `None` means the whole budget
    /// was absorbed by the delay.
    fn consume_delay(&mut self, id: ActionId, budget: u64) -> Option<u64> {
        let node = self.node_mut(id)?;
        if node.delay > node.delay_done {
            let remaining = node.delay - node.delay_done;
            if budget <= remaining {
                node.delay_done += budget;
                return None;
            }
            node.delay_done = node.delay;
            return Some(budget - remaining);
        }
        Some(budget)
    }

    fn advance_spawn(
        &mut self,
        id: ActionId,
        budget: u64,
        restart: bool,
        root: ActionId,
        target: &mut Option<Box<dyn ActionTarget>>,
    ) -> u64 {
        let speed = self.speed(id);
        let mut budget = scale(budget, speed);
        let mut restart = restart;

        if restart {
            if let Some(node) = self.node_mut(id) {
                node.delay_done = 0;
                node.looped = 0;
            }
        }
        budget = match self.consume_delay(id, budget) {
            Some(b) => b,
            None => return 0,
        };

        loop {
            let children = self.children(id);
            let mut surplus = budget;
            for child in children {
                let left = self.advance_action(child, budget, restart, root, target);
                surplus = surplus.min(left);
            }
            if surplus == 0 {
                return 0;
            }
            if self.duration(id) == 0 {
                return unscale(surplus, speed);
            }
            let looped = {
                let Some(node) = self.node_mut(id) else {
                    return unscale(surplus, speed);
                };
                node.looped += 1;
                if !node.loop_limit.allows_another(node.looped) {
                    return unscale(surplus, speed);
                }
                node.looped
            };
            restart = true;
            budget = surplus;
            self.events.emit(ActionEvent::Loop {
                action: id,
                looped,
                leftover: surplus,
            });
            if !self.is_root_playing(root) {
                return 0;
            }
        }
    }

    fn advance_sequence(
        &mut self,
        id: ActionId,
        budget: u64,
        restart: bool,
        root: ActionId,
        target: &mut Option<Box<dyn ActionTarget>>,
    ) -> u64 {
        let speed = self.speed(id);
        let mut budget = scale(budget, speed);
        let mut restart = restart;

        let started = self.sequence_position(id).is_some();
        if restart || !started {
            if restart {
                if let Some(node) = self.node_mut(id) {
                    node.delay_done = 0;
                    node.looped = 0;
                    if let ActionKind::Sequence(seq) = &mut node.kind {
                        seq.current = None;
                    }
                }
            }
            budget = match self.consume_delay(id, budget) {
                Some(b) => b,
                None => return 0,
            };
            if self.child_count(id) == 0 {
                return unscale(budget, speed);
            }
            if let Some(ActionKind::Sequence(seq)) = self.node_mut(id).map(|n| &mut n.kind) {
                seq.current = Some(0);
            }
            restart = true;
        }

        loop {
            let children = self.children(id);
            let len = children.len();
            if len == 0 {
                return unscale(budget, speed);
            }
            let cur = match self.sequence_position(id) {
                Some(cur) if cur < len => cur,
                _ => {
                    // Current child was removed between ticks: start over.
                    if let Some(ActionKind::Sequence(seq)) =
                        self.node_mut(id).map(|n| &mut n.kind)
                    {
                        seq.current = Some(0);
                    }
                    restart = true;
                    0
                }
            };

            budget = self.advance_action(children[cur], budget, restart, root, target);
            if budget == 0 {
                return 0;
            }
            restart = true;

            if cur + 1 < len {
                if let Some(ActionKind::Sequence(seq)) = self.node_mut(id).map(|n| &mut n.kind) {
                    seq.current = Some(cur + 1);
                }
                continue;
            }

            // Past the last child: loop or report terminal leftover, leaving
            // the cursor at its last valid position.
            if self.duration(id) == 0 {
                return unscale(budget, speed);
            }
            let looped = {
                let Some(node) = self.node_mut(id) else {
                    return unscale(budget, speed);
                };
                node.looped += 1;
                if !node.loop_limit.allows_another(node.looped) {
                    return unscale(budget, speed);
                }
                node.looped
            };
            if let Some(ActionKind::Sequence(seq)) = self.node_mut(id).map(|n| &mut n.kind) {
                seq.current = Some(0);
            }
            self.events.emit(ActionEvent::Loop {
                action: id,
                looped,
                leftover: budget,
            });
            if !self.is_root_playing(root) {
                return 0;
            }
        }
    }

    fn advance_keyframe(
        &mut self,
        id: ActionId,
        budget: u64,
        restart: bool,
        root: ActionId,
        target: &mut Option<Box<dyn ActionTarget>>,
    ) -> u64 {
        let speed = self.speed(id);
        let mut budget = scale(budget, speed);

        let primed = self.keyframe_cursor(id).is_some();
        if restart || !primed {
            if restart {
                if let Some(node) = self.node_mut(id) {
                    node.delay_done = 0;
                    node.looped = 0;
                    if let ActionKind::Keyframe(ks) = &mut node.kind {
                        ks.cursor = None;
                        ks.time = 0;
                    }
                }
            }
            budget = match self.consume_delay(id, budget) {
                Some(b) => b,
                None => return 0,
            };
            let len = self.frame_count(id);
            if len == 0 {
                return unscale(budget, speed);
            }
            if let Some(ActionKind::Keyframe(ks)) = self.node_mut(id).map(|n| &mut n.kind) {
                ks.cursor = Some(0);
                ks.time = 0;
            }
            self.apply_discrete(id, 0, target);
            self.events.emit(ActionEvent::Keyframe {
                action: id,
                frame: 0,
                leftover: budget,
            });
            if budget == 0 {
                return 0;
            }
            if len == 1 {
                return unscale(budget, speed);
            }
        }

        loop {
            let (f1, len, local) = match self.node(id).map(|n| &n.kind) {
                Some(ActionKind::Keyframe(ks)) => {
                    (ks.cursor.unwrap_or(0), ks.frames.len(), ks.time)
                }
                _ => return unscale(budget, speed),
            };
            let f2 = f1 + 1;

            if f2 < len {
                let (t1, t2) = match self.node(id).map(|n| &n.kind) {
                    Some(ActionKind::Keyframe(ks)) => (ks.frames[f1].time, ks.frames[f2].time),
                    _ => return unscale(budget, speed),
                };
                let reached = local + budget;

                if reached < t2 {
                    if let Some(ActionKind::Keyframe(ks)) = self.node_mut(id).map(|n| &mut n.kind)
                    {
                        ks.time = reached;
                    }
                    let x = (reached - t1) as f32 / (t2 - t1) as f32;
                    self.apply_blended(id, f1, f2, x, target);
                    return 0;
                }

                // Frame f2 is fully reached; carry the remainder forward.
                budget = reached - t2;
                if let Some(ActionKind::Keyframe(ks)) = self.node_mut(id).map(|n| &mut n.kind) {
                    ks.cursor = Some(f2);
                    ks.time = t2;
                }
                self.apply_discrete(id, f2, target);
                self.events.emit(ActionEvent::Keyframe {
                    action: id,
                    frame: f2,
                    leftover: budget,
                });
                if budget == 0 {
                    return 0;
                }
                continue;
            }

            // Frames exhausted for this pass.
            if self.duration(id) == 0 {
                return unscale(budget, speed);
            }
            let looped = {
                let Some(node) = self.node_mut(id) else {
                    return unscale(budget, speed);
                };
                node.looped += 1;
                if !node.loop_limit.allows_another(node.looped) {
                    return unscale(budget, speed);
                }
                if let ActionKind::Keyframe(ks) = &mut node.kind {
                    ks.cursor = Some(0);
                    ks.time = 0;
                }
                node.looped
            };
            self.events.emit(ActionEvent::Loop {
                action: id,
                looped,
                leftover: budget,
            });
            self.events.emit(ActionEvent::Keyframe {
                action: id,
                frame: 0,
                leftover: budget,
            });
            if !self.is_root_playing(root) {
                return 0;
            }
        }
    }

    fn apply_discrete(
        &self,
        id: ActionId,
        frame: usize,
        target: &mut Option<Box<dyn ActionTarget>>,
    ) {
        let Some(t) = target.as_deref_mut() else { return };
        if let Some(ActionKind::Keyframe(ks)) = self.node(id).map(|n| &n.kind) {
            if let Some(f) = ks.frames.get(frame) {
                t.apply_frame(&f.values);
            }
        }
    }

    fn apply_blended(
        &self,
        id: ActionId,
        f1: usize,
        f2: usize,
        x: f32,
        target: &mut Option<Box<dyn ActionTarget>>,
    ) {
        let Some(t) = target.as_deref_mut() else { return };
        if let Some(ActionKind::Keyframe(ks)) = self.node(id).map(|n| &n.kind) {
            let y = ks.frames[f1].curve.evaluate(x, CURVE_TOLERANCE);
            t.apply_blend(&ks.frames[f1].values, &ks.frames[f2].values, y);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventSender;

    #[test]
    fn dead_ids_stop_resolving() {
        let mut stage = Stage::new(DomainId(0), EventSender::dummy());
        let a = stage.keyframe();
        assert!(stage.contains(a));
        stage.destroy(a);
        assert!(!stage.contains(a));
        // The slot is reused under a new generation.
        let b = stage.keyframe();
        assert!(stage.contains(b));
        assert!(!stage.contains(a));
        assert_ne!(a, b);
    }

    #[test]
    fn destroy_frees_whole_subtree() {
        let mut stage = Stage::new(DomainId(0), EventSender::dummy());
        let root = stage.sequence();
        let inner = stage.spawn();
        let leaf = stage.keyframe();
        stage.append(inner, leaf).unwrap();
        stage.append(root, inner).unwrap();
        stage.destroy(root);
        assert!(!stage.contains(root));
        assert!(!stage.contains(inner));
        assert!(!stage.contains(leaf));
    }
}
