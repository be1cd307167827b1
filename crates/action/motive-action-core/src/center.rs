//! Frame pump for playing action trees.
//!
//! The center keeps the registry of root actions currently playing and, once
//! per tick, feeds each of them the wall-clock time elapsed since the
//! previous tick. The elapsed span is clamped so a stalled host (debugger,
//! suspended tab, long GC in the embedder) does not make actions jump far
//! ahead when ticks resume.

use crate::ids::ActionId;
use crate::stage::Stage;

/// Upper bound on the elapsed time fed to actions in one tick, in
/// milliseconds.
pub const MAX_ELAPSED_MS: u64 = 200;

struct Entry {
    /// Cleared in place when the action finishes or is deregistered; the
    /// vector is compacted at the end of the tick.
    id: Option<ActionId>,
    /// A freshly-registered root gets one zero-budget priming pass before it
    /// starts receiving real time.
    started: bool,
}

/// Registry of playing roots for one scheduling domain.
#[derive(Default)]
pub struct ActionCenter {
    entries: Vec<Entry>,
    prev_time: Option<u64>,
}

impl ActionCenter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of currently playing roots.
    pub fn len(&self) -> usize {
        self.entries.iter().filter(|e| e.id.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.iter().all(|e| e.id.is_none())
    }

    /// Register a root for ticking. Idempotent for an already-registered
    /// root; ignores actions that have a parent or lack a target.
    pub fn register(&mut self, stage: &mut Stage, id: ActionId) {
        if stage.slot_of(id).is_some() {
            return;
        }
        if stage.parent(id).is_some() || !stage.has_target(id) {
            return;
        }
        let slot = self.entries.len();
        self.entries.push(Entry {
            id: Some(id),
            started: false,
        });
        stage.set_slot(id, Some(slot));
    }

    /// Drop a root from the registry, freezing it at its current position.
    pub fn deregister(&mut self, stage: &mut Stage, id: ActionId) {
        if let Some(slot) = stage.slot_of(id) {
            if let Some(entry) = self.entries.get_mut(slot) {
                entry.id = None;
            }
            stage.set_slot(id, None);
        }
    }

    /// Tick every playing root with the time elapsed since the previous
    /// tick, clamped to [`MAX_ELAPSED_MS`]. `now` is a monotonic timestamp
    /// in milliseconds.
    pub fn advance(&mut self, stage: &mut Stage, now: u64) {
        if self.entries.is_empty() {
            // An empty tick leaves the clock unobserved so the first real
            // tick after a quiet stretch starts from a fresh baseline.
            return;
        }
        let elapsed = match self.prev_time {
            Some(prev) => now.saturating_sub(prev).min(MAX_ELAPSED_MS),
            None => 0,
        };
        self.prev_time = Some(now);

        for i in 0..self.entries.len() {
            let Some(id) = self.entries[i].id else { continue };
            if !stage.contains(id) {
                self.entries[i].id = None;
                continue;
            }
            if !self.entries[i].started {
                // Priming pass: a fresh tree initializes its cursors and
                // applies its first frame; a resumed or sought tree keeps
                // its position.
                self.entries[i].started = true;
                stage.advance(id, 0, false);
            } else if stage.advance(id, elapsed, false) > 0 {
                // Terminal leftover: the tree is done playing.
                stage.set_slot(id, None);
                self.entries[i].id = None;
            }
        }

        self.compact(stage);
    }

    fn compact(&mut self, stage: &mut Stage) {
        if self.entries.iter().all(|e| e.id.is_some()) {
            return;
        }
        self.entries.retain(|e| e.id.is_some());
        for (slot, entry) in self.entries.iter().enumerate() {
            if let Some(id) = entry.id {
                stage.set_slot(id, Some(slot));
            }
        }
    }
}
