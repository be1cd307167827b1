//! External mutation targets.
//!
//! Property storage and blending live outside this crate. A playing root
//! action holds one boxed target and drives it through this interface only.

use crate::ids::DomainId;
use crate::value::PropertyMap;

/// An external object mutated by a playing action tree.
///
/// Both apply methods are synchronous and are only ever invoked from the
/// scheduling thread; any further thread-affinity contract is the target's
/// own responsibility. `Send` is required so a target can be shipped to the
/// scheduling thread inside a command.
pub trait ActionTarget: Send {
    /// The scheduling domain this target belongs to. Checked on attachment.
    fn domain(&self) -> DomainId;

    /// Apply a full keyframe snapshot discretely.
    fn apply_frame(&mut self, frame: &PropertyMap);

    /// Apply a blended transition between two snapshots at `weight` in [0,1].
    fn apply_blend(&mut self, from: &PropertyMap, to: &PropertyMap, weight: f32);
}
