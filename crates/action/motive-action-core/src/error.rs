//! Error taxonomy for tree-shape operations.
//!
//! All failures are recoverable: the refused operation leaves the tree
//! untouched and the caller checks the result. These occur on the hot
//! scheduling path, so they are plain discriminants rather than boxed causes.

use thiserror::Error;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ActionError {
    /// The action already has a parent (or carries a target) and cannot be
    /// parented again.
    #[error("illegal child: action already has a parent or a bound target")]
    IllegalChild,

    /// The action is currently registered as a playing root.
    #[error("action is registered as a playing root and cannot be reparented")]
    PlayingConflict,

    /// The target or child belongs to a different scheduling domain.
    #[error("target or child belongs to a different scheduling domain")]
    DomainMismatch,

    /// `before`/`after`/`remove` on a parentless action. Invariably a
    /// programming mistake rather than a race; logged loudly when it arrives
    /// through the command queue.
    #[error("action has no parent")]
    NoParent,

    /// `set_target` on an action that already has a target or a parent.
    #[error("action already has a target or a parent")]
    MultipleTargets,

    /// The action's kind or state does not support the operation, e.g.
    /// appending a child to a keyframe action, or playing a root that has no
    /// target attached.
    #[error("operation is not supported by this action kind or state")]
    UnsupportedOperation,

    /// The id no longer resolves to a live action.
    #[error("action id no longer resolves to a live action")]
    Expired,

    /// A keyframe index past the end of the frame list.
    #[error("keyframe index out of range")]
    FrameOutOfRange,
}
