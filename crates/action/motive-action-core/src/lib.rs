//! Hierarchical action scheduling core.
//!
//! Actions form trees: [`Stage::keyframe`] leaves interpolate property
//! snapshots, [`Stage::spawn`] runs children in parallel (duration = max),
//! and [`Stage::sequence`] runs them in order (duration = sum). A playing
//! root is registered with an [`ActionCenter`] and driven once per tick with
//! the clamped wall-clock delta; each action scales incoming time by its own
//! speed, absorbs its delay, and unrolls whole loop passes inside a single
//! tick when the budget is large enough.
//!
//! Everything mutable lives on one scheduling thread. Other threads interact
//! through cloneable [`ActionHandle`]s, which enqueue [`Command`]s that the
//! [`Scheduler`] drains at the start of its tick. Events flow the other way
//! over a crossbeam channel.
//!
//! ```
//! use motive_action_core::{Curve, DomainId, Scheduler, Value};
//! # use motive_action_core::{ActionTarget, DomainId as D, PropertyMap};
//! # struct Sink;
//! # impl ActionTarget for Sink {
//! #     fn domain(&self) -> D { D(0) }
//! #     fn apply_frame(&mut self, _: &PropertyMap) {}
//! #     fn apply_blend(&mut self, _: &PropertyMap, _: &PropertyMap, _: f32) {}
//! # }
//!
//! let mut sched = Scheduler::new(DomainId(0));
//! let clip = sched.keyframe();
//! let f0 = sched.stage_mut().add_frame(clip.id(), 0, Curve::Linear).unwrap();
//! let f1 = sched.stage_mut().add_frame(clip.id(), 1000, Curve::Linear).unwrap();
//! sched.stage_mut().set_frame_value(clip.id(), f0, "x", Value::Float(0.0)).unwrap();
//! sched.stage_mut().set_frame_value(clip.id(), f1, "x", Value::Float(10.0)).unwrap();
//! sched.stage_mut().set_target(clip.id(), Box::new(Sink)).unwrap();
//! sched.play(clip.id()).unwrap();
//! sched.tick(0);
//! sched.tick(16);
//! ```

pub mod center;
pub mod commands;
pub mod data;
pub mod error;
pub mod events;
pub mod handle;
pub mod ids;
pub mod interp;
pub mod node;
pub mod scheduler;
pub mod stage;
pub mod target;
pub mod value;

pub use center::{ActionCenter, MAX_ELAPSED_MS};
pub use commands::Command;
pub use data::{ClipData, FrameData};
pub use error::ActionError;
pub use events::{ActionEvent, EventSender};
pub use handle::ActionHandle;
pub use ids::{ActionId, DomainId};
pub use interp::{Curve, EASE};
pub use node::{Frame, LoopLimit, MAX_SPEED, MIN_SPEED};
pub use scheduler::Scheduler;
pub use stage::{Stage, CURVE_TOLERANCE};
pub use target::ActionTarget;
pub use value::{blend_snapshots, PropertyMap, Value, ValueKind};
