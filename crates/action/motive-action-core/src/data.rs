//! Serializable clip descriptions.
//!
//! Authoring tools and test fixtures describe keyframe clips as plain data;
//! [`Stage::load_clip`](crate::stage::Stage::load_clip) turns a description
//! into frames on a live action, going through the same `add_frame` and
//! `set_frame_value` path as programmatic construction (including time
//! clamping and key backfill).

use serde::{Deserialize, Serialize};

use crate::interp::Curve;
use crate::value::PropertyMap;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct FrameData {
    pub time: u64,
    #[serde(default)]
    pub curve: Curve,
    #[serde(default)]
    pub values: PropertyMap,
}

/// A whole keyframe clip as data.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct ClipData {
    pub frames: Vec<FrameData>,
}

impl ClipData {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
