#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use motive_action_core::{
    blend_snapshots, ActionId, ActionTarget, Curve, DomainId, PropertyMap, Stage, Value,
};

/// One application observed by a [`RecordingTarget`].
#[derive(Clone, Debug, PartialEq)]
pub enum Applied {
    Frame(PropertyMap),
    Blend { weight: f32, values: PropertyMap },
}

impl Applied {
    pub fn float(&self, key: &str) -> f32 {
        let values = match self {
            Applied::Frame(v) => v,
            Applied::Blend { values, .. } => values,
        };
        match values.get(key) {
            Some(Value::Float(f)) => *f,
            other => panic!("no float {key:?} in {other:?}"),
        }
    }

    pub fn weight(&self) -> f32 {
        match self {
            Applied::Blend { weight, .. } => *weight,
            Applied::Frame(_) => panic!("expected a blend, got {self:?}"),
        }
    }
}

/// Target that records every application for later assertions.
pub struct RecordingTarget {
    domain: DomainId,
    log: Arc<Mutex<Vec<Applied>>>,
}

impl ActionTarget for RecordingTarget {
    fn domain(&self) -> DomainId {
        self.domain
    }

    fn apply_frame(&mut self, frame: &PropertyMap) {
        self.log.lock().unwrap().push(Applied::Frame(frame.clone()));
    }

    fn apply_blend(&mut self, from: &PropertyMap, to: &PropertyMap, weight: f32) {
        self.log.lock().unwrap().push(Applied::Blend {
            weight,
            values: blend_snapshots(from, to, weight),
        });
    }
}

/// A recording target plus the shared log to inspect afterwards.
pub fn recording(domain: DomainId) -> (Box<dyn ActionTarget>, Arc<Mutex<Vec<Applied>>>) {
    let log = Arc::new(Mutex::new(Vec::new()));
    let target = RecordingTarget {
        domain,
        log: log.clone(),
    };
    (Box::new(target), log)
}

pub fn last_applied(log: &Arc<Mutex<Vec<Applied>>>) -> Applied {
    log.lock().unwrap().last().cloned().expect("nothing applied")
}

pub fn applied_count(log: &Arc<Mutex<Vec<Applied>>>) -> usize {
    log.lock().unwrap().len()
}

/// Keyframe action with linear segments where the "x" property equals the
/// frame time, so a correctly blended value equals the local time reached.
pub fn clip(stage: &mut Stage, times: &[u64]) -> ActionId {
    let id = stage.keyframe();
    for &t in times {
        let frame = stage.add_frame(id, t, Curve::Linear).unwrap();
        stage
            .set_frame_value(id, frame, "x", Value::Float(t as f32))
            .unwrap();
    }
    id
}

pub fn approx(a: f32, b: f32, eps: f32) {
    assert!((a - b).abs() <= eps, "left={a} right={b} eps={eps}");
}
