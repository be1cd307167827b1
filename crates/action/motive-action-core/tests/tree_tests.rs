mod common;

use common::{clip, recording};
use motive_action_core::{
    ActionError, Curve, DomainId, EventSender, Scheduler, Stage, Value,
};

fn stage() -> Stage {
    Stage::new(DomainId(0), EventSender::dummy())
}

#[test]
fn sequence_duration_is_sum_of_children() {
    let mut stage = stage();
    let seq = stage.sequence();
    let a = clip(&mut stage, &[0, 1000]);
    let b = clip(&mut stage, &[0, 2000]);
    stage.append(seq, a).unwrap();
    stage.append(seq, b).unwrap();
    assert_eq!(stage.duration(seq), 3000);
}

#[test]
fn spawn_duration_is_max_of_children() {
    let mut stage = stage();
    let group = stage.spawn();
    let a = clip(&mut stage, &[0, 1000]);
    let b = clip(&mut stage, &[0, 2000]);
    stage.append(group, a).unwrap();
    stage.append(group, b).unwrap();
    assert_eq!(stage.duration(group), 2000);
}

#[test]
fn duration_changes_propagate_to_ancestors() {
    let mut stage = stage();
    let root = stage.spawn();
    let seq = stage.sequence();
    let a = clip(&mut stage, &[0, 1000]);
    stage.append(seq, a).unwrap();
    stage.append(root, seq).unwrap();
    assert_eq!(stage.duration(root), 1000);

    // Growing the leaf grows the whole chain.
    stage.add_frame(a, 2500, Curve::Linear).unwrap();
    assert_eq!(stage.duration(a), 2500);
    assert_eq!(stage.duration(seq), 2500);
    assert_eq!(stage.duration(root), 2500);
}

#[test]
fn spawn_rederives_max_when_longest_child_leaves() {
    let mut stage = stage();
    let group = stage.spawn();
    let short = clip(&mut stage, &[0, 1000]);
    let long = clip(&mut stage, &[0, 5000]);
    stage.append(group, short).unwrap();
    stage.append(group, long).unwrap();
    assert_eq!(stage.duration(group), 5000);

    stage.remove(long).unwrap();
    assert_eq!(stage.duration(group), 1000);

    // Removing a non-longest child leaves the max untouched.
    let mid = clip(&mut stage, &[0, 500]);
    stage.append(group, mid).unwrap();
    stage.remove(mid).unwrap();
    assert_eq!(stage.duration(group), 1000);
}

#[test]
fn delay_counts_into_parent_duration() {
    let mut stage = stage();
    let seq = stage.sequence();
    let a = clip(&mut stage, &[0, 1000]);
    stage.append(seq, a).unwrap();
    stage.set_delay(a, 500).unwrap();
    // The child's playable span is unchanged; the sequence grows by the delay.
    assert_eq!(stage.duration(a), 1000);
    assert_eq!(stage.duration(seq), 1500);
}

#[test]
fn keyframe_actions_cannot_take_children() {
    let mut stage = stage();
    let leaf = clip(&mut stage, &[0, 1000]);
    let other = clip(&mut stage, &[0]);
    assert_eq!(
        stage.append(leaf, other),
        Err(ActionError::UnsupportedOperation)
    );
}

#[test]
fn parented_actions_cannot_be_reparented() {
    let mut stage = stage();
    let a = stage.sequence();
    let b = stage.sequence();
    let child = clip(&mut stage, &[0, 1000]);
    stage.append(a, child).unwrap();
    assert_eq!(stage.append(b, child), Err(ActionError::IllegalChild));
}

#[test]
fn target_carrying_actions_cannot_become_children() {
    let mut stage = stage();
    let group = stage.spawn();
    let a = clip(&mut stage, &[0, 1000]);
    let (target, _log) = recording(DomainId(0));
    stage.set_target(a, target).unwrap();
    assert_eq!(stage.append(group, a), Err(ActionError::IllegalChild));
}

#[test]
fn playing_roots_cannot_become_children() {
    let mut sched = Scheduler::new(DomainId(0));
    let root = {
        let stage = sched.stage_mut();
        clip(stage, &[0, 1000])
    };
    let (target, _log) = recording(DomainId(0));
    sched.stage_mut().set_target(root, target).unwrap();
    sched.play(root).unwrap();

    let group = sched.stage_mut().spawn();
    assert_eq!(
        sched.stage_mut().append(group, root),
        Err(ActionError::PlayingConflict)
    );
}

#[test]
fn cycles_are_rejected() {
    let mut stage = stage();
    let outer = stage.sequence();
    let inner = stage.spawn();
    stage.append(outer, inner).unwrap();
    assert_eq!(stage.append(outer, outer), Err(ActionError::IllegalChild));
    // `outer` already has no parent but is an ancestor of `inner`.
    assert_eq!(stage.append(inner, outer), Err(ActionError::IllegalChild));
}

#[test]
fn sibling_ops_need_a_parent() {
    let mut stage = stage();
    let lone = clip(&mut stage, &[0, 1000]);
    let other = clip(&mut stage, &[0, 1000]);
    assert_eq!(stage.insert_before(lone, other), Err(ActionError::NoParent));
    assert_eq!(stage.insert_after(lone, other), Err(ActionError::NoParent));
    assert_eq!(stage.remove(lone), Err(ActionError::NoParent));
}

#[test]
fn before_and_after_place_siblings() {
    let mut stage = stage();
    let seq = stage.sequence();
    let b = clip(&mut stage, &[0, 100]);
    stage.append(seq, b).unwrap();
    let a = clip(&mut stage, &[0, 100]);
    let c = clip(&mut stage, &[0, 100]);
    stage.insert_before(b, a).unwrap();
    stage.insert_after(b, c).unwrap();
    assert_eq!(stage.children(seq), vec![a, b, c]);
    assert_eq!(stage.duration(seq), 300);
}

#[test]
fn one_target_per_root() {
    let mut stage = stage();
    let root = clip(&mut stage, &[0, 1000]);
    let (first, _) = recording(DomainId(0));
    let (second, _) = recording(DomainId(0));
    stage.set_target(root, first).unwrap();
    assert_eq!(
        stage.set_target(root, second),
        Err(ActionError::MultipleTargets)
    );
}

#[test]
fn children_cannot_take_targets() {
    let mut stage = stage();
    let seq = stage.sequence();
    let child = clip(&mut stage, &[0, 1000]);
    stage.append(seq, child).unwrap();
    let (target, _) = recording(DomainId(0));
    assert_eq!(
        stage.set_target(child, target),
        Err(ActionError::MultipleTargets)
    );
}

#[test]
fn targets_must_match_the_domain() {
    let mut stage = stage();
    let root = clip(&mut stage, &[0, 1000]);
    let (foreign, _) = recording(DomainId(7));
    assert_eq!(
        stage.set_target(root, foreign),
        Err(ActionError::DomainMismatch)
    );
}

#[test]
fn playing_without_a_target_is_refused() {
    let mut sched = Scheduler::new(DomainId(0));
    let id = clip(sched.stage_mut(), &[0, 1000]);
    assert_eq!(sched.play(id), Err(ActionError::UnsupportedOperation));
    assert_eq!(sched.playing_count(), 0);

    // Attaching a target makes the same request succeed.
    let (target, _log) = recording(DomainId(0));
    sched.stage_mut().set_target(id, target).unwrap();
    sched.play(id).unwrap();
    assert_eq!(sched.playing_count(), 1);
}

#[test]
fn first_frame_is_pinned_to_zero() {
    let mut stage = stage();
    let id = stage.keyframe();
    let frame = stage.add_frame(id, 400, Curve::Linear).unwrap();
    assert_eq!(frame, 0);
    assert_eq!(stage.frame_time(id, 0), Some(0));
    assert_eq!(stage.duration(id), 0);
}

#[test]
fn non_increasing_frame_times_are_clamped() {
    let mut stage = stage();
    let id = stage.keyframe();
    stage.add_frame(id, 0, Curve::Linear).unwrap();
    stage.add_frame(id, 500, Curve::Linear).unwrap();
    let frame = stage.add_frame(id, 300, Curve::Linear).unwrap();
    assert_eq!(stage.frame_time(id, frame), Some(500));
    assert_eq!(stage.duration(id), 500);
}

#[test]
fn frame_values_backfill_missing_keys() {
    let mut stage = stage();
    let id = stage.keyframe();
    stage.add_frame(id, 0, Curve::Linear).unwrap();
    stage.add_frame(id, 100, Curve::Linear).unwrap();
    stage.add_frame(id, 200, Curve::Linear).unwrap();

    stage.set_frame_value(id, 1, "y", Value::Float(5.0)).unwrap();
    for frame in 0..3 {
        let values = stage.frame_values(id, frame).unwrap();
        assert_eq!(values.get("y"), Some(&Value::Float(5.0)));
    }

    // A later explicit write is not overwritten by backfill.
    stage.set_frame_value(id, 2, "y", Value::Float(9.0)).unwrap();
    let values = stage.frame_values(id, 2).unwrap();
    assert_eq!(values.get("y"), Some(&Value::Float(9.0)));
    let values = stage.frame_values(id, 1).unwrap();
    assert_eq!(values.get("y"), Some(&Value::Float(5.0)));
}

#[test]
fn frame_index_out_of_range_is_reported() {
    let mut stage = stage();
    let id = stage.keyframe();
    stage.add_frame(id, 0, Curve::Linear).unwrap();
    assert_eq!(
        stage.set_frame_value(id, 3, "x", Value::Float(0.0)),
        Err(ActionError::FrameOutOfRange)
    );
}

#[test]
fn new_frames_inherit_the_previous_snapshot() {
    let mut stage = stage();
    let id = stage.keyframe();
    stage.add_frame(id, 0, Curve::Linear).unwrap();
    stage.set_frame_value(id, 0, "x", Value::Float(3.0)).unwrap();
    stage.add_frame(id, 100, Curve::Linear).unwrap();
    let values = stage.frame_values(id, 1).unwrap();
    assert_eq!(values.get("x"), Some(&Value::Float(3.0)));
}

#[test]
fn clips_load_from_data() {
    let mut stage = stage();
    let id = stage.keyframe();
    let data = motive_action_core::ClipData::from_json(
        r#"{"frames":[
            {"time":0,"values":{"x":{"type":"Float","data":1.0}}},
            {"time":750,"values":{"x":{"type":"Float","data":4.0}}}
        ]}"#,
    )
    .unwrap();
    stage.load_clip(id, &data).unwrap();
    assert_eq!(stage.frame_count(id), 2);
    assert_eq!(stage.duration(id), 750);
    let values = stage.frame_values(id, 1).unwrap();
    assert_eq!(values.get("x"), Some(&Value::Float(4.0)));
    // Export mirrors what was loaded, including the default curve.
    assert_eq!(stage.clip_data(id).unwrap().frames[1].time, 750);
}

#[test]
fn dead_ids_yield_expired() {
    let mut stage = stage();
    let id = clip(&mut stage, &[0, 1000]);
    stage.destroy(id);
    assert_eq!(
        stage.add_frame(id, 2000, Curve::Linear),
        Err(ActionError::Expired)
    );
    assert_eq!(stage.set_delay(id, 10), Err(ActionError::Expired));
}
