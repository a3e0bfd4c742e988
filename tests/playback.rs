//! Playback plan tests: pass directions, index mapping and frame skip.

use std::collections::BTreeSet;

use posefeed::{Direction, PlaybackSequencer};

fn fed_indices(sequencer: PlaybackSequencer, frame_count: u64, pass: usize) -> Vec<u64> {
    let plan = sequencer.plan(frame_count, (pass + 1) as u32);
    plan.passes()
        .nth(pass)
        .unwrap()
        .entries()
        .map(|entry| entry.physical_index)
        .filter(|&index| sequencer.should_feed(index))
        .collect()
}

#[test]
fn frame_skip_four_feeds_every_fourth_frame() {
    let sequencer = PlaybackSequencer::new(4);
    let fed = fed_indices(sequencer, 100, 0);
    assert_eq!(fed.len(), 25);
    assert_eq!(fed, (0..100).step_by(4).collect::<Vec<u64>>());
}

#[test]
fn three_passes_alternate_direction() {
    let plan = PlaybackSequencer::new(1).plan(10, 3);
    let directions: Vec<Direction> = plan.passes().map(|pass| pass.direction()).collect();
    assert_eq!(
        directions,
        [Direction::Forward, Direction::Reverse, Direction::Forward]
    );
}

#[test]
fn reverse_pass_feeds_same_physical_frames() {
    let sequencer = PlaybackSequencer::new(3);
    let forward = fed_indices(sequencer, 20, 0);
    let reverse = fed_indices(sequencer, 20, 1);

    assert_ne!(forward, reverse);
    assert_eq!(
        forward.iter().collect::<BTreeSet<_>>(),
        reverse.iter().collect::<BTreeSet<_>>()
    );
    assert_eq!(reverse.first(), Some(&18));
}

#[test]
fn positions_restart_each_pass() {
    let plan = PlaybackSequencer::new(1).plan(3, 2);
    let positions: Vec<u64> = plan
        .passes()
        .flat_map(|pass| pass.entries())
        .map(|entry| entry.position)
        .collect();
    assert_eq!(positions, [0, 1, 2, 0, 1, 2]);
    assert_eq!(plan.total_entries(), 6);
}

#[test]
fn only_pass_final_entry_is_marked_last() {
    let plan = PlaybackSequencer::new(1).plan(3, 2);
    let last: Vec<bool> = plan
        .passes()
        .flat_map(|pass| pass.entries())
        .map(|entry| entry.is_last_in_pass)
        .collect();
    assert_eq!(last, [false, false, true, false, false, true]);
}

#[test]
fn empty_video_yields_empty_passes() {
    let plan = PlaybackSequencer::new(2).plan(0, 2);
    assert_eq!(plan.total_entries(), 0);
    assert!(plan.passes().all(|pass| pass.is_empty()));
}

#[test]
fn zero_skip_is_clamped_to_one() {
    let sequencer = PlaybackSequencer::new(0);
    assert_eq!(sequencer.frame_skip(), 1);
    assert!(sequencer.should_feed(7));
}
