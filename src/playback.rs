//! Playback planning: pass directions, index order, and frame decimation.
//!
//! A [`PlaybackPlan`] is `repeat_passes` traversals of the whole video.
//! Passes alternate direction starting forward, so a three-pass plan plays
//! forward, backward, forward.
//!
//! Decimation is decided on the *physical* frame index, not on the position
//! within the pass, so a reverse pass feeds exactly the frames a forward
//! pass would.
//!
//! # Example
//!
//! ```
//! use posefeed::{Direction, PlaybackSequencer};
//!
//! let sequencer = PlaybackSequencer::new(4);
//! let plan = sequencer.plan(10, 2);
//!
//! let directions: Vec<Direction> = plan.passes().map(|pass| pass.direction()).collect();
//! assert_eq!(directions, [Direction::Forward, Direction::Reverse]);
//!
//! let fed: Vec<u64> = plan
//!     .passes()
//!     .nth(1)
//!     .unwrap()
//!     .entries()
//!     .map(|entry| entry.physical_index)
//!     .filter(|&index| sequencer.should_feed(index))
//!     .collect();
//! assert_eq!(fed, [8, 4, 0]);
//! ```

use std::fmt::{Display, Formatter, Result as FmtResult};

/// Playback direction of one pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Reverse,
}

impl Direction {
    /// Direction of pass `pass_number` (0-indexed): even forward, odd reverse.
    pub fn for_pass(pass_number: u32) -> Self {
        if pass_number % 2 == 0 {
            Direction::Forward
        } else {
            Direction::Reverse
        }
    }
}

impl Display for Direction {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            Direction::Forward => f.write_str("forward"),
            Direction::Reverse => f.write_str("reverse"),
        }
    }
}

/// One visited position of a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlanEntry {
    /// Enumeration counter within the pass, `0..frame_count`.
    pub position: u64,
    /// Frame index in the video after applying the pass direction.
    pub physical_index: u64,
    /// `true` for the final position of the pass.
    pub is_last_in_pass: bool,
}

/// One full traversal of the video.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaybackPass {
    number: u32,
    direction: Direction,
    frame_count: u64,
}

impl PlaybackPass {
    /// 0-indexed pass number.
    pub fn number(&self) -> u32 {
        self.number
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Number of positions visited by this pass.
    pub fn len(&self) -> u64 {
        self.frame_count
    }

    pub fn is_empty(&self) -> bool {
        self.frame_count == 0
    }

    /// Positions of this pass, in visiting order.
    pub fn entries(&self) -> impl Iterator<Item = PlanEntry> + use<> {
        let frame_count = self.frame_count;
        let direction = self.direction;
        (0..frame_count).map(move |position| PlanEntry {
            position,
            physical_index: match direction {
                Direction::Forward => position,
                Direction::Reverse => frame_count - 1 - position,
            },
            is_last_in_pass: position + 1 == frame_count,
        })
    }
}

/// The ordered passes of a run. Cheap to copy; entries are generated lazily.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaybackPlan {
    frame_count: u64,
    repeat_passes: u32,
}

impl PlaybackPlan {
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    pub fn pass_count(&self) -> u32 {
        self.repeat_passes
    }

    /// Total number of positions visited across all passes.
    pub fn total_entries(&self) -> u64 {
        self.frame_count * u64::from(self.repeat_passes)
    }

    pub fn passes(&self) -> impl Iterator<Item = PlaybackPass> + use<> {
        let frame_count = self.frame_count;
        (0..self.repeat_passes).map(move |number| PlaybackPass {
            number,
            direction: Direction::for_pass(number),
            frame_count,
        })
    }
}

/// Builds playback plans and applies the frame-skip policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaybackSequencer {
    frame_skip: u64,
}

impl PlaybackSequencer {
    /// A sequencer feeding every `frame_skip`-th physical frame.
    ///
    /// A stride of zero is treated as one.
    pub fn new(frame_skip: u64) -> Self {
        Self {
            frame_skip: frame_skip.max(1),
        }
    }

    pub fn frame_skip(&self) -> u64 {
        self.frame_skip
    }

    pub fn plan(&self, frame_count: u64, repeat_passes: u32) -> PlaybackPlan {
        PlaybackPlan {
            frame_count,
            repeat_passes,
        }
    }

    /// Whether the frame at `physical_index` is delivered to the engine.
    pub fn should_feed(&self, physical_index: u64) -> bool {
        physical_index % self.frame_skip == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reverse_pass_maps_indices_backwards() {
        let plan = PlaybackSequencer::new(1).plan(5, 2);
        let reverse = plan.passes().nth(1).unwrap();
        let indices: Vec<u64> = reverse.entries().map(|entry| entry.physical_index).collect();
        assert_eq!(indices, [4, 3, 2, 1, 0]);
    }

    #[test]
    fn only_final_position_is_last() {
        let plan = PlaybackSequencer::new(1).plan(3, 1);
        let flags: Vec<bool> = plan
            .passes()
            .flat_map(|pass| pass.entries())
            .map(|entry| entry.is_last_in_pass)
            .collect();
        assert_eq!(flags, [false, false, true]);
    }

    #[test]
    fn empty_video_yields_empty_passes() {
        let plan = PlaybackSequencer::new(1).plan(0, 3);
        assert_eq!(plan.passes().count(), 3);
        assert_eq!(plan.total_entries(), 0);
        assert!(plan.passes().all(|pass| pass.entries().next().is_none()));
    }

    #[test]
    fn zero_skip_feeds_everything() {
        let sequencer = PlaybackSequencer::new(0);
        assert_eq!(sequencer.frame_skip(), 1);
        assert!((0..10).all(|index| sequencer.should_feed(index)));
    }
}
