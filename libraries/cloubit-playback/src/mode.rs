//! Mode-aware track advance
//!
//! Decides what `next`/`prev` do for a given playback mode, independent of
//! the engine and the queue storage.

use rand::Rng;

use crate::types::PlaybackMode;

/// Direction of an advance request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Next,
    Prev,
}

/// Outcome of an advance decision
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advance {
    /// Seek to zero and resume playback if paused (single repeat)
    Repeat,

    /// Seek to zero; nothing to advance to
    Rewind,

    /// Switch to the entry at this live queue position
    Select(usize),
}

/// Pick what an advance does
///
/// # Arguments
/// * `mode` - Active playback mode (callers pass `Sequential` for forced advances)
/// * `direction` - `Next` or `Prev`
/// * `current` - Live position of the current track, `None` if nothing is selected
/// * `count` - Queue length
/// * `rng` - Randomness source for `Random`
pub fn pick_advance<R: Rng + ?Sized>(
    mode: PlaybackMode,
    direction: Direction,
    current: Option<usize>,
    count: usize,
    rng: &mut R,
) -> Advance {
    match mode {
        PlaybackMode::SingleRepeat => Advance::Repeat,
        _ if count < 2 => Advance::Rewind,
        PlaybackMode::Sequential => Advance::Select(sequential_index(direction, current, count)),
        PlaybackMode::Random => Advance::Select(random_index(current, count, rng)),
    }
}

/// Step one entry forward or back, wrapping at both ends
fn sequential_index(direction: Direction, current: Option<usize>, count: usize) -> usize {
    match (direction, current) {
        (Direction::Next, None) => 0,
        (Direction::Next, Some(position)) => {
            let next = position + 1;
            if next >= count {
                0
            } else {
                next
            }
        }
        (Direction::Prev, None) => count - 1,
        (Direction::Prev, Some(position)) => {
            if position == 0 {
                count - 1
            } else {
                position - 1
            }
        }
    }
}

/// Uniform pick over `[0, count)` excluding the current position
///
/// Rejection sampling; `count >= 2` guarantees termination.
fn random_index<R: Rng + ?Sized>(current: Option<usize>, count: usize, rng: &mut R) -> usize {
    loop {
        let candidate = rng.gen_range(0..count);
        if Some(candidate) != current {
            return candidate;
        }
    }
}
