//! The logical stamp attached to every cell and value write.
//!
//! A hybrid logical clock: physical milliseconds plus a logical counter for
//! events that share a wall time. Guarantees monotonicity per writer and a
//! total order across writers, which is what last-writer-wins merge needs.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::time::{SystemTime, UNIX_EPOCH};

/// A logical timestamp ordering concurrent writes during merge.
///
/// Consists of:
/// - `wall_time`: milliseconds since Unix epoch (physical component)
/// - `logical`: counter for events at the same wall time
///
/// Stamps are internal merge metadata only. They must never appear in the
/// durable or consumer-facing representation of a cell (see the stamp-leak
/// repair in the persister layer).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Stamp {
    /// Physical time component (milliseconds since Unix epoch).
    wall_time: u64,
    /// Logical counter for ordering events at the same wall time.
    logical: u32,
}

impl Stamp {
    /// Creates a stamp at the current time.
    #[must_use]
    pub fn now() -> Self {
        Self {
            wall_time: wall_now(),
            logical: 0,
        }
    }

    /// Creates a stamp from components.
    #[must_use]
    pub const fn new(wall_time: u64, logical: u32) -> Self {
        Self { wall_time, logical }
    }

    /// Returns the wall time component.
    #[must_use]
    pub const fn wall_time(&self) -> u64 {
        self.wall_time
    }

    /// Returns the logical counter.
    #[must_use]
    pub const fn logical(&self) -> u32 {
        self.logical
    }

    /// Generates the next stamp, ensuring monotonicity.
    ///
    /// Called for every local write, even when the system clock has not
    /// advanced since the previous one.
    #[must_use]
    pub fn tick(&self) -> Self {
        let now = wall_now();
        if now > self.wall_time {
            Self {
                wall_time: now,
                logical: 0,
            }
        } else {
            Self {
                wall_time: self.wall_time,
                logical: self.logical.saturating_add(1),
            }
        }
    }

    /// Advances this clock past a stamp received from another replica.
    ///
    /// Ensures the resulting stamp is greater than both the current clock
    /// and the received stamp, so writes made after a merge always win over
    /// the merged-in state.
    #[must_use]
    pub fn receive(&self, other: &Self) -> Self {
        let now = wall_now();
        let max_wall = now.max(self.wall_time).max(other.wall_time);

        let logical = if max_wall == self.wall_time && max_wall == other.wall_time {
            self.logical.max(other.logical).saturating_add(1)
        } else if max_wall == self.wall_time {
            self.logical.saturating_add(1)
        } else if max_wall == other.wall_time {
            other.logical.saturating_add(1)
        } else {
            0
        };

        Self {
            wall_time: max_wall,
            logical,
        }
    }
}

fn wall_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system time before Unix epoch")
        .as_millis() as u64
}

impl Default for Stamp {
    fn default() -> Self {
        Self::now()
    }
}

impl PartialOrd for Stamp {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Stamp {
    fn cmp(&self, other: &Self) -> Ordering {
        match self.wall_time.cmp(&other.wall_time) {
            Ordering::Equal => self.logical.cmp(&other.logical),
            other => other,
        }
    }
}
