use std::fmt::Display;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Where an election is in its lifecycle, relative to the current time.
///
/// This is never stored; it is derived from the election's time window every
/// time an election is read.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ElectionStatus {
    /// Voting has not opened yet.
    Upcoming,
    /// Voting is open. Both ends of the window count as open.
    Active,
    /// Voting has finished; results are final.
    Closed,
}

impl ElectionStatus {
    /// Derive the status of an election open from `start` to `end` (inclusive) at time `now`.
    pub fn resolve(now: DateTime<Utc>, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        if now < start {
            Self::Upcoming
        } else if now <= end {
            Self::Active
        } else {
            Self::Closed
        }
    }

    pub fn is_active(self) -> bool {
        self == Self::Active
    }
}

impl Display for ElectionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Upcoming => "upcoming",
            Self::Active => "active",
            Self::Closed => "closed",
        };
        write!(f, "{s}")
    }
}
