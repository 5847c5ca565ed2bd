//! Hybrid Logical Clock timestamps used for LWW ordering.
//!
//! Combines physical time with a logical counter so that:
//! - timestamps are monotonic even across multiple events in the same
//!   millisecond,
//! - two timestamps are always totally ordered, and
//! - the ordering agrees with wall-clock time whenever wall-clock time
//!   actually advanced.
//!
//! Based on the HLC algorithm from "Logical Physical Clocks" (Kulkarni et al.).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::time::{SystemTime, UNIX_EPOCH};

/// A hybrid logical timestamp: wall-clock milliseconds plus a logical
/// counter that disambiguates same-millisecond events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Timestamp {
    /// Physical time component (milliseconds since Unix epoch).
    wall_time: u64,
    /// Logical counter for ordering events at the same wall time.
    logical: u32,
}

impl Timestamp {
    /// Creates a new timestamp at the current time.
    #[must_use]
    pub fn now() -> Self {
        Self {
            wall_time: now_millis(),
            logical: 0,
        }
    }

    /// Creates a timestamp from components.
    #[must_use]
    pub const fn new(wall_time: u64, logical: u32) -> Self {
        Self { wall_time, logical }
    }

    #[must_use]
    pub const fn wall_time(&self) -> u64 {
        self.wall_time
    }

    #[must_use]
    pub const fn logical(&self) -> u32 {
        self.logical
    }

    /// Generates the next timestamp for a local event, ensuring it is
    /// strictly greater than `self`.
    #[must_use]
    pub fn tick(&self) -> Self {
        let now = now_millis();
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

    /// Merges in a received timestamp, returning a value greater than
    /// both `self` and `other` (HLC merge-on-receive).
    #[must_use]
    pub fn receive(&self, other: &Self) -> Self {
        let now = now_millis();
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

    /// Renders this timestamp as an RFC 3339 / ISO 8601 string.
    ///
    /// The logical counter is folded into the nanosecond field so two
    /// timestamps with the same wall-clock millisecond but different
    /// logical counters still produce distinct, and correctly ordered,
    /// strings. This keeps the fingerprint leaf (`t: timestamp.iso8601`)
    /// sensitive to the full ordering key, not just wall-clock time.
    #[must_use]
    pub fn to_iso8601(&self) -> String {
        let millis = i64::try_from(self.wall_time).unwrap_or(i64::MAX);
        let base = DateTime::<Utc>::from_timestamp_millis(millis).unwrap_or_else(|| {
            DateTime::<Utc>::from_timestamp(0, 0).expect("epoch is representable")
        });
        let nanos = i64::from(self.logical.min(999_999));
        let stamped = base + chrono::Duration::nanoseconds(nanos);
        stamped.to_rfc3339_opts(chrono::SecondsFormat::Nanos, true)
    }

    #[must_use]
    pub fn is_before(&self, other: &Self) -> bool {
        self < other
    }

    #[must_use]
    pub fn is_after(&self, other: &Self) -> bool {
        self > other
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system time before Unix epoch")
        .as_millis() as u64
}

impl Default for Timestamp {
    fn default() -> Self {
        Self::now()
    }
}

impl PartialOrd for Timestamp {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Timestamp {
    fn cmp(&self, other: &Self) -> Ordering {
        match self.wall_time.cmp(&other.wall_time) {
            Ordering::Equal => self.logical.cmp(&other.logical),
            other => other,
        }
    }
}
