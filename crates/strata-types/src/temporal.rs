use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// Commit timestamp: wall-clock milliseconds plus a logical counter.
///
/// The logical counter breaks ties between commits issued within the same
/// millisecond and keeps timestamps increasing when the wall clock stalls or
/// moves backwards (see [`Timestamp::next_after`]).
///
/// Ordering: `unix_ms` then `logical`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Timestamp {
    /// Wall-clock milliseconds since UNIX epoch.
    pub unix_ms: u64,
    /// Logical counter for commits at the same physical time.
    pub logical: u32,
}

impl Timestamp {
    pub const fn new(unix_ms: u64, logical: u32) -> Self {
        Self { unix_ms, logical }
    }

    /// The current wall-clock time.
    pub fn now() -> Self {
        let unix_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64;
        Self { unix_ms, logical: 0 }
    }

    /// The zero timestamp.
    pub const fn zero() -> Self {
        Self {
            unix_ms: 0,
            logical: 0,
        }
    }

    /// A timestamp for `now` that is strictly after `previous`.
    pub fn next_after(previous: Option<Timestamp>, now: Timestamp) -> Self {
        match previous {
            Some(prev) if now <= prev => Self::new(prev.unix_ms, prev.logical.saturating_add(1)),
            _ => now,
        }
    }
}

impl fmt::Debug for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Timestamp({}ms.{})", self.unix_ms, self.logical)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.unix_ms, self.logical)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordering_physical_first() {
        assert!(Timestamp::new(100, 5) < Timestamp::new(200, 0));
        assert!(Timestamp::new(100, 1) < Timestamp::new(100, 2));
    }

    #[test]
    fn now_produces_reasonable_timestamp() {
        let ts = Timestamp::now();
        // After 2020-01-01.
        assert!(ts.unix_ms > 1_577_836_800_000);
        assert_eq!(ts.logical, 0);
    }

    #[test]
    fn next_after_uses_wall_clock_when_ahead() {
        let prev = Timestamp::new(100, 3);
        let now = Timestamp::new(150, 0);
        assert_eq!(Timestamp::next_after(Some(prev), now), now);
        assert_eq!(Timestamp::next_after(None, now), now);
    }

    #[test]
    fn next_after_bumps_logical_when_clock_stalls_or_regresses() {
        let prev = Timestamp::new(100, 3);
        assert_eq!(
            Timestamp::next_after(Some(prev), Timestamp::new(100, 0)),
            Timestamp::new(100, 4)
        );
        assert_eq!(
            Timestamp::next_after(Some(prev), Timestamp::new(90, 0)),
            Timestamp::new(100, 4)
        );
    }

    #[test]
    fn display_format() {
        assert_eq!(Timestamp::new(1000, 5).to_string(), "1000.5");
    }
}
