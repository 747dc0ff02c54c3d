//! Chess-clock timing per side

use serde::{Deserialize, Serialize};

use super::board::Side;

/// Time-control presets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TimeControl {
    /// 3 minutes per side
    Bullet,
    /// 10 minutes per side
    #[default]
    Blitz,
    /// Effectively no limit
    Unlimited,
}

impl TimeControl {
    /// Starting budget per side, in seconds
    pub fn budget_secs(self) -> f64 {
        match self {
            TimeControl::Bullet => 180.0,
            TimeControl::Blitz => 600.0,
            TimeControl::Unlimited => 999_999.0,
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            TimeControl::Bullet => "Bullet",
            TimeControl::Blitz => "Blitz",
            TimeControl::Unlimited => "Unlimited",
        }
    }
}

/// Remaining seconds for both sides
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Clock {
    host_secs: f64,
    guest_secs: f64,
}

impl Clock {
    pub fn new(mode: TimeControl) -> Self {
        let budget = mode.budget_secs();
        Self {
            host_secs: budget,
            guest_secs: budget,
        }
    }

    /// Rebuild from stored values, clamping anything invalid to zero
    pub fn from_parts(host_secs: f64, guest_secs: f64) -> Self {
        Self {
            host_secs: sanitize(host_secs),
            guest_secs: sanitize(guest_secs),
        }
    }

    pub fn remaining(&self, side: Side) -> f64 {
        match side {
            Side::Host => self.host_secs,
            Side::Guest => self.guest_secs,
        }
    }

    /// What `side` would have left after `elapsed_secs`, without debiting
    pub fn remaining_at(&self, side: Side, elapsed_secs: f64) -> f64 {
        (self.remaining(side) - sanitize(elapsed_secs)).max(0.0)
    }

    /// Debit elapsed time from a side. Negative or non-finite input debits
    /// nothing; the result never drops below zero. Returns the new balance.
    pub fn debit(&mut self, side: Side, elapsed_secs: f64) -> f64 {
        let left = self.remaining_at(side, elapsed_secs);
        match side {
            Side::Host => self.host_secs = left,
            Side::Guest => self.guest_secs = left,
        }
        left
    }

    pub fn is_expired(&self, side: Side) -> bool {
        self.remaining(side) <= 0.0
    }
}

fn sanitize(secs: f64) -> f64 {
    if secs.is_finite() {
        secs.max(0.0)
    } else if secs == f64::INFINITY {
        f64::MAX
    } else {
        0.0
    }
}

/// Seconds between two unix-millisecond instants, zero if `to` precedes `from`
pub fn elapsed_secs(from_ms: u64, to_ms: u64) -> f64 {
    to_ms.saturating_sub(from_ms) as f64 / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn presets() {
        assert_eq!(Clock::new(TimeControl::Blitz).remaining(Side::Host), 600.0);
        assert_eq!(Clock::new(TimeControl::Bullet).remaining(Side::Guest), 180.0);
    }

    #[test]
    fn debit_clamps_at_zero() {
        let mut clock = Clock::new(TimeControl::Bullet);
        assert_eq!(clock.debit(Side::Host, 30.0), 150.0);
        assert_eq!(clock.debit(Side::Host, 1_000_000.0), 0.0);
        assert!(clock.is_expired(Side::Host));
        assert_eq!(clock.remaining(Side::Guest), 180.0);
    }

    #[test]
    fn bad_input_debits_nothing() {
        let mut clock = Clock::new(TimeControl::Blitz);
        assert_eq!(clock.debit(Side::Guest, -50.0), 600.0);
        assert_eq!(clock.debit(Side::Guest, f64::NAN), 600.0);
        assert_eq!(clock.debit(Side::Guest, f64::INFINITY), 0.0);
    }

    #[test]
    fn elapsed_never_negative() {
        assert_eq!(elapsed_secs(5_000, 2_000), 0.0);
        assert_eq!(elapsed_secs(1_000, 3_500), 2.5);
    }

    proptest! {
        #[test]
        fn debits_are_monotonic(deltas in proptest::collection::vec(-1e12f64..1e12, 1..20)) {
            let mut clock = Clock::new(TimeControl::Blitz);
            let mut last = clock.remaining(Side::Host);
            for delta in deltas {
                let now = clock.debit(Side::Host, delta);
                prop_assert!(now <= last);
                prop_assert!(now >= 0.0);
                last = now;
            }
        }
    }
}
