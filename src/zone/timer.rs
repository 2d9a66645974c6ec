//! Tick clock and tick-based countdown

use serde::{Deserialize, Serialize};

/// Simulation tick number
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Tick(pub u64);

/// Fixed simulation rate. A tick lasts `1 / ticks_per_second` seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickRate {
    ticks_per_second: u32,
}

impl TickRate {
    /// Rates below one tick per second are raised to one
    pub fn new(ticks_per_second: u32) -> Self {
        Self {
            ticks_per_second: ticks_per_second.max(1),
        }
    }

    pub fn ticks_per_second(&self) -> u32 {
        self.ticks_per_second
    }

    pub fn delta_secs(&self) -> f64 {
        1.0 / self.ticks_per_second as f64
    }

    /// Ticks needed to cover `seconds`, rounded up. Durations too long to
    /// count saturate at `u64::MAX`.
    pub fn ticks_for(&self, seconds: f32) -> u64 {
        if seconds <= 0.0 || seconds.is_nan() {
            return 0;
        }
        (seconds as f64 * self.ticks_per_second as f64).ceil() as u64
    }
}

/// Countdown that expires on a target tick.
///
/// Remaining time is always derived from the absolute target tick, so a
/// caller that skips ticks sees the correct value on the next call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TickTimer {
    target: Option<Tick>,
}

impl TickTimer {
    pub const NONE: TickTimer = TickTimer { target: None };

    /// Countdown of `seconds` starting at `now`. A target past the last
    /// representable tick is pinned there.
    pub fn from_seconds(now: Tick, rate: TickRate, seconds: f32) -> Self {
        Self {
            target: Some(Tick(now.0.saturating_add(rate.ticks_for(seconds)))),
        }
    }

    pub fn is_running(&self) -> bool {
        self.target.is_some()
    }

    /// True once `now` reaches the target tick. A stopped timer never expires.
    pub fn expired(&self, now: Tick) -> bool {
        matches!(self.target, Some(target) if now >= target)
    }

    pub fn remaining_ticks(&self, now: Tick) -> Option<u64> {
        self.target.map(|target| target.0.saturating_sub(now.0))
    }

    pub fn remaining_secs(&self, now: Tick, rate: TickRate) -> Option<f32> {
        self.remaining_ticks(now)
            .map(|ticks| (ticks as f64 * rate.delta_secs()) as f32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sixty_seconds_at_twenty_tps_is_1200_ticks() {
        let rate = TickRate::new(20);
        assert_eq!(rate.ticks_for(60.0), 1200);
        assert_eq!(rate.ticks_for(0.0), 0);
        assert_eq!(rate.ticks_for(0.01), 1);
    }

    #[test]
    fn timer_counts_down_from_absolute_target() {
        let rate = TickRate::new(20);
        let timer = TickTimer::from_seconds(Tick(100), rate, 1.0);

        assert!(timer.is_running());
        assert!(!timer.expired(Tick(119)));
        assert!(timer.expired(Tick(120)));
        assert!(timer.expired(Tick(500)));
        assert_eq!(timer.remaining_ticks(Tick(110)), Some(10));
        assert_eq!(timer.remaining_secs(Tick(130), rate), Some(0.0));
    }

    #[test]
    fn stopped_timer_never_expires() {
        let timer = TickTimer::NONE;
        assert!(!timer.is_running());
        assert!(!timer.expired(Tick(u64::MAX)));
        assert_eq!(timer.remaining_secs(Tick(0), TickRate::new(30)), None);
    }

    #[test]
    fn unbounded_durations_pin_the_target() {
        let rate = TickRate::new(20);
        assert_eq!(rate.ticks_for(f32::INFINITY), u64::MAX);

        let timer = TickTimer::from_seconds(Tick(25), rate, 1e30);
        assert!(!timer.expired(Tick(u64::MAX - 1)));
        assert!(timer.expired(Tick(u64::MAX)));
        assert_eq!(timer.remaining_ticks(Tick(25)), Some(u64::MAX - 25));

        let timer = TickTimer::from_seconds(Tick(25), rate, f32::INFINITY);
        assert_eq!(timer.remaining_ticks(Tick(30)), Some(u64::MAX - 30));
    }

    #[test]
    fn zero_rate_is_raised_to_one() {
        assert_eq!(TickRate::new(0).ticks_per_second(), 1);
    }
}
