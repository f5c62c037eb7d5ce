//! Publish-rate divider.
//!
//! The render loop ticks at the display rate; commands go out on every
//! `divisor`-th tick.  Ticks taken while the link is down still count, and
//! the counter is only reset by a tick that actually publishes.

use odomviz_types::VizError;

/// Render ticks per publish slot.  At 60 Hz this gives 6 Hz.
pub const DEFAULT_PUBLISH_DIVISOR: u32 = 10;

#[derive(Debug, Clone)]
pub struct PublishThrottle {
    divisor: u32,
    counter: u32,
}

impl Default for PublishThrottle {
    fn default() -> Self {
        Self {
            divisor: DEFAULT_PUBLISH_DIVISOR,
            counter: 0,
        }
    }
}

impl PublishThrottle {
    pub fn new(divisor: u32) -> Result<Self, VizError> {
        if divisor == 0 {
            return Err(VizError::InvalidConfig(
                "publish divisor must be > 0".to_string(),
            ));
        }
        Ok(Self {
            divisor,
            counter: 0,
        })
    }

    /// Advance one render tick.
    ///
    /// Returns `true` when this tick is a publish slot, i.e. `ready` holds and
    /// at least `divisor` ticks have passed since the last slot.
    pub fn tick(&mut self, ready: bool) -> bool {
        self.counter = self.counter.saturating_add(1);
        if ready && self.counter >= self.divisor {
            self.counter = 0;
            return true;
        }
        false
    }

    pub fn divisor(&self) -> u32 {
        self.divisor
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_divisor_is_rejected() {
        assert!(PublishThrottle::new(0).is_err());
    }

    #[test]
    fn ready_link_gets_floor_n_over_k_slots() {
        for (ticks, divisor) in [(100, 10), (35, 10), (9, 10), (7, 1), (60, 7)] {
            let mut throttle = PublishThrottle::new(divisor).unwrap();
            let slots = (0..ticks).filter(|_| throttle.tick(true)).count() as u32;
            assert_eq!(slots, ticks / divisor, "ticks={ticks} divisor={divisor}");
        }
    }

    #[test]
    fn slot_lands_on_every_kth_tick() {
        let mut throttle = PublishThrottle::new(3).unwrap();
        let pattern: Vec<bool> = (0..6).map(|_| throttle.tick(true)).collect();
        assert_eq!(pattern, [false, false, true, false, false, true]);
    }

    #[test]
    fn unready_ticks_accumulate_until_link_is_up() {
        let mut throttle = PublishThrottle::new(10).unwrap();
        for _ in 0..25 {
            assert!(!throttle.tick(false));
        }
        // overdue, so the first ready tick publishes immediately
        assert!(throttle.tick(true));
        assert!(!throttle.tick(true));
    }
}
