use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

/// Adaptive poll-interval limiter. The exposed interval doubles with every
/// unmatched rate-limit hit and is halved back down on success, capped at
/// `max_interval`. This is the sole throttle on feed polling.
pub struct AdaptiveRateLimiter {
    base_interval: f64,
    max_interval: f64,
    consecutive_hits: AtomicU32,
}

impl AdaptiveRateLimiter {
    pub fn new(base_interval: f64, max_interval: f64) -> Self {
        AdaptiveRateLimiter {
            base_interval,
            max_interval,
            consecutive_hits: AtomicU32::new(0),
        }
    }

    pub fn current_interval(&self) -> f64 {
        let k = self.consecutive_hits.load(Ordering::Relaxed);
        let scaled = self.base_interval * 2f64.powi(k as i32);
        scaled.min(self.max_interval)
    }

    pub async fn acquire(&self) {
        let secs = self.current_interval();
        tokio::time::sleep(Duration::from_secs_f64(secs)).await;
    }

    pub fn on_rate_limit(&self) {
        self.consecutive_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn on_success(&self) {
        let _ = self
            .consecutive_hits
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |k| {
                if k == 0 {
                    None
                } else {
                    Some(k - 1)
                }
            });
    }

    pub fn reset(&self) {
        self.consecutive_hits.store(0, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interval_doubles_and_caps() {
        let rl = AdaptiveRateLimiter::new(0.5, 5.0);
        assert_eq!(rl.current_interval(), 0.5);
        rl.on_rate_limit();
        assert_eq!(rl.current_interval(), 1.0);
        rl.on_rate_limit();
        assert_eq!(rl.current_interval(), 2.0);
        rl.on_rate_limit();
        assert_eq!(rl.current_interval(), 4.0);
        rl.on_rate_limit();
        assert_eq!(rl.current_interval(), 5.0); // capped
    }

    #[test]
    fn success_decrements_floor_zero() {
        let rl = AdaptiveRateLimiter::new(0.5, 5.0);
        rl.on_success();
        assert_eq!(rl.current_interval(), 0.5);
        rl.on_rate_limit();
        rl.on_rate_limit();
        rl.on_success();
        assert_eq!(rl.current_interval(), 1.0);
    }

    #[test]
    fn reset_zeros_counter() {
        let rl = AdaptiveRateLimiter::new(0.5, 5.0);
        rl.on_rate_limit();
        rl.on_rate_limit();
        rl.reset();
        assert_eq!(rl.current_interval(), 0.5);
    }
}
