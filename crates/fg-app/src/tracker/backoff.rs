use std::time::Duration;

/// Delay schedule and safety valves for polling a single task.
///
/// `attempts` counts consecutive failed polls; any successful poll resets it,
/// so a healthy gateway is polled every `base_delay`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BackoffPolicy {
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub factor: f64,
    /// Give up after this many consecutive failures.
    pub max_attempts: u32,
    /// Give up this long after the task was created, whatever happens.
    pub ceiling: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(3_000),
            max_delay: Duration::from_millis(15_000),
            factor: 1.5,
            max_attempts: 20,
            ceiling: Duration::from_secs(300),
        }
    }
}

impl BackoffPolicy {
    /// `min(max_delay, base_delay * factor^attempts)`
    pub fn delay(&self, attempts: u32) -> Duration {
        let exponent = i32::try_from(attempts).unwrap_or(i32::MAX);
        let scaled = self.base_delay.as_secs_f64() * self.factor.powi(exponent);
        if !scaled.is_finite() || scaled >= self.max_delay.as_secs_f64() {
            return self.max_delay;
        }
        Duration::from_secs_f64(scaled)
    }

    pub fn exhausted(&self, attempts: u32) -> bool {
        attempts >= self.max_attempts
    }
}
