//! Pure interval computation with bounded exponential backoff, driven by
//! `ShippingManager`.

use std::time::Duration;

use crate::error::ShippingError;

#[derive(Debug, Clone)]
pub struct UploadScheduler {
    min_interval: Duration,
    target_interval: Duration,
    current_interval: Duration,
    max: Duration,
}

impl UploadScheduler {
    /// # Errors
    /// Returns [`ShippingError::InvalidConfig`] unless
    /// `0 <= min_interval <= target_interval <= max`.
    pub fn new(
        min_interval: Duration,
        target_interval: Duration,
        initial_interval: Duration,
        max: Duration,
    ) -> Result<Self, ShippingError> {
        if min_interval > target_interval {
            return Err(ShippingError::InvalidConfig(
                "min_interval must not exceed target_interval".into(),
            ));
        }
        if max < target_interval {
            return Err(ShippingError::InvalidConfig(
                "max must be >= target_interval".into(),
            ));
        }
        Ok(Self {
            min_interval,
            target_interval,
            current_interval: initial_interval.min(target_interval),
            max,
        })
    }

    /// Returns the current interval, then doubles it, capping at
    /// `target_interval`.
    pub fn interval(&mut self) -> Duration {
        let current = self.current_interval;
        self.current_interval = (self.current_interval * 2).min(self.target_interval);
        current
    }

    #[must_use]
    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    #[must_use]
    pub fn target_interval(&self) -> Duration {
        self.target_interval
    }

    #[must_use]
    pub fn max(&self) -> Duration {
        self.max
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exponential_sequence_caps_at_target() {
        let mut scheduler = UploadScheduler::new(
            Duration::ZERO,
            Duration::from_secs(3600),
            Duration::from_secs(3),
            Duration::from_secs(3600),
        )
        .unwrap();

        let expected = [3, 6, 12, 24, 48, 96, 192, 384, 768, 1536, 3072, 3600, 3600, 3600];
        for expected_secs in expected {
            assert_eq!(scheduler.interval(), Duration::from_secs(expected_secs));
        }
    }

    #[test]
    fn rejects_max_below_target() {
        let err = UploadScheduler::new(
            Duration::ZERO,
            Duration::from_secs(100),
            Duration::from_secs(1),
            Duration::from_secs(50),
        )
        .unwrap_err();
        assert!(matches!(err, ShippingError::InvalidConfig(_)));
    }

    #[test]
    fn current_interval_never_exceeds_target() {
        let mut scheduler = UploadScheduler::new(
            Duration::ZERO,
            Duration::from_secs(10),
            Duration::from_secs(10),
            Duration::from_secs(100),
        )
        .unwrap();
        for _ in 0..5 {
            assert!(scheduler.interval() <= Duration::from_secs(10));
        }
    }
}
