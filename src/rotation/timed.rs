//! Age-threshold rotation
//!
//! The age is supplied by the channel at each write, so no timer thread is
//! involved: an idle file is rotated on the first write after it ages out.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::{RotationCheck, RotationPolicy};
use crate::config::{ConfigError, ConfigResult};

/// Time units for [`TimedRotationPolicy`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TimeUnits {
    Seconds,
    Minutes,
    Hours,
    Days,
}

impl TimeUnits {
    /// Seconds per unit
    pub fn seconds(&self) -> u64 {
        match self {
            TimeUnits::Seconds => 1,
            TimeUnits::Minutes => 60,
            TimeUnits::Hours => 60 * 60,
            TimeUnits::Days => 24 * 60 * 60,
        }
    }
}

/// Rotates once the current file is at least `interval` old.
#[derive(Debug, Clone, PartialEq)]
pub struct TimedRotationPolicy {
    count: f64,
    interval: Duration,
}

impl TimedRotationPolicy {
    /// Interval of `count` units, e.g. `new(1.0, TimeUnits::Hours)`
    pub fn new(count: f64, units: TimeUnits) -> Self {
        let interval = if count.is_finite() && count > 0.0 {
            Duration::from_secs_f64(count * units.seconds() as f64)
        } else {
            Duration::ZERO
        };
        Self { count, interval }
    }

    /// Exact interval
    pub fn from_interval(interval: Duration) -> Self {
        Self {
            count: interval.as_secs_f64(),
            interval,
        }
    }

    /// Rotation interval
    pub fn interval(&self) -> Duration {
        self.interval
    }
}

impl RotationPolicy for TimedRotationPolicy {
    fn should_rotate(&self, check: &RotationCheck) -> bool {
        check.age >= self.interval
    }

    fn validate(&self) -> ConfigResult<()> {
        if self.interval.is_zero() {
            return Err(ConfigError::NonPositiveThreshold {
                policy: "timed",
                value: self.count.to_string(),
            });
        }
        Ok(())
    }
}
