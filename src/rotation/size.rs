//! Size-threshold rotation

use serde::{Deserialize, Serialize};

use super::{RotationCheck, RotationPolicy};
use crate::config::{ConfigError, ConfigResult};

/// Size units for [`FileSizeRotationPolicy`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SizeUnits {
    /// Kilobytes (2^10)
    Kb,
    /// Megabytes (2^20)
    Mb,
    /// Gigabytes (2^30)
    Gb,
    /// Terabytes (2^40)
    Tb,
}

impl SizeUnits {
    /// Bytes per unit
    pub fn byte_count(&self) -> u64 {
        match self {
            SizeUnits::Kb => 1 << 10,
            SizeUnits::Mb => 1 << 20,
            SizeUnits::Gb => 1 << 30,
            SizeUnits::Tb => 1 << 40,
        }
    }
}

/// Rotates before a write that would push the file past `max_bytes`.
///
/// The check runs before bytes are written, so a file only exceeds the
/// threshold when a single record is larger than the threshold on its own.
#[derive(Debug, Clone, PartialEq)]
pub struct FileSizeRotationPolicy {
    count: f64,
    max_bytes: u64,
}

impl FileSizeRotationPolicy {
    /// Threshold of `count` units, e.g. `new(5.0, SizeUnits::Mb)`
    pub fn new(count: f64, units: SizeUnits) -> Self {
        let max_bytes = if count.is_finite() && count > 0.0 {
            (count * units.byte_count() as f64) as u64
        } else {
            0
        };
        Self { count, max_bytes }
    }

    /// Threshold of an exact number of bytes
    pub fn from_bytes(max_bytes: u64) -> Self {
        Self {
            count: max_bytes as f64,
            max_bytes,
        }
    }

    /// Threshold in bytes
    pub fn max_bytes(&self) -> u64 {
        self.max_bytes
    }
}

impl RotationPolicy for FileSizeRotationPolicy {
    fn should_rotate(&self, check: &RotationCheck) -> bool {
        check.bytes_written.saturating_add(check.incoming) > self.max_bytes
    }

    fn validate(&self) -> ConfigResult<()> {
        if self.max_bytes == 0 {
            return Err(ConfigError::NonPositiveThreshold {
                policy: "size",
                value: self.count.to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn check(bytes_written: u64, incoming: u64) -> RotationCheck {
        RotationCheck {
            bytes_written,
            age: Duration::ZERO,
            incoming,
        }
    }

    #[test]
    fn test_units() {
        assert_eq!(FileSizeRotationPolicy::new(5.0, SizeUnits::Mb).max_bytes(), 5 * 1024 * 1024);
        assert_eq!(FileSizeRotationPolicy::new(1.5, SizeUnits::Kb).max_bytes(), 1536);
        assert_eq!(SizeUnits::Tb.byte_count(), 1 << 40);
    }

    #[test]
    fn test_rotates_only_when_write_would_exceed() {
        let policy = FileSizeRotationPolicy::from_bytes(100);
        assert!(!policy.should_rotate(&check(95, 5)));
        assert!(policy.should_rotate(&check(96, 5)));
        assert!(!policy.should_rotate(&check(0, 100)));
    }

    #[test]
    fn test_non_positive_threshold_is_rejected() {
        for policy in [
            FileSizeRotationPolicy::new(0.0, SizeUnits::Mb),
            FileSizeRotationPolicy::new(-1.0, SizeUnits::Kb),
            FileSizeRotationPolicy::new(f64::NAN, SizeUnits::Kb),
            FileSizeRotationPolicy::from_bytes(0),
        ] {
            assert!(matches!(
                policy.validate(),
                Err(ConfigError::NonPositiveThreshold { policy: "size", .. })
            ));
        }
        assert!(FileSizeRotationPolicy::from_bytes(1).validate().is_ok());
    }

    #[test]
    fn test_units_deserialize_uppercase() {
        let units: SizeUnits = serde_json::from_str("\"MB\"").unwrap();
        assert_eq!(units, SizeUnits::Mb);
    }
}
