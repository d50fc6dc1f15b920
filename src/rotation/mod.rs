//! Rotation policies and rotation actions
//!
//! A policy decides, before each record is written, whether the pending bytes
//! should land in a fresh file. Policies see the current file's size and age
//! plus the size of the pending write, and may be combined.
//!
//! Actions run on a data file after it has been rotated out.

mod action;
mod size;
mod timed;

pub use action::{MoveFileAction, RotationAction};
pub use size::{FileSizeRotationPolicy, SizeUnits};
pub use timed::{TimeUnits, TimedRotationPolicy};

use std::fmt;
use std::time::Duration;

use crate::config::{ConfigError, ConfigResult};

/// Inputs to a rotation decision
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RotationCheck {
    /// Bytes in the current file
    pub bytes_written: u64,
    /// Time since the current file was opened
    pub age: Duration,
    /// Bytes about to be written
    pub incoming: u64,
}

/// Decides whether the next write should go to a new file.
pub trait RotationPolicy: Send + fmt::Debug {
    /// Whether to rotate before writing `check.incoming` bytes
    fn should_rotate(&self, check: &RotationCheck) -> bool;

    /// Called after each rotation
    fn reset(&mut self) {}

    /// Check the configuration before the sink opens any file
    fn validate(&self) -> ConfigResult<()> {
        Ok(())
    }
}

/// Never rotates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NoRotationPolicy;

impl RotationPolicy for NoRotationPolicy {
    fn should_rotate(&self, _check: &RotationCheck) -> bool {
        false
    }
}

/// Rotates when any member policy asks for it.
#[derive(Debug, Default)]
pub struct CompositeRotationPolicy {
    policies: Vec<Box<dyn RotationPolicy>>,
}

impl CompositeRotationPolicy {
    /// Empty composite; add members with [`CompositeRotationPolicy::with`]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a member policy
    pub fn with(mut self, policy: impl RotationPolicy + 'static) -> Self {
        self.policies.push(Box::new(policy));
        self
    }

    /// Add an already boxed member policy
    pub fn push(&mut self, policy: Box<dyn RotationPolicy>) {
        self.policies.push(policy);
    }

    /// Number of member policies
    pub fn len(&self) -> usize {
        self.policies.len()
    }

    /// Whether there are no member policies
    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }
}

impl RotationPolicy for CompositeRotationPolicy {
    fn should_rotate(&self, check: &RotationCheck) -> bool {
        self.policies.iter().any(|p| p.should_rotate(check))
    }

    fn reset(&mut self) {
        for policy in &mut self.policies {
            policy.reset();
        }
    }

    fn validate(&self) -> ConfigResult<()> {
        if self.policies.is_empty() {
            return Err(ConfigError::EmptyCompositePolicy);
        }
        self.policies.iter().try_for_each(|p| p.validate())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check(bytes_written: u64, age_secs: u64, incoming: u64) -> RotationCheck {
        RotationCheck {
            bytes_written,
            age: Duration::from_secs(age_secs),
            incoming,
        }
    }

    #[test]
    fn test_no_rotation() {
        assert!(!NoRotationPolicy.should_rotate(&check(u64::MAX, u64::MAX, 1)));
    }

    #[test]
    fn test_composite_is_any_of() {
        let policy = CompositeRotationPolicy::new()
            .with(FileSizeRotationPolicy::from_bytes(100))
            .with(TimedRotationPolicy::new(1.0, TimeUnits::Minutes));

        assert!(!policy.should_rotate(&check(10, 10, 10)));
        assert!(policy.should_rotate(&check(95, 10, 10)));
        assert!(policy.should_rotate(&check(10, 61, 10)));
        assert_eq!(policy.len(), 2);
    }

    #[test]
    fn test_composite_validation() {
        assert_eq!(
            CompositeRotationPolicy::new().validate(),
            Err(ConfigError::EmptyCompositePolicy)
        );

        let bad = CompositeRotationPolicy::new()
            .with(FileSizeRotationPolicy::from_bytes(100))
            .with(FileSizeRotationPolicy::from_bytes(0));
        assert!(matches!(bad.validate(), Err(ConfigError::NonPositiveThreshold { .. })));
    }
}
