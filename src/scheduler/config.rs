//! Scheduler configuration.
//!
//! Yield granularity is a tunable, not a constant: a slice is bounded either
//! by a count of work units (one unit = one parent's child list) or by wall
//! time. Hosts usually load this from their own config file:
//!
//! ```toml
//! max_interruptions = 5
//! frame_interval_ms = 8
//!
//! [slice]
//! time_ms = 4
//! ```

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::reconciler::StepBudget;

/// How much work one slice may do before yielding to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SliceBudget {
    /// Fixed number of work units.
    Units(usize),
    /// Wall-clock milliseconds, checked after every unit.
    TimeMs(u64),
}

impl Default for SliceBudget {
    fn default() -> Self {
        SliceBudget::Units(64)
    }
}

/// Scheduler tunables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Bound on a single slice.
    pub slice: SliceBudget,
    /// Interruptions a Transition item tolerates before it is escalated and
    /// runs to completion.
    pub max_interruptions: u32,
    /// Frame interval used by [`FrameLoop`](crate::pipeline::FrameLoop).
    pub frame_interval_ms: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            slice: SliceBudget::default(),
            max_interruptions: 3,
            frame_interval_ms: 16,
        }
    }
}

impl SchedulerConfig {
    /// Reject values the scheduler cannot make progress with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.slice {
            SliceBudget::Units(0) | SliceBudget::TimeMs(0) => {
                return Err(ConfigError::EmptySliceBudget);
            }
            _ => {}
        }
        if self.frame_interval_ms == 0 {
            return Err(ConfigError::ZeroFrameInterval);
        }
        Ok(())
    }

    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms)
    }

    /// Budget for one slice, clipped to the host's deadline if there is one.
    pub fn step_budget(&self, deadline: Option<Instant>) -> StepBudget {
        match self.slice {
            SliceBudget::Units(units) => StepBudget { units, deadline },
            SliceBudget::TimeMs(ms) => {
                let own = Instant::now() + Duration::from_millis(ms);
                StepBudget {
                    units: usize::MAX,
                    deadline: Some(deadline.map_or(own, |host| host.min(own))),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = SchedulerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.slice, SliceBudget::Units(64));
        assert_eq!(config.frame_interval(), Duration::from_millis(16));
    }

    #[test]
    fn test_empty_budget_rejected() {
        let config = SchedulerConfig {
            slice: SliceBudget::Units(0),
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::EmptySliceBudget));

        let config = SchedulerConfig {
            frame_interval_ms: 0,
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::ZeroFrameInterval));
    }

    #[test]
    fn test_time_budget_respects_host_deadline() {
        let config = SchedulerConfig {
            slice: SliceBudget::TimeMs(1_000),
            ..Default::default()
        };
        let host = Instant::now() + Duration::from_millis(5);
        let budget = config.step_budget(Some(host));
        assert_eq!(budget.deadline, Some(host));
        assert_eq!(budget.units, usize::MAX);
    }

    #[test]
    fn test_from_toml() {
        let config: SchedulerConfig = toml::from_str(
            r#"
            max_interruptions = 5

            [slice]
            time_ms = 4
            "#,
        )
        .unwrap();

        assert_eq!(config.slice, SliceBudget::TimeMs(4));
        assert_eq!(config.max_interruptions, 5);
        assert_eq!(config.frame_interval_ms, 16);
    }
}
