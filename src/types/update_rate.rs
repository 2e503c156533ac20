//! Update rate control for snapshot streams

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Update rate for state snapshot streams
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum UpdateRate {
    /// Every state change as it is merged
    Native,

    /// Throttled to at most this many snapshots per second
    /// A rate of 0 is treated as Native
    Max(u32),
}

impl UpdateRate {
    /// Normalize the rate, folding `Max(0)` into `Native`
    pub fn normalize(self) -> Self {
        match self {
            UpdateRate::Max(0) => UpdateRate::Native,
            other => other,
        }
    }

    /// Check if throttling is needed
    pub fn needs_throttle(self) -> bool {
        matches!(self.normalize(), UpdateRate::Max(_))
    }

    /// Get throttle interval if needed
    pub fn throttle_interval(self) -> Option<Duration> {
        match self.normalize() {
            UpdateRate::Native => None,
            UpdateRate::Max(hz) => Some(Duration::from_secs_f64(1.0 / hz as f64)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_rate_means_native() {
        assert_eq!(UpdateRate::Max(0).normalize(), UpdateRate::Native);
        assert!(!UpdateRate::Max(0).needs_throttle());
        assert!(!UpdateRate::Native.needs_throttle());
        assert_eq!(UpdateRate::Max(4).throttle_interval(), Some(Duration::from_millis(250)));
    }
}
