//! Delay applied before each dispatch

use crate::defaults;
use crate::models::ProbeConfig;
use rand::Rng;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DelayPolicy {
    /// Same pause before every dispatch
    Fixed(Duration),
    /// Uniform draw from `[0, max)` before every dispatch
    Random { max: Duration },
}

impl DelayPolicy {
    /// Throttle replaces the fixed delay with a random one
    pub fn from_config(config: &ProbeConfig) -> Self {
        if config.throttle {
            DelayPolicy::Random {
                max: Duration::from_millis(defaults::MAX_THROTTLE_DELAY_MS),
            }
        } else {
            DelayPolicy::Fixed(config.delay)
        }
    }

    pub fn next_delay(&self) -> Duration {
        match *self {
            DelayPolicy::Fixed(delay) => delay,
            DelayPolicy::Random { max } => {
                let max_ms = max.as_millis() as u64;
                if max_ms == 0 {
                    Duration::ZERO
                } else {
                    Duration::from_millis(rand::thread_rng().gen_range(0..max_ms))
                }
            }
        }
    }
}
