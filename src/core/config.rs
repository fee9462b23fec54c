/*!
 * Kernel Configuration
 *
 * Runtime configuration for the process-lifecycle core. Values come from
 * `Default`, one of the presets, or the environment via `from_env`.
 */

use super::limits::{DEFAULT_FRAME_COUNT, REAP_POLL_INTERVAL};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::warn;

/// How `waitpid` blocks until a child records its exit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum WaitStrategy {
    /// Release the child's lock, sleep `interval`, re-check
    Poll { interval: Duration },
    /// Sleep on the child's condition variable until it exits
    Notify,
}

impl Default for WaitStrategy {
    fn default() -> Self {
        Self::Poll {
            interval: REAP_POLL_INTERVAL,
        }
    }
}

/// Kernel configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KernelConfig {
    /// Blocking strategy used by `waitpid`
    pub wait_strategy: WaitStrategy,
    /// Optional pause of the parent right after `fork` starts the child
    pub fork_yield: Option<Duration>,
    /// Number of physical frames in the coremap
    pub frames: usize,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            wait_strategy: WaitStrategy::default(),
            fork_yield: None,
            frames: DEFAULT_FRAME_COUNT,
        }
    }
}

impl KernelConfig {
    /// Poll for child exit every `interval`
    pub const fn polling(interval: Duration) -> Self {
        Self {
            wait_strategy: WaitStrategy::Poll { interval },
            fork_yield: None,
            frames: DEFAULT_FRAME_COUNT,
        }
    }

    /// Block on a condition variable signalled by the exiting child
    pub const fn notifying() -> Self {
        Self {
            wait_strategy: WaitStrategy::Notify,
            fork_yield: None,
            frames: DEFAULT_FRAME_COUNT,
        }
    }

    #[inline]
    #[must_use]
    pub fn with_frames(mut self, frames: usize) -> Self {
        self.frames = frames;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_fork_yield(mut self, pause: Duration) -> Self {
        self.fork_yield = Some(pause);
        self
    }

    /// Build a configuration from the environment
    ///
    /// Environment variables:
    /// - KERNEL_WAIT_STRATEGY: `poll` or `notify` (default: poll)
    /// - KERNEL_REAP_POLL_MS: poll interval in milliseconds (default: 10)
    /// - KERNEL_FORK_YIELD_MS: pause after fork in milliseconds (default: none)
    /// - KERNEL_FRAMES: coremap size in frames (default: 1024)
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        let interval = parse_var::<u64>(&lookup, "KERNEL_REAP_POLL_MS")
            .map(Duration::from_millis)
            .unwrap_or(REAP_POLL_INTERVAL);

        config.wait_strategy = match lookup("KERNEL_WAIT_STRATEGY").as_deref() {
            None | Some("poll") => WaitStrategy::Poll { interval },
            Some("notify") => WaitStrategy::Notify,
            Some(other) => {
                warn!(value = other, "Unknown KERNEL_WAIT_STRATEGY, using poll");
                WaitStrategy::Poll { interval }
            }
        };

        config.fork_yield = parse_var::<u64>(&lookup, "KERNEL_FORK_YIELD_MS").map(Duration::from_millis);

        if let Some(frames) = parse_var::<usize>(&lookup, "KERNEL_FRAMES") {
            config.frames = frames;
        }

        config
    }
}

fn parse_var<T: std::str::FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(key, value = %raw, "Ignoring unparsable configuration value");
            None
        }
    }
}
