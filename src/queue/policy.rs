//! Overflow policy applied when the bounded queue is full.
//!
//! Policies can be parsed from configuration strings so the environment layer
//! and the builder share one grammar.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::config::ConfigError;

const VALID_POLICIES: &str = "drop-oldest, block:N";

/// Determines how the queue reacts to a push while at capacity.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OverflowPolicy {
    /// Evict the head record and append the new one.
    #[default]
    DropOldest,
    /// Wait up to the given duration for space, then drop the new record.
    Block(Duration),
}

impl fmt::Display for OverflowPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DropOldest => f.write_str("drop-oldest"),
            Self::Block(wait) => write!(f, "block:{}", wait.as_millis()),
        }
    }
}

impl FromStr for OverflowPolicy {
    type Err = ConfigError;

    /// Accepts `drop-oldest` (also `drop_oldest` or `drop`) and `block:N`
    /// where `N` is a positive number of milliseconds.
    fn from_str(policy: &str) -> Result<Self, Self::Err> {
        let normalized = policy.trim().to_ascii_lowercase();

        if let Some(rest) = normalized.strip_prefix("block:") {
            let ms: u64 = rest.trim().parse().map_err(|_| {
                ConfigError::InvalidPolicy(
                    "block wait must be a positive integer (N in 'block:N')".into(),
                )
            })?;
            if ms == 0 {
                return Err(ConfigError::InvalidPolicy(
                    "block wait must be greater than zero".into(),
                ));
            }
            return Ok(Self::Block(Duration::from_millis(ms)));
        }

        match normalized.as_str() {
            "drop-oldest" | "drop_oldest" | "drop" => Ok(Self::DropOldest),
            "block" => Err(ConfigError::InvalidPolicy(
                "block requires a bounded wait, use 'block:N'".into(),
            )),
            _ => Err(ConfigError::InvalidPolicy(format!(
                "invalid overflow policy '{normalized}'. Valid options are: {VALID_POLICIES}"
            ))),
        }
    }
}
