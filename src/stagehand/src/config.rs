//! Tuning parameters shared by the background workers.

use std::{env, time::Duration};

use thiserror::Error;

/// Environment variable overriding [`Tuning::poll_interval`], in milliseconds.
pub const STAGEHAND_POLL_INTERVAL_MS: &str = "STAGEHAND_POLL_INTERVAL_MS";

/// Environment variable overriding [`Tuning::look_ahead`].
pub const STAGEHAND_LOOK_AHEAD: &str = "STAGEHAND_LOOK_AHEAD";

/// The default upper bound for a single idle wait.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(20);

/// The default number of items a reader produces ahead of demand.
pub const DEFAULT_LOOK_AHEAD: usize = 100;

#[derive(Clone, Debug, Error)]
#[error("invalid value in {0}; must be a natural number")]
pub struct BadConfiguration(pub &'static str);

/// Construction-time tuning for the background workers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Tuning {
    /// The longest a worker or a waiting caller sleeps before it
    /// re-checks its condition, even without being notified.
    ///
    /// A zero interval waits for notifications only.
    pub poll_interval: Duration,

    /// How many items a [`PrefetchingReader`][crate::PrefetchingReader]
    /// may buffer ahead of demand.
    pub look_ahead: usize,
}

impl Default for Tuning {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            look_ahead: DEFAULT_LOOK_AHEAD,
        }
    }
}

impl Tuning {
    /// Reads the tuning from the process environment.
    ///
    /// Variables that are not set fall back to the defaults.
    pub fn from_env() -> Result<Self, BadConfiguration> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the tuning from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, BadConfiguration>
    where
        F: Fn(&'static str) -> Option<String>,
    {
        let mut tuning = Self::default();

        if let Some(value) = lookup(STAGEHAND_POLL_INTERVAL_MS) {
            let ms = parse_natural(STAGEHAND_POLL_INTERVAL_MS, &value)?;
            tuning.poll_interval = Duration::from_millis(ms as u64);
        }

        if let Some(value) = lookup(STAGEHAND_LOOK_AHEAD) {
            tuning.look_ahead = parse_natural(STAGEHAND_LOOK_AHEAD, &value)?;
        }

        Ok(tuning)
    }
}

fn parse_natural(key: &'static str, value: &str) -> Result<usize, BadConfiguration> {
    value.trim().parse().map_err(|_| BadConfiguration(key))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_without_variables() {
        let tuning = Tuning::from_lookup(|_| None).unwrap();
        assert_eq!(tuning, Tuning::default());
        assert_eq!(tuning.poll_interval, Duration::from_millis(20));
        assert_eq!(tuning.look_ahead, 100);
    }

    #[test]
    fn overrides_from_variables() {
        let tuning = Tuning::from_lookup(|key| match key {
            STAGEHAND_POLL_INTERVAL_MS => Some("5".into()),
            STAGEHAND_LOOK_AHEAD => Some(" 7 ".into()),
            _ => None,
        })
        .unwrap();

        assert_eq!(tuning.poll_interval, Duration::from_millis(5));
        assert_eq!(tuning.look_ahead, 7);
    }

    #[test]
    fn rejects_malformed_values() {
        let err = Tuning::from_lookup(|key| {
            (key == STAGEHAND_LOOK_AHEAD).then(|| "-3".to_string())
        })
        .unwrap_err();

        assert_eq!(err.0, STAGEHAND_LOOK_AHEAD);
        assert!(err.to_string().contains(STAGEHAND_LOOK_AHEAD));
    }
}
