use std::time::Duration;

/// Sleep between two empty polls, for both roles
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_micros(100);
/// Timeout used by calls that do not pass one
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(1000);

/// Overrides [`PollConfig::poll_interval`], in microseconds
pub const POLL_INTERVAL_ENV: &str = "TETHER_POLL_INTERVAL_US";
/// Overrides [`PollConfig::default_timeout`], in milliseconds
pub const DEFAULT_TIMEOUT_ENV: &str = "TETHER_DEFAULT_TIMEOUT_MS";

/// Polling behaviour of call drivers and dispatch loops
///
/// The poll interval trades latency for CPU; it never affects correctness.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    pub poll_interval: Duration,
    pub default_timeout: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            default_timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl PollConfig {
    /// Defaults, overridden by `TETHER_POLL_INTERVAL_US` and `TETHER_DEFAULT_TIMEOUT_MS`
    pub fn from_env() -> Self {
        Self::default().with_overrides(|key| std::env::var(key).ok())
    }

    /// Set the poll interval
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Set the default timeout
    pub fn default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(us) = parse_u64(POLL_INTERVAL_ENV, lookup(POLL_INTERVAL_ENV)) {
            self.poll_interval = Duration::from_micros(us);
        }
        if let Some(ms) = parse_u64(DEFAULT_TIMEOUT_ENV, lookup(DEFAULT_TIMEOUT_ENV)) {
            self.default_timeout = Duration::from_millis(ms);
        }
        self
    }
}

fn parse_u64(key: &str, raw: Option<String>) -> Option<u64> {
    let raw = raw?;
    match raw.trim().parse::<u64>() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(key, value = %raw, "ignoring unparsable override");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn overrides_apply() {
        let config = PollConfig::default().with_overrides(lookup(&[
            (POLL_INTERVAL_ENV, "250"),
            (DEFAULT_TIMEOUT_ENV, "3000"),
        ]));
        assert_eq!(config.poll_interval, Duration::from_micros(250));
        assert_eq!(config.default_timeout, Duration::from_secs(3));
    }

    #[test]
    fn garbage_is_ignored() {
        let config = PollConfig::default().with_overrides(lookup(&[(POLL_INTERVAL_ENV, "fast")]));
        assert_eq!(config, PollConfig::default());
    }
}
