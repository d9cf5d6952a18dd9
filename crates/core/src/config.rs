use crate::DocumentCategory;
use std::time::Duration;

pub const DEFAULT_BROKER_URL: &str = "http://localhost:5000/api";
pub const DEFAULT_DIRECT_URL: &str = "http://localhost:5001";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub max_attempts: u32,
    pub interval: Duration,
    /// Consecutive failed ticks treated as "not found". Zero disables the rule.
    pub max_consecutive_errors: u32,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 60,
            interval: Duration::from_millis(2_000),
            max_consecutive_errors: 3,
        }
    }
}

impl PollPolicy {
    /// Upper bound on the time spent waiting between ticks.
    pub fn budget(&self) -> Duration {
        self.interval * self.max_attempts
    }
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub broker_url: String,
    pub direct_url: String,
    pub request_timeout: Duration,
    pub poll: PollPolicy,
    /// Used by callers that build a request without naming a category.
    pub category: DocumentCategory,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            broker_url: DEFAULT_BROKER_URL.to_string(),
            direct_url: DEFAULT_DIRECT_URL.to_string(),
            request_timeout: Duration::from_secs(30),
            poll: PollPolicy::default(),
            category: DocumentCategory::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_poll_budget_is_two_minutes() {
        assert_eq!(PollPolicy::default().budget(), Duration::from_secs(120));
    }
}
