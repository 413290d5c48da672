use std::time::Duration;

#[derive(Debug, Clone)]
pub struct EngagementConfig {
    /// Origin used to build canonical share URLs.
    pub public_origin: String,
    /// Upper bound on any single store call.
    pub request_timeout: Duration,
    /// Items fetched per feed source.
    pub feed_source_limit: u32,
    pub notifier: NotifierConfig,
}

impl Default for EngagementConfig {
    fn default() -> Self {
        Self {
            public_origin: "http://localhost:3000".to_string(),
            request_timeout: Duration::from_secs(10),
            feed_source_limit: 50,
            notifier: NotifierConfig::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct NotifierConfig {
    pub queue_capacity: usize,
    pub max_attempts: u32,
    /// Delay before the second attempt; doubles after each failure.
    pub base_backoff: Duration,
    /// Most recent dead letters kept for inspection.
    pub dead_letter_capacity: usize,
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 256,
            max_attempts: 3,
            base_backoff: Duration::from_millis(200),
            dead_letter_capacity: 64,
        }
    }
}
