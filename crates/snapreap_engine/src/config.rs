//! Configuration for deletion runs and the live service client.

use snapreap_core::{ExpiryPolicy, ROOT_PATH};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Configuration for a deletion run.
#[derive(Debug, Clone)]
pub struct ReapConfig {
    /// Scan root. Only its descendants are ever deleted.
    pub root: String,
    /// Expiry threshold and basis.
    pub policy: ExpiryPolicy,
    /// Report without issuing deletes.
    pub dry_run: bool,
    /// Reference time, milliseconds since the epoch.
    pub now_ms: i64,
    /// Worker threads across candidate subtrees. 1 is strictly sequential.
    pub parallelism: usize,
    /// Retry policy for transient delete failures.
    pub retry: RetryConfig,
}

impl ReapConfig {
    /// Creates a run configuration with `now` taken from the wall clock.
    pub fn new(root: impl Into<String>, policy: ExpiryPolicy) -> Self {
        Self {
            root: root.into(),
            policy,
            dry_run: false,
            now_ms: current_time_ms(),
            parallelism: 1,
            retry: RetryConfig::default(),
        }
    }

    /// Sets dry-run mode.
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Overrides the reference time.
    pub fn with_now_ms(mut self, now_ms: i64) -> Self {
        self.now_ms = now_ms;
        self
    }

    /// Sets the number of worker threads, at least one.
    pub fn with_parallelism(mut self, parallelism: usize) -> Self {
        self.parallelism = parallelism.max(1);
        self
    }

    /// Sets the retry configuration.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }
}

impl Default for ReapConfig {
    fn default() -> Self {
        Self::new(ROOT_PATH, ExpiryPolicy::new(Default::default(), 30))
    }
}

/// Configuration for connecting to the live service.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Comma-separated `host:port` list, tried in order.
    pub address: String,
    /// Deadline for reaching a ready session.
    pub connect_timeout: Duration,
    /// Session timeout requested from the server.
    pub session_timeout: Duration,
    /// Deadline for a single request round trip.
    pub request_timeout: Duration,
    /// Retry policy for establishing the connection.
    pub retry: RetryConfig,
}

impl ServiceConfig {
    /// Creates a service configuration.
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            connect_timeout: Duration::from_secs(10),
            session_timeout: Duration::from_secs(30),
            request_timeout: Duration::from_secs(10),
            retry: RetryConfig::default(),
        }
    }

    /// Sets the connect deadline.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets the requested session timeout.
    pub fn with_session_timeout(mut self, timeout: Duration) -> Self {
        self.session_timeout = timeout;
        self
    }

    /// Sets the per-request deadline.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Sets the retry configuration.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }
}

/// Configuration for retry behavior.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first.
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Maximum delay between retries.
    pub max_delay: Duration,
    /// Multiplier for exponential backoff.
    pub backoff_multiplier: f64,
}

impl RetryConfig {
    /// Creates a new retry configuration.
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(5),
            backoff_multiplier: 2.0,
        }
    }

    /// Creates a configuration with no retries.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            backoff_multiplier: 1.0,
        }
    }

    /// Sets the initial delay.
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Sets the maximum delay.
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Sets the backoff multiplier.
    pub fn with_backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    /// Calculates the delay before a given attempt (0-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        let exponent = i32::try_from(attempt - 1).unwrap_or(i32::MAX);
        let base_delay = self.initial_delay.as_secs_f64() * self.backoff_multiplier.powi(exponent);
        let delay_secs = base_delay.min(self.max_delay.as_secs_f64());
        Duration::from_secs_f64(delay_secs.max(0.0))
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::new(3)
    }
}

/// Milliseconds since the Unix epoch.
pub fn current_time_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_millis()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}
