use std::time::Duration;

use thiserror::Error;
use url::Url;

use crate::request::DEFAULT_NAMES;

/// Upper bound for the result queue, regardless of the concurrency level.
pub const MAX_RESULTS: usize = 1_000_000;

/// Per-worker slots in the result queue.
const RESULTS_PER_WORKER: usize = 1000;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("number of requests must be greater than zero")]
    ZeroRequests,
    #[error("concurrency level must be greater than zero")]
    ZeroConcurrency,
    #[error("concurrency level ({concurrency}) cannot exceed number of requests ({requests})")]
    ConcurrencyExceedsRequests { concurrency: usize, requests: usize },
    #[error("timeout must be greater than zero")]
    ZeroTimeout,
    #[error("qps must be a finite, non-negative number, got {0}")]
    InvalidQps(f64),
    #[error("request catalog must contain at least one name")]
    EmptyCatalog,
    #[error("invalid endpoint url: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("unsupported endpoint scheme `{0}`, only http is supported")]
    UnsupportedScheme(String),
    #[error("endpoint url has no host")]
    MissingHost,
}

/// Immutable settings of a single run.
///
/// Only obtainable through [`RunConfigBuilder::build`], which validates
/// everything before any worker gets spawned. Fields cannot be changed
/// afterwards:
///
/// ```compile_fail
/// let mut config = rpcwrk::RunConfig::builder("http://localhost/").build().unwrap();
/// config.concurrency = 0;
/// ```
#[derive(Debug, Clone)]
pub struct RunConfig {
    requests: usize,
    concurrency: usize,
    timeout: Duration,
    qps: f64,
    endpoint: Url,
    names: Vec<String>,
}

impl RunConfig {
    pub fn builder(endpoint: impl Into<String>) -> RunConfigBuilder {
        RunConfigBuilder {
            endpoint: endpoint.into(),
            requests: 200,
            concurrency: 50,
            timeout: Duration::from_secs(20),
            qps: 0.0,
            names: DEFAULT_NAMES.iter().map(|v| v.to_string()).collect(),
        }
    }

    /// Total number of calls.
    #[inline]
    pub fn requests(&self) -> usize {
        self.requests
    }

    /// Number of concurrent workers.
    #[inline]
    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Bounds every single call attempt.
    #[inline]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Per-worker rate limit, 0 means unlimited.
    #[inline]
    pub fn qps(&self) -> f64 {
        self.qps
    }

    #[inline]
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Names the request factory picks from.
    #[inline]
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Calls assigned to every worker. The remainder of an uneven split is
    /// never issued.
    #[inline]
    pub fn calls_per_worker(&self) -> usize {
        self.requests / self.concurrency
    }

    /// Calls dropped because `requests` is not a multiple of `concurrency`.
    #[inline]
    pub fn dropped_calls(&self) -> usize {
        self.requests % self.concurrency
    }

    #[inline]
    pub fn queue_capacity(&self) -> usize {
        self.concurrency
            .saturating_mul(RESULTS_PER_WORKER)
            .min(MAX_RESULTS)
    }

    /// Period between two consecutive calls of a single worker, if throttled.
    pub fn tick_period(&self) -> Option<Duration> {
        if self.qps > 0.0 {
            let micros = (1e6 / self.qps) as u64;
            Some(Duration::from_micros(micros.max(1)))
        } else {
            None
        }
    }
}

#[derive(Debug, Clone)]
pub struct RunConfigBuilder {
    endpoint: String,
    requests: usize,
    concurrency: usize,
    timeout: Duration,
    qps: f64,
    names: Vec<String>,
}

impl RunConfigBuilder {
    pub fn requests(mut self, requests: usize) -> Self {
        self.requests = requests;
        self
    }

    pub fn concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn qps(mut self, qps: f64) -> Self {
        self.qps = qps;
        self
    }

    pub fn names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.names = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn build(self) -> Result<RunConfig, ConfigError> {
        if self.requests == 0 {
            return Err(ConfigError::ZeroRequests);
        }
        if self.concurrency == 0 {
            return Err(ConfigError::ZeroConcurrency);
        }
        if self.concurrency > self.requests {
            return Err(ConfigError::ConcurrencyExceedsRequests {
                concurrency: self.concurrency,
                requests: self.requests,
            });
        }
        if self.timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout);
        }
        if !self.qps.is_finite() || self.qps < 0.0 {
            return Err(ConfigError::InvalidQps(self.qps));
        }
        if self.names.is_empty() {
            return Err(ConfigError::EmptyCatalog);
        }

        let endpoint = Url::parse(&self.endpoint)?;
        if endpoint.scheme() != "http" {
            return Err(ConfigError::UnsupportedScheme(endpoint.scheme().to_string()));
        }
        if endpoint.host_str().is_none() {
            return Err(ConfigError::MissingHost);
        }

        Ok(RunConfig {
            requests: self.requests,
            concurrency: self.concurrency,
            timeout: self.timeout,
            qps: self.qps,
            endpoint,
            names: self.names,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ENDPOINT: &str = "http://localhost:50051/helloworld.Greeter/SayHello";

    #[test]
    fn defaults_are_valid() {
        let cfg = RunConfig::builder(ENDPOINT).build().unwrap();

        assert_eq!(cfg.requests(), 200);
        assert_eq!(cfg.concurrency(), 50);
        assert_eq!(cfg.calls_per_worker(), 4);
        assert_eq!(cfg.names(), ["zhu", "bin", "hua"]);
        assert!(cfg.tick_period().is_none());
    }

    #[test]
    fn uneven_split_drops_remainder() {
        let cfg = RunConfig::builder(ENDPOINT)
            .requests(103)
            .concurrency(10)
            .build()
            .unwrap();

        assert_eq!(cfg.calls_per_worker(), 10);
        assert_eq!(cfg.dropped_calls(), 3);
    }

    #[test]
    fn queue_capacity_is_capped() {
        let cfg = RunConfig::builder(ENDPOINT)
            .requests(10_000)
            .concurrency(8)
            .build()
            .unwrap();
        assert_eq!(cfg.queue_capacity(), 8000);

        let cfg = RunConfig::builder(ENDPOINT)
            .requests(10_000)
            .concurrency(5000)
            .build()
            .unwrap();
        assert_eq!(cfg.queue_capacity(), MAX_RESULTS);
    }

    #[test]
    fn tick_period_from_qps() {
        let cfg = RunConfig::builder(ENDPOINT).qps(50.0).build().unwrap();
        assert_eq!(cfg.tick_period(), Some(Duration::from_millis(20)));

        let cfg = RunConfig::builder(ENDPOINT).qps(1e9).build().unwrap();
        assert_eq!(cfg.tick_period(), Some(Duration::from_micros(1)));
    }

    #[test]
    fn rejects_invalid_counts() {
        assert_eq!(
            RunConfig::builder(ENDPOINT).requests(0).build().unwrap_err(),
            ConfigError::ZeroRequests
        );
        assert_eq!(
            RunConfig::builder(ENDPOINT).concurrency(0).build().unwrap_err(),
            ConfigError::ZeroConcurrency
        );
        assert_eq!(
            RunConfig::builder(ENDPOINT)
                .requests(5)
                .concurrency(10)
                .build()
                .unwrap_err(),
            ConfigError::ConcurrencyExceedsRequests {
                concurrency: 10,
                requests: 5
            }
        );
    }

    #[test]
    fn rejects_invalid_settings() {
        assert_eq!(
            RunConfig::builder(ENDPOINT)
                .timeout(Duration::ZERO)
                .build()
                .unwrap_err(),
            ConfigError::ZeroTimeout
        );
        assert!(matches!(
            RunConfig::builder(ENDPOINT).qps(-1.0).build().unwrap_err(),
            ConfigError::InvalidQps(_)
        ));
        assert!(matches!(
            RunConfig::builder(ENDPOINT).qps(f64::NAN).build().unwrap_err(),
            ConfigError::InvalidQps(_)
        ));
        assert_eq!(
            RunConfig::builder(ENDPOINT)
                .names(Vec::<String>::new())
                .build()
                .unwrap_err(),
            ConfigError::EmptyCatalog
        );
    }

    #[test]
    fn rejects_bad_endpoints() {
        assert!(matches!(
            RunConfig::builder("not a url").build().unwrap_err(),
            ConfigError::InvalidUrl(_)
        ));
        assert_eq!(
            RunConfig::builder("https://localhost/").build().unwrap_err(),
            ConfigError::UnsupportedScheme("https".to_string())
        );
    }
}
