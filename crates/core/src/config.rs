//! Configuration types shared across crates.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Metrics and health endpoint configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0:9090").
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Serve `/metrics` and `/health` (default: true).
    /// SECURITY: the endpoint is unauthenticated; restrict it at the network level.
    #[serde(default = "default_metrics_enabled")]
    pub metrics_enabled: bool,
}

fn default_bind() -> String {
    "127.0.0.1:9090".to_string()
}

fn default_metrics_enabled() -> bool {
    true
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            metrics_enabled: default_metrics_enabled(),
        }
    }
}

/// Metadata store configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum MetadataConfig {
    /// SQLite database.
    Sqlite {
        /// Database file path.
        path: PathBuf,
        /// How long to wait for the connection before a query fails.
        #[serde(default = "default_sqlite_query_timeout_secs")]
        query_timeout_secs: Option<u64>,
    },
}

fn default_sqlite_query_timeout_secs() -> Option<u64> {
    Some(600) // 10 minutes
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self::Sqlite {
            path: PathBuf::from("./data/trust.db"),
            query_timeout_secs: default_sqlite_query_timeout_secs(),
        }
    }
}

/// Worker pool and lifecycle configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Number of concurrent workers per subscription.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// How long the process serves messages before a controlled restart.
    #[serde(default = "default_recycle_interval_secs")]
    pub recycle_interval_secs: u64,
    /// Upper bound on the shutdown drain.
    #[serde(default = "default_max_shutdown_wait_secs")]
    pub max_shutdown_wait_secs: u64,
    /// How long a leased message stays invisible to other workers.
    #[serde(default = "default_lease_secs")]
    pub lease_secs: u64,
    /// Idle back-off when the subscription is empty.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Deliveries after which a message is dead-lettered instead of handled.
    #[serde(default = "default_max_delivery_count")]
    pub max_delivery_count: u32,
    /// Delay before an abandoned message becomes visible again.
    #[serde(default = "default_redelivery_delay_secs")]
    pub redelivery_delay_secs: u64,
}

fn default_concurrency() -> usize {
    8
}

fn default_recycle_interval_secs() -> u64 {
    3600 // 1 hour
}

fn default_max_shutdown_wait_secs() -> u64 {
    30
}

fn default_lease_secs() -> u64 {
    300 // 5 minutes
}

fn default_poll_interval_ms() -> u64 {
    500
}

fn default_max_delivery_count() -> u32 {
    10
}

fn default_redelivery_delay_secs() -> u64 {
    30
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            recycle_interval_secs: default_recycle_interval_secs(),
            max_shutdown_wait_secs: default_max_shutdown_wait_secs(),
            lease_secs: default_lease_secs(),
            poll_interval_ms: default_poll_interval_ms(),
            max_delivery_count: default_max_delivery_count(),
            redelivery_delay_secs: default_redelivery_delay_secs(),
        }
    }
}

impl WorkerConfig {
    pub fn recycle_interval(&self) -> Duration {
        Duration::from_secs(self.recycle_interval_secs)
    }

    pub fn max_shutdown_wait(&self) -> Duration {
        Duration::from_secs(self.max_shutdown_wait_secs)
    }

    pub fn lease(&self) -> Duration {
        Duration::from_secs(self.lease_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn redelivery_delay(&self) -> Duration {
        Duration::from_secs(self.redelivery_delay_secs)
    }

    /// Validate worker configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.concurrency == 0 {
            return Err("worker.concurrency must be at least 1".to_string());
        }
        if self.lease_secs == 0 {
            return Err("worker.lease_secs must be greater than 0".to_string());
        }
        if self.max_delivery_count == 0 {
            return Err("worker.max_delivery_count must be at least 1".to_string());
        }
        Ok(())
    }
}

/// Certificate validation configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CertificateConfig {
    /// Consecutive Unknown results after which a certificate is marked Invalid.
    #[serde(default = "default_max_validation_failures")]
    pub max_validation_failures: u32,
}

fn default_max_validation_failures() -> u32 {
    10
}

impl Default for CertificateConfig {
    fn default() -> Self {
        Self {
            max_validation_failures: default_max_validation_failures(),
        }
    }
}

/// Package content fetcher configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FetcherConfig {
    /// Request timeout for a single package download.
    #[serde(default = "default_fetch_timeout_secs")]
    pub timeout_secs: u64,
    /// Downloads larger than this are rejected.
    #[serde(default = "default_max_package_size")]
    pub max_package_size: u64,
}

fn default_fetch_timeout_secs() -> u64 {
    300
}

fn default_max_package_size() -> u64 {
    250 * 1024 * 1024 // 250 MiB
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_fetch_timeout_secs(),
            max_package_size: default_max_package_size(),
        }
    }
}

impl FetcherConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Complete application configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Metrics endpoint configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Metadata store configuration.
    #[serde(default)]
    pub metadata: MetadataConfig,
    /// Worker pool configuration.
    #[serde(default)]
    pub worker: WorkerConfig,
    /// Certificate validation configuration.
    #[serde(default)]
    pub certificates: CertificateConfig,
    /// Package fetcher configuration.
    #[serde(default)]
    pub fetcher: FetcherConfig,
}

impl AppConfig {
    /// Create a test configuration with sensible defaults.
    ///
    /// **For testing only.** Uses a short lease and poll interval.
    pub fn for_testing() -> Self {
        Self {
            worker: WorkerConfig {
                concurrency: 2,
                lease_secs: 5,
                poll_interval_ms: 10,
                redelivery_delay_secs: 0,
                ..WorkerConfig::default()
            },
            ..Self::default()
        }
    }

    /// Validate configuration invariants.
    pub fn validate(&self) -> Result<(), String> {
        self.worker.validate()?;
        if self.certificates.max_validation_failures == 0 {
            return Err("certificates.max_validation_failures must be at least 1".to_string());
        }
        Ok(())
    }
}
