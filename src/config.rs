use serde::Deserialize;
use std::time::Duration;

/// Main configuration for the todo service
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Service configuration
    #[serde(default)]
    pub service: ServiceConfig,
    /// HTTP server configuration
    #[serde(default)]
    pub http: HttpConfig,
    /// AWS client configuration
    #[serde(default)]
    pub aws: AwsConfig,
    /// Record store configuration
    #[serde(default)]
    pub store: StoreConfig,
    /// Event queue configuration
    #[serde(default)]
    pub queue: QueueConfig,
}

/// Service-level configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    /// Service name for logging/metrics
    #[serde(default = "default_service_name")]
    pub name: String,
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Metrics port
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    /// Listen address
    #[serde(default = "default_http_host")]
    pub host: String,
    /// Listen port
    #[serde(default = "default_http_port")]
    pub port: u16,
    /// Root directory for the page template and static assets
    #[serde(default = "default_static_dir")]
    pub static_dir: String,
    /// Enable CORS
    #[serde(default = "default_true")]
    pub cors_enabled: bool,
    /// Allowed CORS origins (empty = any)
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

/// AWS client configuration shared by the store and queue adapters
#[derive(Debug, Clone, Deserialize)]
pub struct AwsConfig {
    /// AWS region
    #[serde(default = "default_region")]
    pub region: String,
    /// Custom endpoint URL (for LocalStack etc.)
    pub endpoint_url: Option<String>,
}

/// Record store configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    /// DynamoDB table holding todo records
    #[serde(default = "default_table")]
    pub table: String,
}

/// Event queue configuration
#[derive(Debug, Clone, Deserialize)]
pub struct QueueConfig {
    /// Logical queue name, resolved to a queue URL on first use
    #[serde(default = "default_queue_name")]
    pub name: String,
    /// Long-poll wait time for the queue worker, in seconds
    #[serde(default = "default_wait_time_seconds")]
    pub wait_time_seconds: i32,
    /// Maximum messages fetched per receive
    #[serde(default = "default_max_messages")]
    pub max_messages: i32,
    /// Run the in-process queue worker
    #[serde(default = "default_true")]
    pub worker_enabled: bool,
}

// Default value functions
fn default_service_name() -> String {
    "todo-service".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_metrics_port() -> u16 {
    9090
}

fn default_http_host() -> String {
    "0.0.0.0".to_string()
}

fn default_http_port() -> u16 {
    3000
}

fn default_static_dir() -> String {
    "dist".to_string()
}

fn default_region() -> String {
    "eu-west-1".to_string()
}

fn default_table() -> String {
    "todos".to_string()
}

fn default_queue_name() -> String {
    "todos-events".to_string()
}

fn default_wait_time_seconds() -> i32 {
    10
}

fn default_max_messages() -> i32 {
    10
}

fn default_true() -> bool {
    true
}

impl Config {
    /// Load configuration from environment and config files
    pub fn load() -> anyhow::Result<Self> {
        let config = config::Config::builder()
            // Add config file if present
            .add_source(config::File::with_name("config/todo").required(false))
            .add_source(config::File::with_name("/etc/todo-service/todo").required(false))
            // Override with environment variables
            // TODO__STORE__TABLE -> store.table
            .add_source(
                config::Environment::with_prefix("TODO")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize().map_err(Into::into)
    }

    /// Get the worker's long-poll wait as a Duration
    pub fn queue_wait_time(&self) -> Duration {
        Duration::from_secs(self.queue.wait_time_seconds.max(0) as u64)
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: default_service_name(),
            log_level: default_log_level(),
            metrics_port: default_metrics_port(),
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: default_http_host(),
            port: default_http_port(),
            static_dir: default_static_dir(),
            cors_enabled: default_true(),
            cors_origins: Vec::new(),
        }
    }
}

impl Default for AwsConfig {
    fn default() -> Self {
        Self {
            region: default_region(),
            endpoint_url: None,
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            table: default_table(),
        }
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            name: default_queue_name(),
            wait_time_seconds: default_wait_time_seconds(),
            max_messages: default_max_messages(),
            worker_enabled: default_true(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let config = Config {
            service: ServiceConfig::default(),
            http: HttpConfig::default(),
            aws: AwsConfig::default(),
            store: StoreConfig::default(),
            queue: QueueConfig::default(),
        };

        assert_eq!(config.http.port, 3000);
        assert_eq!(config.store.table, "todos");
        assert_eq!(config.queue.name, "todos-events");
        assert_eq!(config.aws.region, "eu-west-1");
        assert!(config.queue.worker_enabled);
    }

    #[test]
    fn test_queue_wait_time_clamps_negative() {
        let config = Config {
            service: ServiceConfig::default(),
            http: HttpConfig::default(),
            aws: AwsConfig::default(),
            store: StoreConfig::default(),
            queue: QueueConfig {
                wait_time_seconds: -5,
                ..QueueConfig::default()
            },
        };

        assert_eq!(config.queue_wait_time(), Duration::from_secs(0));
    }
}
