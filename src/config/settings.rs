use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub queue: QueueConfig,
    #[serde(default)]
    pub consumer: ConsumerConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub redis: RedisConfig,
    #[serde(default)]
    pub otel: OtelConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Maximum accepted request body size
    #[serde(default = "default_body_limit")]
    pub body_limit_bytes: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QueueConfig {
    /// "memory" or "redis"
    #[serde(default = "default_memory_backend")]
    pub backend: String,
    /// Key prefix for the Redis lists
    #[serde(default = "default_queue_prefix")]
    pub redis_prefix: String,
    /// How often an idle Redis consumer polls for work
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
    /// Deliveries attempted before a payload is dead-lettered
    #[serde(default = "default_max_deliveries")]
    pub max_deliveries: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConsumerConfig {
    /// Number of worker loops
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Maximum time a worker blocks on one dequeue call
    #[serde(default = "default_dequeue_wait")]
    pub dequeue_wait_ms: u64,
    #[serde(default = "default_backoff_initial")]
    pub backoff_initial_ms: u64,
    #[serde(default = "default_backoff_max")]
    pub backoff_max_ms: u64,
    /// Time allowed for workers to finish on shutdown
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_seconds: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    /// "memory" or "postgres"
    #[serde(default = "default_memory_backend")]
    pub backend: String,
    /// Insert random development messages on startup
    #[serde(default)]
    pub seed_fixtures: bool,
    #[serde(default = "default_fixture_count")]
    pub fixture_count: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: Option<String>,
    #[serde(default = "default_pool_size")]
    pub pool_size: u32,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_seconds: u32,
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_seconds: u32,
    /// Create the messages table if it does not exist
    #[serde(default = "default_true")]
    pub run_migrations: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    #[serde(default = "default_redis_url")]
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OtelConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_otel_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_service_name")]
    pub service_name: String,
    #[serde(default = "default_sampling_ratio")]
    pub sampling_ratio: f64,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8081
}

fn default_body_limit() -> usize {
    64 * 1024 // 64 KiB
}

fn default_memory_backend() -> String {
    "memory".to_string()
}

fn default_queue_prefix() -> String {
    "ara:dispatch".to_string()
}

fn default_poll_interval() -> u64 {
    200
}

fn default_max_deliveries() -> u32 {
    5
}

fn default_workers() -> usize {
    2
}

fn default_dequeue_wait() -> u64 {
    1000
}

fn default_backoff_initial() -> u64 {
    100
}

fn default_backoff_max() -> u64 {
    30_000 // 30 seconds
}

fn default_shutdown_timeout() -> u64 {
    10
}

fn default_fixture_count() -> usize {
    10
}

fn default_pool_size() -> u32 {
    10
}

fn default_connect_timeout() -> u32 {
    5
}

fn default_idle_timeout() -> u32 {
    300
}

fn default_true() -> bool {
    true
}

fn default_redis_url() -> String {
    "redis://localhost:6379".to_string()
}

fn default_otel_endpoint() -> String {
    "http://localhost:4317".to_string()
}

fn default_service_name() -> String {
    "ara-message-service".to_string()
}

fn default_sampling_ratio() -> f64 {
    1.0
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        // Load .env file if exists
        let _ = dotenvy::dotenv();

        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let builder = Config::builder()
            .set_default("server.host", default_host())?
            .set_default("server.port", i64::from(default_port()))?
            .set_default("queue.backend", default_memory_backend())?
            .set_default("store.backend", default_memory_backend())?
            .set_default("consumer.workers", default_workers() as i64)?
            // Load config file if exists
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // SERVER__PORT, QUEUE__BACKEND, DATABASE__URL, etc.
            .add_source(
                Environment::default()
                    .separator("__")
                    .try_parsing(true),
            );

        builder.build()?.try_deserialize()
    }

    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            body_limit_bytes: default_body_limit(),
        }
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            backend: default_memory_backend(),
            redis_prefix: default_queue_prefix(),
            poll_interval_ms: default_poll_interval(),
            max_deliveries: default_max_deliveries(),
        }
    }
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            dequeue_wait_ms: default_dequeue_wait(),
            backoff_initial_ms: default_backoff_initial(),
            backoff_max_ms: default_backoff_max(),
            shutdown_timeout_seconds: default_shutdown_timeout(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: default_memory_backend(),
            seed_fixtures: false,
            fixture_count: default_fixture_count(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            pool_size: default_pool_size(),
            connect_timeout_seconds: default_connect_timeout(),
            idle_timeout_seconds: default_idle_timeout(),
            run_migrations: default_true(),
        }
    }
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: default_redis_url(),
        }
    }
}

impl Default for OtelConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: default_otel_endpoint(),
            service_name: default_service_name(),
            sampling_ratio: default_sampling_ratio(),
        }
    }
}
