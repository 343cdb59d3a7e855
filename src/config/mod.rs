mod settings;

pub use settings::{
    ConsumerConfig, DatabaseConfig, OtelConfig, QueueConfig, RedisConfig, ServerConfig, Settings,
    StoreConfig,
};
