pub mod config;

pub use config::{Config, DEFAULT_POOL_SIZE};
