// Instagram feed proxy core: token lifecycle and media caching
pub mod config;
mod error;
pub mod models;
pub mod services;
pub mod upstream;

pub use crate::config::Configuration;
pub use error::{ConfigurationError, MediaError, TokenError, UpstreamError};
pub use models::{AccessToken, CacheStatus, MediaSnapshot, SnapshotState};
pub use services::{InitialToken, MediaCache, MediaPolicy, TokenManager, TokenPolicy};

// Always expose testing module (integration tests need it)
pub mod testing;
