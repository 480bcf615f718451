pub mod media_cache;
pub mod token_manager;

pub use media_cache::{MediaCache, MediaPolicy};
pub use token_manager::{InitialToken, TokenManager, TokenPolicy};
