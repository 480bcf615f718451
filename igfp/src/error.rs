use instagram_api::InstagramApiError;
use std::time::Duration;
use thiserror::Error;

/// Failure of a single upstream call.
#[derive(Error, Debug)]
pub enum UpstreamError {
    #[error("Instagram API error: {0}")]
    Api(#[from] InstagramApiError),

    #[error("Upstream call timed out after {0:?}")]
    Timeout(Duration),
}

impl UpstreamError {
    /// True when Instagram rejected the access token itself.
    pub fn is_invalid_token(&self) -> bool {
        matches!(self, UpstreamError::Api(e) if e.is_invalid_token())
    }
}

#[derive(Error, Debug)]
pub enum TokenError {
    #[error("Token refresh failed: {0}")]
    UpstreamAuth(#[source] UpstreamError),

    #[error("A client secret is required to exchange a short-lived token")]
    MissingClientSecret,
}

#[derive(Error, Debug)]
pub enum MediaError {
    #[error("Could not obtain an access token: {0}")]
    UpstreamAuth(#[from] TokenError),

    #[error("Media fetch failed: {0}")]
    UpstreamFetch(#[source] UpstreamError),

    #[error("No media available yet: the initial fetch did not complete")]
    ColdStart,
}

impl MediaError {
    /// True when the failure came from Instagram rejecting the access token.
    pub fn is_invalid_token(&self) -> bool {
        match self {
            MediaError::UpstreamAuth(TokenError::UpstreamAuth(e)) | MediaError::UpstreamFetch(e) => {
                e.is_invalid_token()
            }
            _ => false,
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigurationError {
    #[error("Configuration error: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
