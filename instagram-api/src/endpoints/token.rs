use super::Redacted;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;
use std::time::Duration;
use tower_api_client::{Request, RequestData};

// Requests

/// Exchange a short-lived token for a long-lived (60 day) one.
#[derive(Clone, Serialize)]
pub struct ExchangeToken {
    grant_type: &'static str,
    client_secret: String,
    access_token: String,
}

impl ExchangeToken {
    pub fn new(client_secret: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self {
            grant_type: "ig_exchange_token",
            client_secret: client_secret.into(),
            access_token: access_token.into(),
        }
    }
}

impl fmt::Debug for ExchangeToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExchangeToken")
            .field("grant_type", &self.grant_type)
            .field("client_secret", &Redacted)
            .field("access_token", &Redacted)
            .finish()
    }
}

impl Request for ExchangeToken {
    type Data = Self;
    type Response = TokenResponse;

    fn endpoint(&self) -> Cow<'_, str> {
        "/access_token".into()
    }

    fn data(&self) -> RequestData<&Self> {
        RequestData::Query(self)
    }
}

/// Refresh a long-lived token that is at least 24 hours old.
#[derive(Clone, Serialize)]
pub struct RefreshToken {
    grant_type: &'static str,
    access_token: String,
}

impl RefreshToken {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            grant_type: "ig_refresh_token",
            access_token: access_token.into(),
        }
    }
}

impl fmt::Debug for RefreshToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RefreshToken")
            .field("grant_type", &self.grant_type)
            .field("access_token", &Redacted)
            .finish()
    }
}

impl Request for RefreshToken {
    type Data = Self;
    type Response = TokenResponse;

    fn endpoint(&self) -> Cow<'_, str> {
        "/refresh_access_token".into()
    }

    fn data(&self) -> RequestData<&Self> {
        RequestData::Query(self)
    }
}

// Responses

#[derive(Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<u64>,
}

impl TokenResponse {
    /// Lifetime reported by Instagram, if any.
    pub fn lifetime(&self) -> Option<Duration> {
        self.expires_in.map(Duration::from_secs)
    }
}

impl fmt::Debug for TokenResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenResponse")
            .field("access_token", &Redacted)
            .field("token_type", &self.token_type)
            .field("expires_in", &self.expires_in)
            .finish()
    }
}
