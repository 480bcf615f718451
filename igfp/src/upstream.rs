use async_trait::async_trait;
use instagram_api::endpoints::{media::MediaList, token::TokenResponse};
use instagram_api::{Client, InstagramApiError, Request};
use secrecy::{ExposeSecret, SecretString};
use std::time::Duration;

/// A token handed out by the upstream authorization endpoints.
#[derive(Debug)]
pub struct TokenGrant {
    pub access_token: SecretString,
    pub expires_in: Option<Duration>,
}

impl From<TokenResponse> for TokenGrant {
    fn from(response: TokenResponse) -> Self {
        let expires_in = response.lifetime();
        Self {
            access_token: SecretString::from(response.access_token),
            expires_in,
        }
    }
}

/// Upstream token endpoints used by the token manager.
#[async_trait]
pub trait TokenRefresher: Send + Sync {
    /// Trade the current long-lived token for a fresh one.
    async fn refresh(&self, token: &SecretString) -> Result<TokenGrant, InstagramApiError>;

    /// Trade a short-lived token for a long-lived one.
    async fn exchange(
        &self,
        client_secret: &SecretString,
        token: &SecretString,
    ) -> Result<TokenGrant, InstagramApiError>;
}

/// Upstream media endpoint used by the media cache.
#[async_trait]
pub trait MediaSource: Send + Sync {
    async fn fetch_media(
        &self,
        token: &SecretString,
        fields: &str,
    ) -> Result<MediaList, InstagramApiError>;
}

#[async_trait]
impl TokenRefresher for Client {
    async fn refresh(&self, token: &SecretString) -> Result<TokenGrant, InstagramApiError> {
        let req = Request::tokens().refresh(token.expose_secret());
        self.send(req).await.map(TokenGrant::from)
    }

    async fn exchange(
        &self,
        client_secret: &SecretString,
        token: &SecretString,
    ) -> Result<TokenGrant, InstagramApiError> {
        let req = Request::tokens().exchange(client_secret.expose_secret(), token.expose_secret());
        self.send(req).await.map(TokenGrant::from)
    }
}

#[async_trait]
impl MediaSource for Client {
    async fn fetch_media(
        &self,
        token: &SecretString,
        fields: &str,
    ) -> Result<MediaList, InstagramApiError> {
        let req = Request::media().list(token.expose_secret()).fields(fields);
        self.send(req).await
    }
}
