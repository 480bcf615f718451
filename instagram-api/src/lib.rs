pub mod endpoints;
mod error;
pub mod repositories;

pub use crate::error::{ErrorDetail, InstagramApiError};
pub use tower_api_client::StatusCode;
use repositories::*;
use tower_api_client::{Client as ApiClient, Request as ApiRequest};

pub const GRAPH_URL: &str = "https://graph.instagram.com";

/// Client for the Instagram Graph host (`graph.instagram.com`).
///
/// Access tokens travel as a query parameter on every request, so the client
/// itself holds no credentials.
pub struct Client {
    inner: ApiClient,
}

impl Client {
    pub fn new() -> Self {
        Self::with_base_url(GRAPH_URL)
    }

    pub fn with_base_url(base_url: &str) -> Self {
        Self {
            inner: ApiClient::new(base_url),
        }
    }

    pub async fn send<R>(&self, request: R) -> Result<R::Response, InstagramApiError>
    where
        R: ApiRequest,
    {
        self.inner.send(request).await.map_err(From::from)
    }
}

impl Default for Client {
    fn default() -> Self {
        Self::new()
    }
}

pub struct Request;

impl Request {
    pub fn media() -> MediaRepository {
        MediaRepository::new()
    }

    pub fn tokens() -> TokenRepository {
        TokenRepository::new()
    }
}
