use async_trait::async_trait;
use instagram_api::endpoints::media::{Media, MediaList};
use instagram_api::{ErrorDetail, InstagramApiError, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use crate::upstream::{MediaSource, TokenGrant, TokenRefresher};

/// Scriptable stand-in for the Instagram Graph API.
///
/// Every call is counted. Refreshed tokens are named `refreshed-N`, exchanged
/// tokens `exchanged-N`, and each media fetch returns a single item with id
/// `media-N`, where N is the 1-based call number for that endpoint.
pub struct MockInstagram {
    refresh_calls: AtomicUsize,
    exchange_calls: AtomicUsize,
    media_calls: AtomicUsize,
    fail_tokens: AtomicBool,
    fail_media: AtomicBool,
    latency: Mutex<Duration>,
    token_lifetime: Mutex<Option<Duration>>,
    tokens_seen: Mutex<Vec<String>>,
}

impl MockInstagram {
    pub fn new() -> Self {
        Self {
            refresh_calls: AtomicUsize::new(0),
            exchange_calls: AtomicUsize::new(0),
            media_calls: AtomicUsize::new(0),
            fail_tokens: AtomicBool::new(false),
            fail_media: AtomicBool::new(false),
            latency: Mutex::new(Duration::ZERO),
            token_lifetime: Mutex::new(None),
            tokens_seen: Mutex::new(Vec::new()),
        }
    }

    /// Make token refresh and exchange calls fail.
    pub fn fail_tokens(&self, fail: bool) {
        self.fail_tokens.store(fail, Ordering::SeqCst);
    }

    /// Make media fetches fail.
    pub fn fail_media(&self, fail: bool) {
        self.fail_media.store(fail, Ordering::SeqCst);
    }

    /// Delay applied to every call before it answers.
    pub fn set_latency(&self, latency: Duration) {
        *lock(&self.latency) = latency;
    }

    /// `expires_in` reported with every issued token.
    pub fn set_token_lifetime(&self, lifetime: Option<Duration>) {
        *lock(&self.token_lifetime) = lifetime;
    }

    pub fn refresh_calls(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    pub fn exchange_calls(&self) -> usize {
        self.exchange_calls.load(Ordering::SeqCst)
    }

    pub fn media_calls(&self) -> usize {
        self.media_calls.load(Ordering::SeqCst)
    }

    /// Tokens presented to the media endpoint, in call order.
    pub fn tokens_seen(&self) -> Vec<String> {
        lock(&self.tokens_seen).clone()
    }

    async fn answer(&self, fail: &AtomicBool) -> Result<(), InstagramApiError> {
        let latency = *lock(&self.latency);
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        if fail.load(Ordering::SeqCst) {
            return Err(InstagramApiError::Instagram(
                StatusCode::SERVICE_UNAVAILABLE,
                ErrorDetail::new("mock upstream failure"),
            ));
        }
        Ok(())
    }

    fn grant(&self, token: String) -> TokenGrant {
        TokenGrant {
            access_token: SecretString::from(token),
            expires_in: *lock(&self.token_lifetime),
        }
    }
}

impl Default for MockInstagram {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TokenRefresher for MockInstagram {
    async fn refresh(&self, _token: &SecretString) -> Result<TokenGrant, InstagramApiError> {
        let call = self.refresh_calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.answer(&self.fail_tokens).await?;
        Ok(self.grant(format!("refreshed-{}", call)))
    }

    async fn exchange(
        &self,
        _client_secret: &SecretString,
        _token: &SecretString,
    ) -> Result<TokenGrant, InstagramApiError> {
        let call = self.exchange_calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.answer(&self.fail_tokens).await?;
        Ok(self.grant(format!("exchanged-{}", call)))
    }
}

#[async_trait]
impl MediaSource for MockInstagram {
    async fn fetch_media(
        &self,
        token: &SecretString,
        _fields: &str,
    ) -> Result<MediaList, InstagramApiError> {
        let call = self.media_calls.fetch_add(1, Ordering::SeqCst) + 1;
        lock(&self.tokens_seen).push(token.expose_secret().to_owned());
        self.answer(&self.fail_media).await?;

        Ok(MediaList {
            data: vec![Media::new(format!("media-{}", call))],
            paging: None,
        })
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
