use secrecy::SecretString;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::error::{TokenError, UpstreamError};
use crate::models::AccessToken;
use crate::upstream::{TokenGrant, TokenRefresher};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenPolicy {
    /// Lifetime assumed for a token after each refresh.
    pub refresh_delay: Duration,
    /// Refresh this long before the token expires.
    pub safety_margin: Duration,
    /// Bound on each upstream token call.
    pub timeout: Duration,
}

/// Token the process starts from.
#[derive(Debug)]
pub enum InitialToken {
    LongLived(SecretString),
    ShortLived {
        token: SecretString,
        client_secret: SecretString,
    },
}

/// Owns the single upstream access token and refreshes it lazily.
pub struct TokenManager {
    refresher: Arc<dyn TokenRefresher>,
    token: Mutex<AccessToken>,
    policy: TokenPolicy,
    refreshes: AtomicU64,
}

impl TokenManager {
    /// Adopt an already long-lived token.
    pub fn new(refresher: Arc<dyn TokenRefresher>, token: SecretString, policy: TokenPolicy) -> Self {
        let token = AccessToken::issue(token, policy.refresh_delay, None);
        warn_if_short_lived(&token, policy.safety_margin);
        tracing::info!(
            expires_at = ?token.expires_at_utc(),
            "Token manager initialized"
        );

        Self {
            refresher,
            token: Mutex::new(token),
            policy,
            refreshes: AtomicU64::new(0),
        }
    }

    /// Build the manager at process start, exchanging a short-lived token
    /// for a long-lived one when needed.
    pub async fn bootstrap(
        refresher: Arc<dyn TokenRefresher>,
        initial: InitialToken,
        policy: TokenPolicy,
    ) -> Result<Self, TokenError> {
        let (token, client_secret) = match initial {
            InitialToken::LongLived(token) => return Ok(Self::new(refresher, token, policy)),
            InitialToken::ShortLived {
                token,
                client_secret,
            } => (token, client_secret),
        };

        tracing::info!("Exchanging short-lived token for a long-lived one");
        let grant = bounded(policy.timeout, refresher.exchange(&client_secret, &token))
            .await
            .map_err(|e| {
                tracing::warn!(error = %e, "Initial token exchange failed");
                TokenError::UpstreamAuth(e)
            })?;

        let token = AccessToken::issue(grant.access_token, policy.refresh_delay, grant.expires_in);
        warn_if_short_lived(&token, policy.safety_margin);
        tracing::info!(
            expires_at = ?token.expires_at_utc(),
            "Token manager initialized from exchanged token"
        );

        Ok(Self {
            refresher,
            token: Mutex::new(token),
            policy,
            refreshes: AtomicU64::new(0),
        })
    }

    /// Current token, refreshed first if it is within the safety margin of
    /// its expiry. On failure the previous token is kept.
    pub async fn current_token(&self) -> Result<SecretString, TokenError> {
        let mut token = self.token.lock().await;
        if !token.is_due(Instant::now(), self.policy.safety_margin) {
            return Ok(token.share());
        }

        tracing::debug!("Access token due for refresh");
        let grant = bounded(self.policy.timeout, self.refresher.refresh(token.secret()))
            .await
            .map_err(|e| {
                if e.is_invalid_token() {
                    tracing::error!(error = %e, "Instagram rejected the access token");
                } else {
                    tracing::warn!(error = %e, "Token refresh failed, keeping previous token");
                }
                TokenError::UpstreamAuth(e)
            })?;

        *token = AccessToken::issue(grant.access_token, self.policy.refresh_delay, grant.expires_in);
        warn_if_short_lived(&token, self.policy.safety_margin);
        self.refreshes.fetch_add(1, Ordering::Relaxed);

        tracing::info!(expires_at = ?token.expires_at_utc(), "Access token refreshed");
        Ok(token.share())
    }

    /// Monotonic instant at which the current token expires.
    pub async fn expires_at(&self) -> Instant {
        self.token.lock().await.expires_at()
    }

    /// Number of successful refreshes since start.
    pub fn refresh_count(&self) -> u64 {
        self.refreshes.load(Ordering::Relaxed)
    }
}

// Such a token is due as soon as it is issued, so every caller refreshes.
fn warn_if_short_lived(token: &AccessToken, safety_margin: Duration) {
    if token.lifetime() <= safety_margin {
        tracing::warn!(
            lifetime = ?token.lifetime(),
            safety_margin = ?safety_margin,
            "Access token lifetime does not exceed the safety margin"
        );
    }
}

async fn bounded<F>(timeout: Duration, call: F) -> Result<TokenGrant, UpstreamError>
where
    F: Future<Output = Result<TokenGrant, instagram_api::InstagramApiError>>,
{
    match tokio::time::timeout(timeout, call).await {
        Ok(result) => result.map_err(UpstreamError::from),
        Err(_) => Err(UpstreamError::Timeout(timeout)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MAX_TOKEN_LIFETIME;
    use crate::testing::MockInstagram;
    use secrecy::ExposeSecret;

    fn policy() -> TokenPolicy {
        TokenPolicy {
            refresh_delay: Duration::from_secs(1000),
            safety_margin: Duration::from_secs(100),
            timeout: Duration::from_secs(5),
        }
    }

    fn manager(upstream: &Arc<MockInstagram>) -> TokenManager {
        TokenManager::new(
            upstream.clone(),
            SecretString::from("initial".to_string()),
            policy(),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn serves_current_token_until_safety_margin() {
        let upstream = Arc::new(MockInstagram::new());
        let tokens = manager(&upstream);

        let token = tokens.current_token().await.unwrap();
        assert_eq!(token.expose_secret(), "initial");

        tokio::time::advance(Duration::from_secs(899)).await;
        let token = tokens.current_token().await.unwrap();
        assert_eq!(token.expose_secret(), "initial");
        assert_eq!(upstream.refresh_calls(), 0);

        tokio::time::advance(Duration::from_secs(1)).await;
        let token = tokens.current_token().await.unwrap();
        assert_eq!(token.expose_secret(), "refreshed-1");
        assert_eq!(upstream.refresh_calls(), 1);
        assert_eq!(tokens.refresh_count(), 1);

        // New expiry is measured from the refresh.
        tokio::time::advance(Duration::from_secs(899)).await;
        tokens.current_token().await.unwrap();
        assert_eq!(upstream.refresh_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_refresh_keeps_previous_token() {
        let upstream = Arc::new(MockInstagram::new());
        let tokens = manager(&upstream);
        let expires_at = tokens.expires_at().await;

        tokio::time::advance(Duration::from_secs(950)).await;
        upstream.fail_tokens(true);

        let err = tokens.current_token().await.unwrap_err();
        assert!(matches!(err, TokenError::UpstreamAuth(UpstreamError::Api(_))));
        assert_eq!(tokens.expires_at().await, expires_at);
        assert_eq!(tokens.refresh_count(), 0);

        upstream.fail_tokens(false);
        let token = tokens.current_token().await.unwrap();
        assert_eq!(token.expose_secret(), "refreshed-2");
        assert_eq!(tokens.refresh_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn refresh_times_out() {
        let upstream = Arc::new(MockInstagram::new());
        upstream.set_latency(Duration::from_secs(30));
        let tokens = manager(&upstream);

        tokio::time::advance(Duration::from_secs(900)).await;
        let err = tokens.current_token().await.unwrap_err();

        assert!(matches!(
            err,
            TokenError::UpstreamAuth(UpstreamError::Timeout(t)) if t == Duration::from_secs(5)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn shorter_upstream_lifetime_wins() {
        let upstream = Arc::new(MockInstagram::new());
        upstream.set_token_lifetime(Some(Duration::from_secs(500)));
        let tokens = manager(&upstream);

        tokio::time::advance(Duration::from_secs(900)).await;
        tokens.current_token().await.unwrap();
        assert_eq!(upstream.refresh_calls(), 1);

        // 500s lifetime minus 100s margin.
        tokio::time::advance(Duration::from_secs(400)).await;
        tokens.current_token().await.unwrap();
        assert_eq!(upstream.refresh_calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn oversized_refresh_delay_is_capped() {
        let upstream = Arc::new(MockInstagram::new());
        let tokens = TokenManager::new(
            upstream.clone(),
            SecretString::from("initial".to_string()),
            TokenPolicy {
                refresh_delay: Duration::from_secs(u64::MAX),
                ..policy()
            },
        );

        assert_eq!(tokens.expires_at().await, Instant::now() + MAX_TOKEN_LIFETIME);
        assert_eq!(tokens.current_token().await.unwrap().expose_secret(), "initial");
        assert_eq!(upstream.refresh_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn lifetime_within_margin_refreshes_on_every_call() {
        let upstream = Arc::new(MockInstagram::new());
        upstream.set_token_lifetime(Some(Duration::from_secs(100)));
        let tokens = manager(&upstream);

        tokio::time::advance(Duration::from_secs(900)).await;
        assert_eq!(tokens.current_token().await.unwrap().expose_secret(), "refreshed-1");
        assert_eq!(tokens.current_token().await.unwrap().expose_secret(), "refreshed-2");
        assert_eq!(upstream.refresh_calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_callers_share_one_refresh() {
        let upstream = Arc::new(MockInstagram::new());
        upstream.set_latency(Duration::from_secs(1));
        let tokens = manager(&upstream);

        tokio::time::advance(Duration::from_secs(900)).await;
        let (a, b) = tokio::join!(tokens.current_token(), tokens.current_token());

        assert_eq!(a.unwrap().expose_secret(), "refreshed-1");
        assert_eq!(b.unwrap().expose_secret(), "refreshed-1");
        assert_eq!(upstream.refresh_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn bootstrap_exchanges_short_lived_token() {
        let upstream = Arc::new(MockInstagram::new());
        let initial = InitialToken::ShortLived {
            token: SecretString::from("short".to_string()),
            client_secret: SecretString::from("secret".to_string()),
        };

        let tokens = TokenManager::bootstrap(upstream.clone(), initial, policy())
            .await
            .unwrap();

        assert_eq!(upstream.exchange_calls(), 1);
        assert_eq!(tokens.current_token().await.unwrap().expose_secret(), "exchanged-1");
        assert_eq!(tokens.refresh_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn bootstrap_adopts_long_lived_token() {
        let upstream = Arc::new(MockInstagram::new());
        let initial = InitialToken::LongLived(SecretString::from("long".to_string()));

        let tokens = TokenManager::bootstrap(upstream.clone(), initial, policy())
            .await
            .unwrap();

        assert_eq!(upstream.exchange_calls(), 0);
        assert_eq!(tokens.current_token().await.unwrap().expose_secret(), "long");
    }

    #[tokio::test(start_paused = true)]
    async fn bootstrap_fails_when_exchange_fails() {
        let upstream = Arc::new(MockInstagram::new());
        upstream.fail_tokens(true);
        let initial = InitialToken::ShortLived {
            token: SecretString::from("short".to_string()),
            client_secret: SecretString::from("secret".to_string()),
        };

        let result = TokenManager::bootstrap(upstream.clone(), initial, policy()).await;

        assert!(matches!(result, Err(TokenError::UpstreamAuth(_))));
    }
}
