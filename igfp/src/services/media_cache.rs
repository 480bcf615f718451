use instagram_api::endpoints::media::MediaList;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::error::{MediaError, UpstreamError};
use crate::models::{CacheStatus, MediaSnapshot, SnapshotState};
use crate::services::TokenManager;
use crate::upstream::MediaSource;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaPolicy {
    /// Field specification passed to the media endpoint.
    pub fields: String,
    /// How long a snapshot is served before it is refetched.
    pub refresh_delay: Duration,
    /// Bound on each upstream media call.
    pub timeout: Duration,
}

/// In-memory cache of the account's media list.
///
/// Reads of a fresh snapshot only clone an `Arc`. Refreshes are serialized
/// by `refresh_gate`; `attempts` counts finished refresh attempts so a caller
/// that queued behind one can tell it already happened and reuse its outcome.
pub struct MediaCache {
    source: Arc<dyn MediaSource>,
    tokens: Arc<TokenManager>,
    policy: MediaPolicy,
    snapshot: RwLock<Option<Arc<MediaSnapshot>>>,
    refresh_gate: Mutex<()>,
    attempts: AtomicU64,
    stale_fallback: AtomicBool,
}

impl MediaCache {
    pub fn new(source: Arc<dyn MediaSource>, tokens: Arc<TokenManager>, policy: MediaPolicy) -> Self {
        tracing::info!(
            refresh_delay_seconds = policy.refresh_delay.as_secs(),
            "Media cache initialized"
        );

        Self {
            source,
            tokens,
            policy,
            snapshot: RwLock::new(None),
            refresh_gate: Mutex::new(()),
            attempts: AtomicU64::new(0),
            stale_fallback: AtomicBool::new(false),
        }
    }

    /// Cached snapshot if still fresh, otherwise a refetched one. A failed
    /// refetch falls back to the previous snapshot when there is one.
    pub async fn get(&self) -> Result<Arc<MediaSnapshot>, MediaError> {
        let observed = self.attempts.load(Ordering::Acquire);
        if let Some(snapshot) = self.fresh() {
            tracing::debug!(age = ?snapshot.age(Instant::now()), "Media cache hit");
            return Ok(snapshot);
        }

        let _gate = self.refresh_gate.lock().await;
        if self.attempts.load(Ordering::Acquire) != observed {
            tracing::debug!("Reusing refresh completed while waiting");
            return self.current().ok_or(MediaError::ColdStart);
        }

        let outcome = self.refresh().await;
        self.attempts.fetch_add(1, Ordering::Release);
        outcome
    }

    /// Snapshot currently held, fresh or not, without contacting upstream.
    pub fn current(&self) -> Option<Arc<MediaSnapshot>> {
        self.snapshot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn status(&self) -> CacheStatus {
        let snapshot = self.current();
        let state = match snapshot {
            None => SnapshotState::Empty,
            Some(ref s) if s.is_fresh(Instant::now(), self.policy.refresh_delay) => {
                SnapshotState::Fresh
            }
            Some(_) => SnapshotState::Stale,
        };

        CacheStatus {
            state,
            stale_fallback: self.stale_fallback.load(Ordering::Acquire),
            fetched_at: snapshot.map(|s| s.fetched_at_utc()),
        }
    }

    /// Number of finished refresh attempts, successful or not.
    pub fn fetch_count(&self) -> u64 {
        self.attempts.load(Ordering::Acquire)
    }

    fn fresh(&self) -> Option<Arc<MediaSnapshot>> {
        self.current()
            .filter(|s| s.is_fresh(Instant::now(), self.policy.refresh_delay))
    }

    async fn refresh(&self) -> Result<Arc<MediaSnapshot>, MediaError> {
        match self.fetch().await {
            Ok(media) => {
                let snapshot = Arc::new(MediaSnapshot::new(media));
                *self.snapshot.write().unwrap_or_else(PoisonError::into_inner) =
                    Some(snapshot.clone());
                self.stale_fallback.store(false, Ordering::Release);

                tracing::info!(items = snapshot.len(), "Media snapshot refreshed");
                Ok(snapshot)
            }
            Err(e) => {
                if e.is_invalid_token() {
                    tracing::error!(error = %e, "Instagram rejected the access token");
                }
                self.fall_back(e)
            }
        }
    }

    fn fall_back(&self, e: MediaError) -> Result<Arc<MediaSnapshot>, MediaError> {
        match self.current() {
            Some(previous) => {
                self.stale_fallback.store(true, Ordering::Release);
                tracing::warn!(
                    error = %e,
                    age = ?previous.age(Instant::now()),
                    "Media refresh failed, serving stale snapshot"
                );
                Ok(previous)
            }
            None => {
                tracing::warn!(error = %e, "Media fetch failed with nothing cached");
                Err(e)
            }
        }
    }

    async fn fetch(&self) -> Result<MediaList, MediaError> {
        let token = self.tokens.current_token().await?;
        let call = self.source.fetch_media(&token, &self.policy.fields);

        match tokio::time::timeout(self.policy.timeout, call).await {
            Ok(result) => result.map_err(|e| MediaError::UpstreamFetch(UpstreamError::from(e))),
            Err(_) => Err(MediaError::UpstreamFetch(UpstreamError::Timeout(
                self.policy.timeout,
            ))),
        }
    }
}
