use chrono::{DateTime, Utc};
use instagram_api::endpoints::media::{Media, MediaList};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use std::time::Duration;
use tokio::time::Instant;

/// Instagram long-lived tokens never outlive 60 days.
pub const MAX_TOKEN_LIFETIME: Duration = Duration::from_secs(60 * 60 * 24 * 60);

/// The upstream credential currently in use.
#[derive(Debug)]
pub struct AccessToken {
    secret: SecretString,
    expires_at: Instant,
    expires_at_utc: Option<DateTime<Utc>>,
    lifetime: Duration,
}

impl AccessToken {
    /// Issue a token valid for `refresh_delay`, or for the upstream lifetime
    /// when that is shorter. Never longer than [`MAX_TOKEN_LIFETIME`].
    pub fn issue(secret: SecretString, refresh_delay: Duration, upstream: Option<Duration>) -> Self {
        let lifetime = upstream
            .map_or(refresh_delay, |upstream| upstream.min(refresh_delay))
            .min(MAX_TOKEN_LIFETIME);
        let now = Instant::now();
        Self {
            secret,
            // An unrepresentable expiry makes the token due right away.
            expires_at: now.checked_add(lifetime).unwrap_or(now),
            expires_at_utc: wall_clock_after(lifetime),
            lifetime,
        }
    }

    /// Whether `now` has reached `expires_at - safety_margin`.
    pub fn is_due(&self, now: Instant, safety_margin: Duration) -> bool {
        now.checked_add(safety_margin)
            .is_none_or(|deadline| deadline >= self.expires_at)
    }

    pub fn expires_at(&self) -> Instant {
        self.expires_at
    }

    pub fn expires_at_utc(&self) -> Option<DateTime<Utc>> {
        self.expires_at_utc
    }

    /// How long the token was issued for.
    pub fn lifetime(&self) -> Duration {
        self.lifetime
    }

    pub fn secret(&self) -> &SecretString {
        &self.secret
    }

    /// A separately owned copy of the secret for a caller.
    pub fn share(&self) -> SecretString {
        SecretString::from(self.secret.expose_secret().to_owned())
    }
}

fn wall_clock_after(lifetime: Duration) -> Option<DateTime<Utc>> {
    chrono::Duration::from_std(lifetime)
        .ok()
        .and_then(|lifetime| Utc::now().checked_add_signed(lifetime))
}

/// Result of one successful media fetch. Serializes to the upstream shape.
#[derive(Debug, Serialize)]
pub struct MediaSnapshot {
    #[serde(flatten)]
    media: MediaList,
    #[serde(skip)]
    fetched_at: Instant,
    #[serde(skip)]
    fetched_at_utc: DateTime<Utc>,
}

impl MediaSnapshot {
    pub fn new(media: MediaList) -> Self {
        Self {
            media,
            fetched_at: Instant::now(),
            fetched_at_utc: Utc::now(),
        }
    }

    pub fn media(&self) -> &MediaList {
        &self.media
    }

    pub fn items(&self) -> &[Media] {
        &self.media.data
    }

    pub fn len(&self) -> usize {
        self.media.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.media.data.is_empty()
    }

    pub fn fetched_at(&self) -> Instant {
        self.fetched_at
    }

    pub fn fetched_at_utc(&self) -> DateTime<Utc> {
        self.fetched_at_utc
    }

    pub fn age(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.fetched_at)
    }

    pub fn is_fresh(&self, now: Instant, refresh_delay: Duration) -> bool {
        self.age(now) < refresh_delay
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotState {
    Empty,
    Fresh,
    Stale,
}

/// Point-in-time view of the media cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheStatus {
    pub state: SnapshotState,
    /// Set when the last refresh failed and the previous snapshot was served.
    pub stale_fallback: bool,
    pub fetched_at: Option<DateTime<Utc>>,
}
