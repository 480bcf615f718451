use config::{Config, Environment, File};
use secrecy::SecretString;
use serde::Deserialize;
use std::fmt;
use std::time::Duration;
use url::Url;

use crate::error::{ConfigurationError, TokenError};
use crate::models::MAX_TOKEN_LIFETIME;
use crate::services::{InitialToken, MediaPolicy, TokenPolicy};

const DEFAULT_MEDIA_FIELDS: &str = "caption, id, media_type, media_url, permalink, thumbnail_url, \
    timestamp, username, children{id, media_type, media_url, permalink, thumbnail_url, timestamp, username}";

#[derive(Debug, Deserialize)]
pub struct Configuration {
    pub instagram: InstagramConfiguration,

    #[serde(default)]
    pub media: MediaConfiguration,

    #[serde(default)]
    pub token: TokenConfiguration,

    #[serde(default)]
    pub upstream: UpstreamConfiguration,
}

#[derive(Deserialize)]
pub struct InstagramConfiguration {
    pub access_token: String,

    #[serde(default)]
    pub token_kind: TokenKind,

    #[serde(default)]
    pub client_secret: Option<String>,

    #[serde(default = "default_graph_url")]
    pub graph_url: String,
}

#[derive(Debug, Default, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    ShortLived,
    #[default]
    LongLived,
}

#[derive(Debug, Deserialize)]
pub struct MediaConfiguration {
    #[serde(default = "default_media_fields")]
    pub fields: String,

    #[serde(default = "default_media_refresh_delay")]
    pub refresh_delay_seconds: u64,
}

#[derive(Debug, Deserialize)]
pub struct TokenConfiguration {
    #[serde(default = "default_token_refresh_delay")]
    pub refresh_delay_seconds: u64,

    #[serde(default = "default_safety_margin")]
    pub safety_margin_seconds: u64,
}

#[derive(Debug, Deserialize)]
pub struct UpstreamConfiguration {
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
}

fn default_graph_url() -> String {
    instagram_api::GRAPH_URL.to_string()
}

fn default_media_fields() -> String {
    DEFAULT_MEDIA_FIELDS.to_string()
}

// Keeps well clear of the Graph API rate limit.
fn default_media_refresh_delay() -> u64 {
    60 * 5
}

// Long-lived tokens last 60 days; refreshing at 30 never misses the window.
fn default_token_refresh_delay() -> u64 {
    60 * 60 * 24 * 30
}

fn default_safety_margin() -> u64 {
    300
}

fn default_timeout() -> u64 {
    10
}

impl Default for MediaConfiguration {
    fn default() -> Self {
        Self {
            fields: default_media_fields(),
            refresh_delay_seconds: default_media_refresh_delay(),
        }
    }
}

impl Default for TokenConfiguration {
    fn default() -> Self {
        Self {
            refresh_delay_seconds: default_token_refresh_delay(),
            safety_margin_seconds: default_safety_margin(),
        }
    }
}

impl Default for UpstreamConfiguration {
    fn default() -> Self {
        Self {
            timeout_seconds: default_timeout(),
        }
    }
}

impl fmt::Debug for InstagramConfiguration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstagramConfiguration")
            .field("access_token", &"[REDACTED]")
            .field("token_kind", &self.token_kind)
            .field(
                "client_secret",
                &self.client_secret.as_ref().map(|_| "[REDACTED]"),
            )
            .field("graph_url", &self.graph_url)
            .finish()
    }
}

impl InstagramConfiguration {
    pub fn initial_token(&self) -> Result<InitialToken, TokenError> {
        let token = SecretString::from(self.access_token.clone());
        match self.token_kind {
            TokenKind::LongLived => Ok(InitialToken::LongLived(token)),
            TokenKind::ShortLived => {
                let client_secret = self
                    .client_secret
                    .clone()
                    .ok_or(TokenError::MissingClientSecret)?;
                Ok(InitialToken::ShortLived {
                    token,
                    client_secret: SecretString::from(client_secret),
                })
            }
        }
    }
}

impl Configuration {
    /// Load `config.toml` (or the file named by `IGFP_CONFIG`) overlaid with
    /// `IGFP__SECTION__KEY` environment variables.
    pub fn new() -> Result<Self, ConfigurationError> {
        let config_path =
            std::env::var("IGFP_CONFIG").unwrap_or_else(|_| "config.toml".to_string());

        let settings = Config::builder()
            .add_source(File::with_name(&config_path).required(false))
            .add_source(Environment::with_prefix("IGFP").separator("__"))
            .build()?;

        Self::from_config(settings)
    }

    fn from_config(settings: Config) -> Result<Self, ConfigurationError> {
        let configuration: Self = settings.try_deserialize()?;
        configuration.validate()?;
        Ok(configuration)
    }

    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.instagram.access_token.trim().is_empty() {
            return Err(invalid("instagram.access_token is required"));
        }
        match Url::parse(&self.instagram.graph_url) {
            Ok(url) if matches!(url.scheme(), "http" | "https") && url.has_host() => {}
            _ => return Err(invalid("instagram.graph_url must be a valid HTTP(S) URL")),
        }
        if self.instagram.token_kind == TokenKind::ShortLived
            && self.instagram.client_secret.as_deref().is_none_or(str::is_empty)
        {
            return Err(invalid(
                "instagram.client_secret is required for a short_lived token",
            ));
        }
        if self.media.fields.trim().is_empty() {
            return Err(invalid("media.fields must not be empty"));
        }
        if self.media.refresh_delay_seconds == 0 {
            return Err(invalid("media.refresh_delay_seconds must be positive"));
        }
        if self.token.refresh_delay_seconds == 0 {
            return Err(invalid("token.refresh_delay_seconds must be positive"));
        }
        if self.token.refresh_delay_seconds > MAX_TOKEN_LIFETIME.as_secs() {
            return Err(invalid(
                "token.refresh_delay_seconds must not exceed 60 days",
            ));
        }
        if self.token.safety_margin_seconds >= self.token.refresh_delay_seconds {
            return Err(invalid(
                "token.safety_margin_seconds must be smaller than token.refresh_delay_seconds",
            ));
        }
        if self.upstream.timeout_seconds == 0 {
            return Err(invalid("upstream.timeout_seconds must be positive"));
        }
        Ok(())
    }

    pub fn upstream_timeout(&self) -> Duration {
        Duration::from_secs(self.upstream.timeout_seconds)
    }
}

fn invalid(message: &str) -> ConfigurationError {
    ConfigurationError::Invalid(message.to_string())
}

impl From<&Configuration> for TokenPolicy {
    fn from(configuration: &Configuration) -> Self {
        Self {
            refresh_delay: Duration::from_secs(configuration.token.refresh_delay_seconds),
            safety_margin: Duration::from_secs(configuration.token.safety_margin_seconds),
            timeout: configuration.upstream_timeout(),
        }
    }
}

impl From<&Configuration> for MediaPolicy {
    fn from(configuration: &Configuration) -> Self {
        Self {
            fields: configuration.media.fields.clone(),
            refresh_delay: Duration::from_secs(configuration.media.refresh_delay_seconds),
            timeout: configuration.upstream_timeout(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::FileFormat;

    fn load(toml: &str) -> Result<Configuration, ConfigurationError> {
        let settings = Config::builder()
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()?;
        Configuration::from_config(settings)
    }

    #[test]
    fn applies_defaults() {
        let configuration = load(
            r#"
            [instagram]
            access_token = "IGQVJ-long"
            "#,
        )
        .unwrap();

        assert_eq!(configuration.instagram.token_kind, TokenKind::LongLived);
        assert_eq!(configuration.instagram.graph_url, "https://graph.instagram.com");
        assert!(configuration.media.fields.starts_with("caption, id, media_type"));

        let media = MediaPolicy::from(&configuration);
        assert_eq!(media.refresh_delay, Duration::from_secs(300));
        assert_eq!(media.timeout, Duration::from_secs(10));

        let token = TokenPolicy::from(&configuration);
        assert_eq!(token.refresh_delay, Duration::from_secs(2_592_000));
        assert_eq!(token.safety_margin, Duration::from_secs(300));
    }

    #[test]
    fn reads_overrides() {
        let configuration = load(
            r#"
            [instagram]
            access_token = "IGQVJ-short"
            token_kind = "short_lived"
            client_secret = "app-secret"
            graph_url = "http://localhost:9000"

            [media]
            fields = "id,media_url"
            refresh_delay_seconds = 60

            [token]
            refresh_delay_seconds = 3600
            safety_margin_seconds = 600

            [upstream]
            timeout_seconds = 3
            "#,
        )
        .unwrap();

        assert_eq!(configuration.media.fields, "id,media_url");
        assert_eq!(TokenPolicy::from(&configuration).timeout, Duration::from_secs(3));
        assert!(matches!(
            configuration.instagram.initial_token(),
            Ok(InitialToken::ShortLived { .. })
        ));
    }

    #[test]
    fn rejects_short_lived_token_without_secret() {
        let err = load(
            r#"
            [instagram]
            access_token = "IGQVJ-short"
            token_kind = "short_lived"
            "#,
        )
        .unwrap_err();

        assert!(matches!(err, ConfigurationError::Invalid(_)));
    }

    #[test]
    fn rejects_margin_not_below_refresh_delay() {
        let err = load(
            r#"
            [instagram]
            access_token = "IGQVJ-long"

            [token]
            refresh_delay_seconds = 300
            safety_margin_seconds = 300
            "#,
        )
        .unwrap_err();

        assert!(err.to_string().contains("safety_margin_seconds"));
    }

    #[test]
    fn rejects_token_delay_beyond_token_lifetime() {
        let err = load(
            r#"
            [instagram]
            access_token = "IGQVJ-long"

            [token]
            refresh_delay_seconds = 9223372036854775807
            "#,
        )
        .unwrap_err();

        assert!(err.to_string().contains("token.refresh_delay_seconds"));

        let configuration = load(
            r#"
            [instagram]
            access_token = "IGQVJ-long"

            [token]
            refresh_delay_seconds = 5184000
            "#,
        )
        .unwrap();
        assert_eq!(
            TokenPolicy::from(&configuration).refresh_delay,
            MAX_TOKEN_LIFETIME
        );
    }

    #[test]
    fn rejects_malformed_graph_url() {
        for graph_url in ["httpjunk", "http", "ftp://graph.instagram.com", "http://"] {
            let err = load(&format!(
                "[instagram]\naccess_token = \"IGQVJ-long\"\ngraph_url = \"{graph_url}\"\n"
            ))
            .unwrap_err();

            assert!(
                err.to_string().contains("instagram.graph_url"),
                "{graph_url} was accepted"
            );
        }
    }

    #[test]
    fn requires_access_token() {
        let err = load("[media]\nrefresh_delay_seconds = 60\n").unwrap_err();

        assert!(matches!(err, ConfigurationError::Load(_)));
    }

    #[test]
    fn debug_output_hides_secrets() {
        let configuration = load(
            r#"
            [instagram]
            access_token = "IGQVJ-very-secret"
            "#,
        )
        .unwrap();

        assert!(!format!("{:?}", configuration).contains("IGQVJ-very-secret"));
    }
}
