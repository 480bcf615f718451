use crate::endpoints::{
    media::ListMedia,
    token::{ExchangeToken, RefreshToken},
};

pub struct MediaRepository;

impl MediaRepository {
    pub fn new() -> Self {
        Self {}
    }

    /// Media edge of the token owner (`/me/media`).
    pub fn list(&self, access_token: impl Into<String>) -> ListMedia {
        ListMedia::new(access_token)
    }
}

pub struct TokenRepository;

impl TokenRepository {
    pub fn new() -> Self {
        Self {}
    }

    pub fn exchange(
        &self,
        client_secret: impl Into<String>,
        access_token: impl Into<String>,
    ) -> ExchangeToken {
        ExchangeToken::new(client_secret, access_token)
    }

    pub fn refresh(&self, access_token: impl Into<String>) -> RefreshToken {
        RefreshToken::new(access_token)
    }
}
