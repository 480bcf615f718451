use super::Redacted;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::borrow::Cow;
use std::fmt;
use tower_api_client::{Request, RequestData};

// Common

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MediaType {
    #[serde(rename = "IMAGE")]
    Image,
    #[serde(rename = "VIDEO")]
    Video,
    #[serde(rename = "CAROUSEL_ALBUM")]
    CarouselAlbum,
    #[serde(untagged)]
    Other(String),
}

/// A media object. Only `id` is always present; everything else depends on
/// the requested field specification. Fields without a typed slot are kept
/// in `extra` so they are relayed unchanged.
#[derive(Default, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Media {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_type: Option<MediaType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permalink: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub children: Option<Children>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Media {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }
}

#[derive(Default, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Children {
    pub data: Vec<Media>,
}

#[derive(Default, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Paging {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cursors: Option<Cursors>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous: Option<String>,
}

#[derive(Default, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cursors {
    pub before: String,
    pub after: String,
}

// Requests

/// Media of the user who owns the access token.
#[derive(Clone, Serialize)]
pub struct ListMedia {
    #[serde(skip_serializing_if = "Option::is_none")]
    fields: Option<String>,
    access_token: String,
}

impl ListMedia {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            fields: None,
            access_token: access_token.into(),
        }
    }

    pub fn fields(mut self, fields: impl Into<String>) -> Self {
        self.fields = Some(fields.into());
        self
    }
}

impl fmt::Debug for ListMedia {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListMedia")
            .field("fields", &self.fields)
            .field("access_token", &Redacted)
            .finish()
    }
}

impl Request for ListMedia {
    type Data = Self;
    type Response = MediaList;

    fn endpoint(&self) -> Cow<'_, str> {
        "/me/media".into()
    }

    fn data(&self) -> RequestData<&Self> {
        RequestData::Query(self)
    }
}

// Responses

#[derive(Default, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaList {
    pub data: Vec<Media>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paging: Option<Paging>,
}
