use serde::{Deserialize, Serialize};
use tower_api_client::{Error as ApiError, StatusCode};

/// OAuth error code Instagram uses for expired or revoked tokens.
const INVALID_TOKEN_CODE: i64 = 190;

#[derive(Debug)]
pub enum InstagramApiError {
    Instagram(StatusCode, ErrorDetail),
    Internal(ApiError),
}

impl InstagramApiError {
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            InstagramApiError::Instagram(status, _) => Some(*status),
            InstagramApiError::Internal(_) => None,
        }
    }

    /// True when Instagram rejected the access token itself.
    pub fn is_invalid_token(&self) -> bool {
        matches!(self, InstagramApiError::Instagram(_, detail) if detail.code == Some(INVALID_TOKEN_CODE))
    }
}

impl From<ApiError> for InstagramApiError {
    fn from(value: ApiError) -> Self {
        match value {
            ApiError::ClientError(status, body) | ApiError::ServerError(status, body) => {
                let detail = match serde_json::from_str::<ErrorResponse>(&body) {
                    Ok(response) => response.error,
                    Err(_) => ErrorDetail::new(body),
                };
                InstagramApiError::Instagram(status, detail)
            }
            e => InstagramApiError::Internal(e),
        }
    }
}

impl std::fmt::Display for InstagramApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InstagramApiError::Internal(e) => write!(f, "Internal error: {}", e),
            InstagramApiError::Instagram(status, detail) => match detail.kind {
                Some(ref kind) => write!(f, "({}) {}: {}", status, kind, detail.message),
                None => write!(f, "({}) {}", status, detail.message),
            },
        }
    }
}

impl std::error::Error for InstagramApiError {}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

/// Body of a Graph API error, e.g.
/// `{"error": {"message": "...", "type": "OAuthException", "code": 190}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub message: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fbtrace_id: Option<String>,
}

impl ErrorDetail {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            kind: None,
            code: None,
            fbtrace_id: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_graph_error_body() {
        let err = InstagramApiError::from(ApiError::ClientError(
            StatusCode::BAD_REQUEST,
            r#"{"error":{"message":"Error validating access token","type":"OAuthException","code":190,"fbtrace_id":"Ab12"}}"#
                .to_string(),
        ));

        assert_eq!(err.status(), Some(StatusCode::BAD_REQUEST));
        assert!(err.is_invalid_token());
        assert_eq!(
            err.to_string(),
            "(400 Bad Request) OAuthException: Error validating access token"
        );
    }

    #[test]
    fn keeps_raw_body_when_not_json() {
        let err = InstagramApiError::from(ApiError::ServerError(
            StatusCode::BAD_GATEWAY,
            "upstream unavailable".to_string(),
        ));

        match err {
            InstagramApiError::Instagram(status, detail) => {
                assert_eq!(status, StatusCode::BAD_GATEWAY);
                assert_eq!(detail, ErrorDetail::new("upstream unavailable"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
