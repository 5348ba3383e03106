//! Request DTOs
//!
//! Data structures for API request bodies and query strings.

use serde::Deserialize;
use validator::Validate;

/// Like request
#[derive(Debug, Default, Deserialize)]
pub struct LikeRequest {
    #[serde(default)]
    pub is_super: bool,
}

/// Send message request
#[derive(Debug, Deserialize, Validate)]
pub struct SendMessageRequest {
    #[serde(default)]
    pub content: String,

    #[validate(
        url(message = "Attachment must be a URL"),
        length(max = 2048, message = "Attachment URL is too long")
    )]
    pub attachment_url: Option<String>,
}

/// Message history query (`?before=<message id>&limit=<n>`)
#[derive(Debug, Default, Deserialize, Validate)]
pub struct HistoryQuery {
    pub before: Option<i64>,

    #[validate(range(min = 1, max = 100, message = "Limit must be between 1 and 100"))]
    pub limit: Option<i64>,
}
