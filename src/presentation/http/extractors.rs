//! Custom Extractors
//!
//! Axum extractors for request parsing.

use axum::{
    extract::{FromRequestParts, Path},
    http::request::Parts,
};

use crate::shared::error::AppError;

/// A single Snowflake ID taken from the request path.
///
/// IDs travel as strings in JSON; a value that does not parse as `i64` is a
/// bad request rather than a routing miss.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PathId(pub i64);

impl<S> FromRequestParts<S> for PathId
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(raw) = Path::<String>::from_request_parts(parts, state)
            .await
            .map_err(|_| AppError::BadRequest("Missing ID in path".into()))?;

        parse_id(&raw).map(PathId)
    }
}

/// Parse a Snowflake ID sent as a string.
pub fn parse_id(raw: &str) -> Result<i64, AppError> {
    raw.trim()
        .parse()
        .map_err(|_| AppError::BadRequest(format!("Invalid ID: {}", raw)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_id() {
        assert_eq!(parse_id("1234567890123").unwrap(), 1234567890123);
        assert!(matches!(parse_id("abc"), Err(AppError::BadRequest(_))));
        assert!(matches!(parse_id(""), Err(AppError::BadRequest(_))));
    }
}
