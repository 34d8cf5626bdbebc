//! API utility functions
//!
//! Pure, stateless helpers for HTTP request processing, extracted from
//! services.rs for unit testing.

use crate::api::error::ApiError;

/// Parses and validates Content-Type header for application/json
///
/// Accepts:
/// - `application/json`
/// - `application/json; charset=utf-8`
///
/// Rejects:
/// - `application/jsonp`
/// - `text/json`
/// - Malformed media types
pub fn parse_content_type(content_type: &str) -> Result<mime::Mime, ApiError> {
    let media_type: mime::Mime = content_type
        .parse()
        .map_err(|_| ApiError::InvalidPayload(format!("invalid Content-Type: {}", content_type)))?;

    if media_type.type_() != mime::APPLICATION || media_type.subtype() != mime::JSON {
        return Err(ApiError::InvalidPayload(format!(
            "Content-Type must be application/json, got: {}/{}",
            media_type.type_(),
            media_type.subtype()
        )));
    }

    Ok(media_type)
}

/// Validates that body size does not exceed the maximum allowed size
pub fn validate_body_size(data: &[u8], max_size: usize) -> Result<(), ApiError> {
    if data.len() > max_size {
        return Err(ApiError::PayloadTooLarge(data.len()));
    }
    Ok(())
}

/// Validates an optional webhook URI: must parse and be http(s).
pub fn validate_webhook_uri(uri: &str) -> Result<(), ApiError> {
    let parsed = url::Url::parse(uri)
        .map_err(|_| ApiError::InvalidPayload(format!("invalid webhook_uri: {}", uri)))?;

    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return Err(ApiError::InvalidPayload(format!(
            "webhook_uri must be http or https, got: {}",
            parsed.scheme()
        )));
    }

    Ok(())
}
