//! HMAC-SHA1 request signatures.

use super::Secret;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use hmac::{Hmac, Mac};
use sha1::Sha1;

type HmacSha1 = Hmac<Sha1>;

/// Header carrying `Apollo {appId}:{signature}`.
pub const AUTHORIZATION_HEADER: &str = "Authorization";

/// Header carrying the signing timestamp in unix milliseconds.
pub const TIMESTAMP_HEADER: &str = "Timestamp";

const DELIMITER: char = '\n';

/// Compute the base64 HMAC-SHA1 signature of `"{timestamp}\n{path_with_query}"`.
///
/// Returns an empty string if any input is empty (or the timestamp is zero).
/// An empty signature means "send the request unsigned".
///
/// # Examples
///
/// ```rust
/// use apollo_watch::auth::sign;
///
/// let signature = sign(1700000000000, "/configs/A1/default/app.yml", b"s3cr3t");
/// assert_eq!(signature, "tJiQAKbkCP12Jc/joiOhU9fNJwM=");
///
/// assert!(sign(1700000000000, "/configs/A1/default/app.yml", b"").is_empty());
/// ```
pub fn sign(timestamp: i64, path_with_query: &str, secret: &[u8]) -> String {
    if timestamp == 0 || path_with_query.is_empty() || secret.is_empty() {
        return String::new();
    }

    // HMAC accepts keys of any length
    let Ok(mut mac) = HmacSha1::new_from_slice(secret) else {
        return String::new();
    };
    mac.update(format!("{timestamp}{DELIMITER}{path_with_query}").as_bytes());

    STANDARD.encode(mac.finalize().into_bytes())
}

/// Format the `Authorization` header value for `app_id`.
///
/// Returns `None` when the app id is empty or the signature would be empty.
pub fn authorization_header(
    app_id: &str,
    timestamp: i64,
    path_with_query: &str,
    secret: &[u8],
) -> Option<String> {
    if app_id.is_empty() {
        return None;
    }
    let signature = sign(timestamp, path_with_query, secret);
    if signature.is_empty() {
        return None;
    }
    Some(format!("Apollo {app_id}:{signature}"))
}

/// Build the authentication headers for a GET of `url` on behalf of `app_id`.
///
/// The signed string uses the URL's path plus `?query` when a query is present.
/// Returns no headers when no secret resolves for the app or the URL cannot be parsed.
pub fn signed_headers(
    secret: Option<&Secret>,
    app_id: &str,
    url: &str,
    timestamp: i64,
) -> Vec<(String, String)> {
    let Some(secret) = secret.and_then(|s| s.for_app(app_id)) else {
        return Vec::new();
    };

    let Ok(parsed) = url::Url::parse(url) else {
        return Vec::new();
    };
    let mut path_with_query = parsed.path().to_string();
    if let Some(query) = parsed.query().filter(|q| !q.is_empty()) {
        path_with_query.push('?');
        path_with_query.push_str(query);
    }

    match authorization_header(app_id, timestamp, &path_with_query, secret.as_bytes()) {
        Some(authorization) => vec![
            (AUTHORIZATION_HEADER.to_string(), authorization),
            (TIMESTAMP_HEADER.to_string(), timestamp.to_string()),
        ],
        None => Vec::new(),
    }
}
