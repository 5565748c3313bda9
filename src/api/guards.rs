//! Request-side security middleware: the XSS payload logger and the
//! upload size gate for the sandbox write endpoint.

use axum::{
    body::Body,
    extract::{Request, State},
    http::{HeaderMap, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use serde_json::json;
use std::sync::Arc;

use super::{ApiError, AppState, auth};
use crate::services::{AuditAction, Claims};

/// Client address as reported by proxy headers. Returns `None` when the
/// headers are absent or not trusted; audit rows then store a null IP.
pub(super) fn client_ip(headers: &HeaderMap, trust_proxy: bool) -> Option<String> {
    if !trust_proxy {
        return None;
    }

    let raw = headers
        .get("x-forwarded-for")
        .and_then(|h| h.to_str().ok())
        .and_then(|v| v.split(',').next())
        .or_else(|| headers.get("x-real-ip").and_then(|h| h.to_str().ok()))?;

    let ip = raw.trim();
    if ip.is_empty() {
        return None;
    }

    if ip == "::1" {
        return Some("127.0.0.1".to_string());
    }
    if let Some(mapped) = ip.strip_prefix("::ffff:") {
        return Some(mapped.to_string());
    }

    Some(ip.to_string())
}

/// Subject id from a token without verifying the signature. Forged tokens
/// still attribute their audit rows to the id they claim.
fn unverified_subject(token: &str) -> Option<i32> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;

    jsonwebtoken::decode::<Claims>(token, &DecodingKey::from_secret(&[]), &validation)
        .ok()
        .map(|data| data.claims.sub)
}

fn content_length(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(header::CONTENT_LENGTH)
        .and_then(|h| h.to_str().ok())
        .and_then(|v| v.parse().ok())
}

/// Reject oversized uploads by `Content-Length` before the body is read.
pub async fn payload_limit(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let limit = state.config().read().await.sandbox.max_upload_bytes;

    if let Some(length) = content_length(request.headers())
        && length > limit
    {
        tracing::warn!("Upload rejected: Content-Length {} over limit {}", length, limit);
        return Err(ApiError::PayloadTooLarge("File too large".to_string()));
    }

    Ok(next.run(request).await)
}

/// Scan the query string and request body for XSS-shaped payloads and
/// record hits to the audit trail. The request always proceeds; the lab
/// observes attacks, it does not block them.
pub async fn xss_logger(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    let (trust_proxy, max_scan_bytes) = {
        let config = state.config().read().await;
        (
            config.security.trust_proxy_headers,
            config.sandbox.max_upload_bytes,
        )
    };

    let (parts, body) = request.into_parts();

    let mut matches = Vec::new();

    if let Some(query) = parts.uri.query() {
        let decoded = urlencoding::decode(query).unwrap_or(std::borrow::Cow::Borrowed(query));
        matches.extend(state.scanner().scan_text(&decoded));
    }

    // Bodies over the upload cap are passed through unscanned; the
    // save-file gate rejects them separately.
    let skip_body = content_length(&parts.headers).is_some_and(|len| len > max_scan_bytes);

    let body = if skip_body {
        body
    } else {
        let bytes = match axum::body::to_bytes(body, usize::try_from(max_scan_bytes).unwrap_or(usize::MAX)).await {
            Ok(bytes) => bytes,
            Err(_) => {
                return (StatusCode::PAYLOAD_TOO_LARGE, "Payload too large").into_response();
            }
        };

        if let Ok(value) = serde_json::from_slice::<serde_json::Value>(&bytes) {
            matches.extend(state.scanner().scan_json(&value));
        } else if let Ok(text) = std::str::from_utf8(&bytes) {
            matches.extend(state.scanner().scan_text(text));
        }

        Body::from(bytes)
    };

    if !matches.is_empty() {
        let user_id = auth::extract_token(&parts.headers)
            .as_deref()
            .and_then(unverified_subject);
        let ip = client_ip(&parts.headers, trust_proxy);

        let context = json!({
            "path": parts.uri.path(),
            "method": parts.method.as_str(),
            "matches": matches,
        });

        state
            .audit()
            .record(AuditAction::XssAttemptFailed, user_id, ip, Some(context))
            .await;
    }

    next.run(Request::from_parts(parts, body)).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn forwarded_header_wins_and_is_normalized() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("203.0.113.9, 10.0.0.1"),
        );
        assert_eq!(
            client_ip(&headers, true),
            Some("203.0.113.9".to_string())
        );
        assert_eq!(client_ip(&headers, false), None);

        let mut headers = HeaderMap::new();
        headers.insert("x-real-ip", HeaderValue::from_static("::ffff:192.0.2.7"));
        assert_eq!(client_ip(&headers, true), Some("192.0.2.7".to_string()));

        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("::1"));
        assert_eq!(client_ip(&headers, true), Some("127.0.0.1".to_string()));
    }

    #[test]
    fn missing_headers_yield_no_ip() {
        assert_eq!(client_ip(&HeaderMap::new(), true), None);
    }

    #[test]
    fn unverified_subject_reads_forged_tokens() {
        use jsonwebtoken::{EncodingKey, Header, encode};

        let claims = Claims {
            sub: 42,
            email: "spoof@example.com".to_string(),
            role: "admin".to_string(),
            iat: 0,
            exp: 0,
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(b"some-other-secret"),
        )
        .unwrap();

        assert_eq!(unverified_subject(&token), Some(42));
        assert_eq!(unverified_subject("garbage"), None);
    }
}
