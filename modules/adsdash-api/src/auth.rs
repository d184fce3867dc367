use std::sync::Arc;

use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts, HeaderMap},
    response::{IntoResponse, Redirect, Response},
};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use adsdash_common::Config;

use crate::error::ApiError;
use crate::AppState;

type HmacSha256 = Hmac<Sha256>;

pub const COOKIE_NAME: &str = "adsdash_session";
const SESSION_DURATION_SECS: i64 = 7 * 24 * 3600; // 7 days

/// Signed-in user for HTML pages. Missing or invalid sessions redirect to /login.
pub struct Session {
    pub login: String,
}

impl FromRequestParts<Arc<AppState>> for Session {
    type Rejection = Response;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        match session_login(&parts.headers, &state.config) {
            Some(login) => Ok(Session { login }),
            None => Err(Redirect::to("/login").into_response()),
        }
    }
}

/// Signed-in user for JSON routes. Missing or invalid sessions answer 401.
pub struct ApiSession {
    pub login: String,
}

impl FromRequestParts<Arc<AppState>> for ApiSession {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        session_login(&parts.headers, &state.config)
            .map(|login| ApiSession { login })
            .ok_or(ApiError::Unauthorized)
    }
}

/// Login named by a valid session cookie, if that login is still configured.
fn session_login(headers: &HeaderMap, config: &Config) -> Option<String> {
    let cookie_header = headers
        .get(header::COOKIE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    let value = parse_cookie(cookie_header, COOKIE_NAME)?;
    let login = verify_session(value, &config.session_secret)?;
    config.users.contains_key(&login).then_some(login)
}

/// Check a login/password pair against the configured users.
pub fn check_credentials(config: &Config, login: &str, password: &str) -> bool {
    match config.users.get(login) {
        Some(expected) => constant_time_eq(password.as_bytes(), expected.as_bytes()),
        None => false,
    }
}

/// `Authorization: Bearer <secret>` matches. An unset secret never matches.
pub fn bearer_matches(headers: &HeaderMap, secret: Option<&str>) -> bool {
    let Some(secret) = secret else {
        return false;
    };
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .is_some_and(|token| constant_time_eq(token.as_bytes(), secret.as_bytes()))
}

/// Shared-secret check for the webhook: `x-webhook-secret` header, else the `secret` query value.
pub fn webhook_secret_matches(
    headers: &HeaderMap,
    query_secret: Option<&str>,
    secret: Option<&str>,
) -> bool {
    let Some(secret) = secret else {
        return false;
    };
    let provided = headers
        .get("x-webhook-secret")
        .and_then(|v| v.to_str().ok())
        .or(query_secret);
    provided.is_some_and(|p| constant_time_eq(p.as_bytes(), secret.as_bytes()))
}

/// Create a signed session cookie value: `login|expiry|signature`
pub fn create_session(login: &str, secret: &str) -> String {
    let expiry = chrono::Utc::now().timestamp() + SESSION_DURATION_SECS;
    let payload = format!("{login}|{expiry}");
    let sig = sign(&payload, secret);
    format!("{payload}|{sig}")
}

/// Build the Set-Cookie header value.
/// In release builds, adds `Secure` flag to prevent transmission over HTTP.
pub fn session_cookie(login: &str, secret: &str) -> String {
    let value = create_session(login, secret);
    let secure = if cfg!(debug_assertions) { "" } else { "; Secure" };
    format!(
        "{COOKIE_NAME}={value}; Path=/; HttpOnly; SameSite=Lax; Max-Age={SESSION_DURATION_SECS}{secure}"
    )
}

/// Build a Set-Cookie header that clears the session.
pub fn clear_session_cookie() -> String {
    format!("{COOKIE_NAME}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0")
}

/// Verify a session cookie value. Returns the login if valid.
fn verify_session(value: &str, secret: &str) -> Option<String> {
    // Logins may not contain '|', so the signature is always the last segment.
    let (payload, sig) = value.rsplit_once('|')?;
    let (login, expiry_str) = payload.rsplit_once('|')?;
    if login.is_empty() {
        return None;
    }

    let expected_sig = sign(payload, secret);
    if !constant_time_eq(sig.as_bytes(), expected_sig.as_bytes()) {
        return None;
    }

    let expiry: i64 = expiry_str.parse().ok()?;
    if chrono::Utc::now().timestamp() > expiry {
        return None;
    }

    Some(login.to_string())
}

fn sign(payload: &str, secret: &str) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .expect("HMAC can take key of any size");
    mac.update(payload.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Constant-time comparison to prevent timing attacks.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter()
        .zip(b.iter())
        .fold(0u8, |acc, (x, y)| acc | (x ^ y))
        == 0
}

/// Parse a specific cookie from the Cookie header string.
fn parse_cookie<'a>(header: &'a str, name: &str) -> Option<&'a str> {
    header
        .split(';')
        .map(str::trim)
        .find_map(|part| part.strip_prefix(name)?.strip_prefix('='))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn config() -> Config {
        Config::from_vars(|key| match key {
            "DATABASE_URL" => Some("postgres://localhost/adsdash".to_string()),
            "SESSION_SECRET" => Some("test-secret".to_string()),
            "USERS" => Some("anna:pw1,boris:pw2".to_string()),
            _ => None,
        })
        .unwrap()
    }

    fn headers_with(name: header::HeaderName, value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(name, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn roundtrip_session() {
        let value = create_session("anna", "test-secret-key");
        assert_eq!(verify_session(&value, "test-secret-key"), Some("anna".to_string()));
    }

    #[test]
    fn rejects_tampered_session() {
        let value = create_session("anna", "test-secret-key");
        let tampered = value.replacen("anna", "boris", 1);
        assert_eq!(verify_session(&tampered, "test-secret-key"), None);
    }

    #[test]
    fn rejects_wrong_secret() {
        let value = create_session("anna", "secret-a");
        assert_eq!(verify_session(&value, "secret-b"), None);
    }

    #[test]
    fn rejects_expired_session() {
        let secret = "test-secret";
        let expiry = chrono::Utc::now().timestamp() - 100;
        let payload = format!("anna|{expiry}");
        let value = format!("{payload}|{}", sign(&payload, secret));
        assert_eq!(verify_session(&value, secret), None);
    }

    #[test]
    fn rejects_garbage() {
        assert_eq!(verify_session("", "s"), None);
        assert_eq!(verify_session("anna", "s"), None);
        assert_eq!(verify_session("anna|notanumber|abc", "s"), None);
    }

    #[test]
    fn parse_cookie_works() {
        assert_eq!(
            parse_cookie("adsdash_session=abc123; other=xyz", COOKIE_NAME),
            Some("abc123")
        );
        assert_eq!(
            parse_cookie("other=xyz; adsdash_session=abc123", COOKIE_NAME),
            Some("abc123")
        );
        assert_eq!(parse_cookie("other=xyz", COOKIE_NAME), None);
        assert_eq!(parse_cookie("adsdash_sessionx=1", COOKIE_NAME), None);
    }

    #[test]
    fn session_requires_a_configured_login() {
        let config = config();
        let cookie = format!("{COOKIE_NAME}={}", create_session("anna", "test-secret"));
        assert_eq!(
            session_login(&headers_with(header::COOKIE, &cookie), &config),
            Some("anna".to_string())
        );

        let removed = format!("{COOKIE_NAME}={}", create_session("carl", "test-secret"));
        assert_eq!(session_login(&headers_with(header::COOKIE, &removed), &config), None);
    }

    #[test]
    fn credentials_check() {
        let config = config();
        assert!(check_credentials(&config, "anna", "pw1"));
        assert!(!check_credentials(&config, "anna", "pw2"));
        assert!(!check_credentials(&config, "nobody", "pw1"));
    }

    #[test]
    fn bearer_check() {
        let headers = headers_with(header::AUTHORIZATION, "Bearer cron-123");
        assert!(bearer_matches(&headers, Some("cron-123")));
        assert!(!bearer_matches(&headers, Some("cron-124")));
        assert!(!bearer_matches(&headers, None));
        assert!(!bearer_matches(&HeaderMap::new(), Some("cron-123")));
    }

    #[test]
    fn webhook_secret_from_header_or_query() {
        let headers = headers_with(header::HeaderName::from_static("x-webhook-secret"), "hook");
        assert!(webhook_secret_matches(&headers, None, Some("hook")));
        assert!(webhook_secret_matches(&HeaderMap::new(), Some("hook"), Some("hook")));
        assert!(!webhook_secret_matches(&HeaderMap::new(), Some("nope"), Some("hook")));
        assert!(!webhook_secret_matches(&headers, None, None));
    }
}
