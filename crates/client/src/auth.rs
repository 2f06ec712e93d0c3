//! Per-request authentication headers.
//!
//! Every request needs a fresh `Authorization: Bearer <idToken>` plus the
//! app attestation header. Tokens can expire mid-session, so callers ask a
//! provider right before each request instead of holding on to headers.

use std::future::Future;
use std::pin::Pin;
use std::time::{SystemTime, UNIX_EPOCH};

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderName, HeaderValue};
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{debug, info};

const DEFAULT_TOKEN_ENDPOINT: &str = "https://securetoken.googleapis.com/v1/token";

/// Carries the app attestation token (`X-Firebase-AppCheck` on the wire).
const APP_CHECK: HeaderName = HeaderName::from_static("x-firebase-appcheck");

/// Refresh this long before the ID token actually expires.
const EXPIRY_MARGIN_SECS: u64 = 60;

/// Errors produced while obtaining auth headers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("no active session")]
    NoSession,

    /// The token endpoint never answered.
    #[error("token endpoint unreachable: {0}")]
    RefreshUnreachable(String),

    /// The token endpoint answered with a non-2xx status.
    #[error("token refresh rejected (HTTP {status}): {message}")]
    RefreshRejected { status: u16, message: String },

    /// The token endpoint answered 2xx with a body we could not use.
    #[error("token refresh failed: {0}")]
    Refresh(String),

    #[error("token contains characters not allowed in a header")]
    InvalidToken,
}

/// Tokens for one outgoing request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthHeaders {
    pub id_token: String,
    pub app_check_token: String,
}

impl AuthHeaders {
    /// Builds the header map sent with a request.
    pub fn to_header_map(&self) -> Result<HeaderMap, AuthError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", self.id_token))
                .map_err(|_| AuthError::InvalidToken)?,
        );
        headers.insert(
            APP_CHECK,
            HeaderValue::from_str(&self.app_check_token).map_err(|_| AuthError::InvalidToken)?,
        );
        Ok(headers)
    }
}

/// Produces headers for one request; may perform network I/O.
pub trait AuthHeaderProvider: Send + Sync {
    fn headers(&self) -> Pin<Box<dyn Future<Output = Result<AuthHeaders, AuthError>> + Send + '_>>;
}

// ---------------------------------------------------------------------------
// Static tokens
// ---------------------------------------------------------------------------

/// Fixed tokens, typically from configuration.
#[derive(Debug, Clone, Default)]
pub struct StaticTokens {
    id_token: Option<String>,
    app_check_token: String,
}

impl StaticTokens {
    pub fn new(id_token: Option<String>, app_check_token: impl Into<String>) -> Self {
        Self {
            id_token: id_token.filter(|t| !t.is_empty()),
            app_check_token: app_check_token.into(),
        }
    }
}

impl AuthHeaderProvider for StaticTokens {
    fn headers(&self) -> Pin<Box<dyn Future<Output = Result<AuthHeaders, AuthError>> + Send + '_>> {
        Box::pin(async move {
            let id_token = self.id_token.clone().ok_or(AuthError::NoSession)?;
            Ok(AuthHeaders {
                id_token,
                app_check_token: self.app_check_token.clone(),
            })
        })
    }
}

// ---------------------------------------------------------------------------
// Refreshing session
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    id_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    /// Lifetime in seconds, sent as a string.
    #[serde(default)]
    expires_in: Option<String>,
}

#[derive(Debug)]
struct SessionState {
    refresh_token: String,
    id_token: Option<String>,
    expires_at: u64,
}

/// Session backed by a refresh token.
///
/// The ID token is cached until shortly before it expires, then exchanged
/// for a new one at the secure-token endpoint. Concurrent callers wait for
/// a single refresh.
pub struct RefreshingSession {
    http: reqwest::Client,
    api_key: String,
    app_check_token: String,
    endpoint: String,
    state: Mutex<SessionState>,
}

impl RefreshingSession {
    pub fn new(
        api_key: impl Into<String>,
        refresh_token: impl Into<String>,
        app_check_token: impl Into<String>,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key: api_key.into(),
            app_check_token: app_check_token.into(),
            endpoint: DEFAULT_TOKEN_ENDPOINT.to_string(),
            state: Mutex::new(SessionState {
                refresh_token: refresh_token.into(),
                id_token: None,
                expires_at: 0,
            }),
        }
    }

    /// Seeds the cache with an ID token that is still valid.
    pub fn with_id_token(mut self, id_token: String) -> Self {
        let state = self.state.get_mut();
        state.expires_at = jwt_expiry(&id_token).unwrap_or(0);
        state.id_token = Some(id_token);
        self
    }

    /// Exchanges refresh tokens at `url` instead of the hosted endpoint,
    /// e.g. a local auth emulator.
    pub fn with_endpoint(mut self, url: impl Into<String>) -> Self {
        self.endpoint = url.into();
        self
    }

    async fn fresh_id_token(&self) -> Result<String, AuthError> {
        let mut state = self.state.lock().await;
        if state.refresh_token.is_empty() {
            return Err(AuthError::NoSession);
        }

        let now = unix_now();
        if let Some(token) = &state.id_token
            && state.expires_at > now + EXPIRY_MARGIN_SECS
        {
            return Ok(token.clone());
        }

        debug!("refreshing ID token");
        let url = format!("{}?key={}", self.endpoint, self.api_key);
        let resp = self
            .http
            .post(&url)
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", state.refresh_token.as_str()),
            ])
            .send()
            .await
            .map_err(|e| AuthError::RefreshUnreachable(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(AuthError::RefreshRejected {
                status: status.as_u16(),
                message,
            });
        }

        let body: RefreshResponse = resp
            .json()
            .await
            .map_err(|e| AuthError::Refresh(e.to_string()))?;

        let lifetime = body
            .expires_in
            .as_deref()
            .and_then(|s| s.trim().parse::<u64>().ok());
        state.expires_at = match lifetime {
            Some(secs) => now + secs,
            None => jwt_expiry(&body.id_token).unwrap_or(now),
        };
        if let Some(rotated) = body.refresh_token.filter(|t| !t.is_empty()) {
            state.refresh_token = rotated;
        }
        state.id_token = Some(body.id_token.clone());
        info!(expires_at = state.expires_at, "ID token refreshed");

        Ok(body.id_token)
    }
}

impl AuthHeaderProvider for RefreshingSession {
    fn headers(&self) -> Pin<Box<dyn Future<Output = Result<AuthHeaders, AuthError>> + Send + '_>> {
        Box::pin(async move {
            let id_token = self.fresh_id_token().await?;
            Ok(AuthHeaders {
                id_token,
                app_check_token: self.app_check_token.clone(),
            })
        })
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Reads the `exp` claim of a JWT without verifying it.
pub fn jwt_expiry(token: &str) -> Option<u64> {
    #[derive(Deserialize)]
    struct Claims {
        exp: u64,
    }

    let payload = token.split('.').nth(1)?;
    let bytes = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')).ok()?;
    serde_json::from_slice::<Claims>(&bytes).ok().map(|c| c.exp)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockResponse, mock_server};

    fn fake_jwt(exp: u64) -> String {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"RS256"}"#);
        let claims = URL_SAFE_NO_PAD.encode(format!(r#"{{"exp":{exp},"sub":"u1"}}"#));
        format!("{header}.{claims}.sig")
    }

    #[test]
    fn header_map_has_both_headers() {
        let headers = AuthHeaders {
            id_token: "abc".into(),
            app_check_token: "att".into(),
        }
        .to_header_map()
        .unwrap();
        assert_eq!(headers.get(AUTHORIZATION).unwrap(), "Bearer abc");
        assert_eq!(headers.get("x-firebase-appcheck").unwrap(), "att");
    }

    #[test]
    fn header_map_rejects_bad_token() {
        let err = AuthHeaders {
            id_token: "line\nbreak".into(),
            app_check_token: String::new(),
        }
        .to_header_map()
        .unwrap_err();
        assert_eq!(err, AuthError::InvalidToken);
    }

    #[test]
    fn jwt_expiry_reads_exp() {
        assert_eq!(jwt_expiry(&fake_jwt(1_900_000_000)), Some(1_900_000_000));
        assert_eq!(jwt_expiry("not-a-jwt"), None);
        assert_eq!(jwt_expiry("a.!!!.c"), None);
    }

    #[tokio::test]
    async fn static_tokens_without_session() {
        let provider = StaticTokens::new(None, "att");
        assert_eq!(provider.headers().await.unwrap_err(), AuthError::NoSession);

        let provider = StaticTokens::new(Some(String::new()), "att");
        assert_eq!(provider.headers().await.unwrap_err(), AuthError::NoSession);
    }

    #[tokio::test]
    async fn static_tokens_with_session() {
        let provider = StaticTokens::new(Some("id".into()), "att");
        let headers = provider.headers().await.unwrap();
        assert_eq!(headers.id_token, "id");
        assert_eq!(headers.app_check_token, "att");
    }

    #[tokio::test]
    async fn refreshing_session_without_refresh_token() {
        let session = RefreshingSession::new("key", "", "att");
        assert_eq!(session.headers().await.unwrap_err(), AuthError::NoSession);
    }

    #[tokio::test]
    async fn refreshing_session_uses_valid_seed_without_network() {
        let seed = fake_jwt(unix_now() + 3600);
        let session = RefreshingSession::new("key", "refresh", "att")
            .with_endpoint("http://127.0.0.1:9")
            .with_id_token(seed.clone());
        assert_eq!(session.headers().await.unwrap().id_token, seed);
    }

    #[tokio::test]
    async fn refreshing_session_refreshes_once_then_caches() {
        let (url, handle) = mock_server(MockResponse::json(
            200,
            r#"{"id_token":"fresh","refresh_token":"rotated","expires_in":"3600"}"#,
        ))
        .await;

        let session = RefreshingSession::new("key", "refresh", "att")
            .with_endpoint(url)
            .with_id_token(fake_jwt(unix_now() + 10));

        // Seed is inside the expiry margin, so this hits the endpoint.
        assert_eq!(session.headers().await.unwrap().id_token, "fresh");
        let request = String::from_utf8_lossy(&handle.await.unwrap()).into_owned();
        assert!(request.starts_with("POST /?key=key"), "{request}");
        assert!(request.contains("grant_type=refresh_token"));
        assert!(request.contains("refresh_token=refresh"));

        // The mock server is gone; a second refresh would fail.
        assert_eq!(session.headers().await.unwrap().id_token, "fresh");
        assert_eq!(session.state.lock().await.refresh_token, "rotated");
    }

    #[tokio::test]
    async fn refreshing_session_reports_rejection() {
        let (url, handle) =
            mock_server(MockResponse::json(400, r#"{"error":{"message":"TOKEN_EXPIRED"}}"#)).await;

        let session = RefreshingSession::new("key", "refresh", "att").with_endpoint(url);
        let err = session.headers().await.unwrap_err();
        assert!(matches!(
            err,
            AuthError::RefreshRejected { status: 400, ref message } if message.contains("TOKEN_EXPIRED")
        ));

        handle.abort();
    }

    #[tokio::test]
    async fn refreshing_session_reports_unreachable_endpoint() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        drop(listener);

        let session = RefreshingSession::new("key", "refresh", "att").with_endpoint(url);
        let err = session.headers().await.unwrap_err();
        assert!(matches!(err, AuthError::RefreshUnreachable(_)), "{err:?}");
    }
}
