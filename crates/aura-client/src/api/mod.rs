//! # API Client
//!
//! Authenticated access to the storefront REST API.
//!
//! ## Request Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Authenticated Request                               │
//! │                                                                         │
//! │  endpoint ──► attach Bearer <access token> ──► transport.send()        │
//! │                                                    │                    │
//! │                       ┌────────────────────────────┤                    │
//! │                       │ 401                        │ other              │
//! │                       ▼                            ▼                    │
//! │        POST /auth/refresh {refreshToken}      status → ClientError     │
//! │                       │                       (or decode the body)     │
//! │          ┌────────────┴────────────┐                                    │
//! │          │ ok                      │ failed / no refresh token          │
//! │          ▼                         ▼                                    │
//! │   store new tokens,         clear tokens, navigate to /login,          │
//! │   retry ONCE                SessionExpired                             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Login, register and the refresh call itself go through the public path and
//! never trigger a refresh.

mod endpoints;

use std::sync::Arc;

use aura_core::{CoreError, ValidationError};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::error::{ClientError, ClientResult};
use crate::tokens::TokenStore;
use crate::transport::{ApiRequest, ApiResponse, HttpTransport};
use crate::ui::Navigator;

/// Storefront API client. Cheap to clone.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<ApiClientInner>,
}

struct ApiClientInner {
    transport: Arc<dyn HttpTransport>,
    tokens: Arc<TokenStore>,
    navigator: Arc<dyn Navigator>,
    login_route: String,
    /// Serializes refresh exchanges so concurrent 401s refresh only once.
    refresh_gate: tokio::sync::Mutex<()>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RefreshResponse {
    #[serde(alias = "token")]
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
}

/// Responses arrive either bare or wrapped in `{"data": ...}`.
#[derive(Deserialize)]
#[serde(untagged)]
enum Envelope<T> {
    Wrapped { data: T },
    Bare(T),
}

impl<T> Envelope<T> {
    fn into_inner(self) -> T {
        match self {
            Envelope::Wrapped { data } => data,
            Envelope::Bare(value) => value,
        }
    }
}

pub(crate) fn decode<T: DeserializeOwned>(body: &str) -> ClientResult<T> {
    let envelope: Envelope<T> = serde_json::from_str(body)?;
    Ok(envelope.into_inner())
}

/// Rejects ids that would change the request path.
pub(crate) fn path_segment(id: &str) -> ClientResult<&str> {
    if id.is_empty() || id.contains(['/', '?', '#', '%']) || id.trim() != id {
        return Err(ClientError::Core(CoreError::Validation(
            ValidationError::InvalidFormat {
                field: "id".to_string(),
                reason: format!("'{}' is not a valid identifier", id),
            },
        )));
    }
    Ok(id)
}

impl ApiClient {
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        tokens: Arc<TokenStore>,
        navigator: Arc<dyn Navigator>,
        login_route: impl Into<String>,
    ) -> Self {
        ApiClient {
            inner: Arc::new(ApiClientInner {
                transport,
                tokens,
                navigator,
                login_route: login_route.into(),
                refresh_gate: tokio::sync::Mutex::new(()),
            }),
        }
    }

    pub fn tokens(&self) -> &Arc<TokenStore> {
        &self.inner.tokens
    }

    // =========================================================================
    // Request execution
    // =========================================================================

    /// Sends an authenticated request, refreshing the session once on 401.
    pub(crate) async fn send(&self, request: ApiRequest) -> ClientResult<ApiResponse> {
        let sent_with = self.inner.tokens.access_token();
        let response = self.dispatch(request.clone(), sent_with.clone()).await?;
        if response.status != 401 {
            return Self::check(response);
        }

        debug!(path = %request.path, "Got 401, refreshing access token");
        if let Err(e) = self.refresh(sent_with.as_ref()).await {
            warn!(error = %e, "Token refresh failed, ending session");
            self.expire_session();
            return Err(ClientError::SessionExpired);
        }

        let response = self
            .dispatch(request, self.inner.tokens.access_token())
            .await?;
        if response.status == 401 {
            warn!("Request still unauthorized after refresh, ending session");
            self.expire_session();
            return Err(ClientError::SessionExpired);
        }
        Self::check(response)
    }

    /// Sends a request that must never trigger the refresh path.
    pub(crate) async fn send_public(&self, request: ApiRequest) -> ClientResult<ApiResponse> {
        let path = request.path.clone();
        let response = self.inner.transport.send(request).await?;
        debug!(%path, status = response.status, "Public request finished");
        Self::check(response)
    }

    pub(crate) async fn fetch<T: DeserializeOwned>(&self, request: ApiRequest) -> ClientResult<T> {
        let response = self.send(request).await?;
        decode(&response.body)
    }

    async fn dispatch(
        &self,
        mut request: ApiRequest,
        token: Option<SecretString>,
    ) -> ClientResult<ApiResponse> {
        request.bearer = token;
        let method = request.method.as_str();
        let path = request.path.clone();
        let response = self.inner.transport.send(request).await?;
        debug!(method, %path, status = response.status, "Request finished");
        Ok(response)
    }

    fn check(response: ApiResponse) -> ClientResult<ApiResponse> {
        if response.is_success() {
            return Ok(response);
        }
        let message = response.server_message();
        Err(ClientError::from_status(response.status, message))
    }

    /// Exchanges the refresh token for a new access token.
    ///
    /// `stale` is the token the failed request carried. If the stored token
    /// changed while waiting for the gate, another request already refreshed.
    async fn refresh(&self, stale: Option<&SecretString>) -> ClientResult<()> {
        let _gate = self.inner.refresh_gate.lock().await;

        let current = self.inner.tokens.access_token();
        let already_refreshed = match (stale, &current) {
            (None, Some(_)) => true,
            (Some(stale), Some(current)) => stale.expose_secret() != current.expose_secret(),
            _ => false,
        };
        if already_refreshed {
            debug!("Access token already refreshed by another request");
            return Ok(());
        }

        let refresh_token = self
            .inner
            .tokens
            .refresh_token()
            .ok_or(ClientError::SessionExpired)?;

        let request = ApiRequest::post(
            "/auth/refresh",
            serde_json::json!({ "refreshToken": refresh_token.expose_secret() }),
        );
        let response = self.send_public(request).await?;
        let refreshed: RefreshResponse = decode(&response.body)?;

        self.inner.tokens.update(
            SecretString::from(refreshed.access_token),
            refreshed.refresh_token.map(SecretString::from),
        );
        info!("Access token refreshed");
        Ok(())
    }

    /// Irrecoverable auth failure: forget tokens and send the user to login.
    fn expire_session(&self) {
        self.inner.tokens.clear();
        self.inner.navigator.navigate(&self.inner.login_route);
    }
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("tokens", &self.inner.tokens)
            .field("login_route", &self.inner.login_route)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{keys, KeyValueStore, MemoryStore, Persister};
    use crate::testing::{RecordingNavigator, ScriptedTransport};
    use crate::transport::Method;
    use aura_core::Product;

    struct Harness {
        client: ApiClient,
        transport: Arc<ScriptedTransport>,
        navigator: Arc<RecordingNavigator>,
        store: Arc<MemoryStore>,
    }

    fn harness(signed_in: bool) -> Harness {
        let store = Arc::new(MemoryStore::new());
        let tokens = Arc::new(TokenStore::load(Persister::new(store.clone())));
        if signed_in {
            tokens.set(
                SecretString::from("old-access".to_string()),
                Some(SecretString::from("refresh-1".to_string())),
            );
        }
        let transport = Arc::new(ScriptedTransport::new());
        let navigator = Arc::new(RecordingNavigator::default());
        let client = ApiClient::new(transport.clone(), tokens, navigator.clone(), "/login");
        Harness {
            client,
            transport,
            navigator,
            store,
        }
    }

    #[tokio::test]
    async fn test_bearer_token_attached() {
        let h = harness(true);
        h.transport.push(200, "[]");

        let products: Vec<Product> = h.client.fetch(ApiRequest::get("/products")).await.unwrap();
        assert!(products.is_empty());

        let sent = h.transport.requests();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].bearer.as_deref(), Some("old-access"));
    }

    #[tokio::test]
    async fn test_401_refreshes_once_and_retries() {
        let h = harness(true);
        h.transport.push(401, r#"{"message":"jwt expired"}"#);
        h.transport.push(200, r#"{"accessToken":"new-access"}"#);
        h.transport.push(200, r#"{"data":{"id":"u1","name":"Ada","email":"ada@example.com"}}"#);

        let user: aura_core::User = h.client.fetch(ApiRequest::get("/auth/me")).await.unwrap();
        assert_eq!(user.id, "u1");

        let sent = h.transport.requests();
        assert_eq!(sent.len(), 3);
        assert_eq!(sent[1].method, Method::Post);
        assert_eq!(sent[1].path, "/auth/refresh");
        assert_eq!(sent[1].bearer, None);
        assert_eq!(sent[1].body.as_ref().unwrap()["refreshToken"], "refresh-1");
        assert_eq!(sent[2].bearer.as_deref(), Some("new-access"));

        // refresh response had no refresh token, so the old one stays
        assert_eq!(
            h.client.tokens().refresh_token().unwrap().expose_secret(),
            "refresh-1"
        );
        assert!(h.navigator.routes().is_empty());
    }

    #[tokio::test]
    async fn test_failed_refresh_clears_tokens_and_redirects() {
        let h = harness(true);
        h.transport.push(401, "");
        h.transport.push(401, r#"{"message":"refresh token revoked"}"#);

        let err = h
            .client
            .fetch::<Vec<Product>>(ApiRequest::get("/orders/my-orders"))
            .await
            .unwrap_err();

        assert!(matches!(err, ClientError::SessionExpired));
        assert_eq!(h.transport.requests().len(), 2);
        assert!(!h.client.tokens().is_signed_in());
        assert!(h.store.get(keys::ACCESS_TOKEN).unwrap().is_none());
        assert!(h.store.get(keys::REFRESH_TOKEN).unwrap().is_none());
        assert_eq!(h.navigator.routes(), vec!["/login".to_string()]);
    }

    #[tokio::test]
    async fn test_401_without_refresh_token_expires_session() {
        let h = harness(false);
        h.transport.push(401, "");

        let err = h.client.send(ApiRequest::get("/auth/me")).await.unwrap_err();
        assert!(matches!(err, ClientError::SessionExpired));
        assert_eq!(h.transport.requests().len(), 1);
        assert_eq!(h.navigator.routes(), vec!["/login".to_string()]);
    }

    #[tokio::test]
    async fn test_second_401_is_not_retried_again() {
        let h = harness(true);
        h.transport.push(401, "");
        h.transport.push(200, r#"{"accessToken":"new-access","refreshToken":"refresh-2"}"#);
        h.transport.push(401, "");

        let err = h.client.send(ApiRequest::get("/auth/me")).await.unwrap_err();
        assert!(matches!(err, ClientError::SessionExpired));
        assert_eq!(h.transport.requests().len(), 3);
    }

    /// Answers `old-access` with 401 only after two callers have arrived,
    /// so both fail before either refreshes. Refresh hands out `new-access`.
    struct RotatingTransport {
        rejected: tokio::sync::Barrier,
        paths: std::sync::Mutex<Vec<String>>,
    }

    #[async_trait::async_trait]
    impl HttpTransport for RotatingTransport {
        async fn send(&self, request: ApiRequest) -> ClientResult<ApiResponse> {
            self.paths.lock().unwrap().push(request.path.clone());
            if request.path == "/auth/refresh" {
                return Ok(ApiResponse::new(200, r#"{"accessToken":"new-access"}"#));
            }
            let fresh = request
                .bearer
                .as_ref()
                .is_some_and(|t| t.expose_secret() == "new-access");
            if fresh {
                return Ok(ApiResponse::new(200, "[]"));
            }
            self.rejected.wait().await;
            Ok(ApiResponse::new(401, ""))
        }
    }

    #[tokio::test]
    async fn test_concurrent_401s_refresh_once() {
        let h = harness(true);
        let transport = Arc::new(RotatingTransport {
            rejected: tokio::sync::Barrier::new(2),
            paths: std::sync::Mutex::new(Vec::new()),
        });
        let client = ApiClient::new(
            transport.clone(),
            h.client.tokens().clone(),
            h.navigator.clone(),
            "/login",
        );

        let (first, second) = tokio::join!(
            client.send(ApiRequest::get("/products")),
            client.send(ApiRequest::get("/notifications")),
        );
        assert_eq!(first.unwrap().status, 200);
        assert_eq!(second.unwrap().status, 200);

        let paths = transport.paths.lock().unwrap().clone();
        assert_eq!(paths.iter().filter(|p| *p == "/auth/refresh").count(), 1);
        assert_eq!(paths.len(), 5);
        assert_eq!(
            client.tokens().access_token().unwrap().expose_secret(),
            "new-access"
        );
        assert!(h.navigator.routes().is_empty());
    }

    #[tokio::test]
    async fn test_public_401_is_an_ordinary_error() {
        let h = harness(false);
        h.transport.push(401, r#"{"message":"Invalid email or password"}"#);

        let err = h
            .client
            .send_public(ApiRequest::post("/auth/login", serde_json::json!({})))
            .await
            .unwrap_err();
        assert_eq!(err.user_message(), "Invalid email or password");
        assert_eq!(h.transport.requests().len(), 1);
        assert!(h.navigator.routes().is_empty());
    }

    #[tokio::test]
    async fn test_status_errors_are_not_retried() {
        let h = harness(true);
        h.transport.push(429, "");
        h.transport.push(503, "");
        h.transport.fail_next("connection refused");

        let err = h.client.send(ApiRequest::get("/products")).await.unwrap_err();
        assert!(matches!(err, ClientError::RateLimited));
        let err = h.client.send(ApiRequest::get("/products")).await.unwrap_err();
        assert!(matches!(err, ClientError::Server { status: 503 }));
        let err = h.client.send(ApiRequest::get("/products")).await.unwrap_err();
        assert!(matches!(err, ClientError::Network(_)));
        assert_eq!(h.transport.requests().len(), 3);
    }

    #[test]
    fn test_decode_bare_or_wrapped() {
        let bare: Vec<String> = decode(r#"["a"]"#).unwrap();
        let wrapped: Vec<String> = decode(r#"{"data":["a"],"count":1}"#).unwrap();
        assert_eq!(bare, wrapped);
        assert!(decode::<Vec<String>>("<html>").is_err());
    }

    #[test]
    fn test_path_segment_rejects_traversal() {
        assert_eq!(path_segment("65f1c0ab").unwrap(), "65f1c0ab");
        assert!(path_segment("../admin").is_err());
        assert!(path_segment("a?b=c").is_err());
        assert!(path_segment("").is_err());
    }
}
