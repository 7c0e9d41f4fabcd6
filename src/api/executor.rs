//! Authenticated request execution with one-shot credential refresh.
//!
//! The executor injects the stored access token, classifies failure
//! responses into the error taxonomy, and recovers from an expired access
//! token by invoking the refresh collaborator at most once per logical call:
//! swap the stored pair, persist it, then retry the original request. A
//! cancelled call never triggers the refresh protocol.

use std::sync::Arc;

use http::StatusCode;
use reqwest::header::{ACCEPT, AUTHORIZATION, USER_AGENT};
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::credentials::{CredentialRefresher, CredentialSink, CredentialStore, Credentials};
use super::error::ApiError;
use super::request::{ApiRequest, ApiResponse, RequestBody};

const USER_AGENT_VALUE: &str = concat!("octoreview/", env!("CARGO_PKG_VERSION"));

/// Executes [`ApiRequest`] values with credential injection and structured
/// error classification.
///
/// Cloning is cheap; clones share the HTTP connection pool and the
/// credential store.
#[derive(Clone)]
pub struct RequestExecutor {
    http: reqwest::Client,
    credentials: Arc<CredentialStore>,
    refresher: Option<Arc<dyn CredentialRefresher>>,
    sink: Option<Arc<dyn CredentialSink>>,
}

impl RequestExecutor {
    /// Creates an executor over the given credential store.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Network`] when the HTTP client cannot be built.
    pub fn new(credentials: Arc<CredentialStore>) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(|error| ApiError::Network {
                message: format!("HTTP client construction failed: {error}"),
            })?;
        Ok(Self {
            http,
            credentials,
            refresher: None,
            sink: None,
        })
    }

    /// Attaches the refresh collaborator and the sink that persists
    /// refreshed pairs.
    #[must_use]
    pub fn with_refresher(
        mut self,
        refresher: Arc<dyn CredentialRefresher>,
        sink: Arc<dyn CredentialSink>,
    ) -> Self {
        self.refresher = Some(refresher);
        self.sink = Some(sink);
        self
    }

    /// Snapshot of the credential store backing this executor.
    #[must_use]
    pub fn credentials(&self) -> Arc<Credentials> {
        self.credentials.get()
    }

    /// Executes a request, returning its extracted value.
    ///
    /// # Errors
    ///
    /// Returns a classified [`ApiError`]; see the module documentation for
    /// the refresh and cancellation rules.
    pub async fn execute<T>(
        &self,
        request: &ApiRequest<T>,
        cancellation: &CancellationToken,
    ) -> Result<T, ApiError> {
        let mut refresh_attempted = false;
        loop {
            if cancellation.is_cancelled() {
                return Err(ApiError::Cancelled);
            }
            let snapshot = self.credentials.get();
            let response = self.send(request, &snapshot, cancellation).await?;
            let status = response.status();

            if status == StatusCode::NOT_FOUND
                && let Some(absent) = request.absent_value()
            {
                debug!(operation = request.operation(), "optional resource absent");
                return Ok(absent);
            }

            if status.is_success() {
                return request.extract(&response);
            }

            let error = classify_failure(request.operation(), status, response.body());
            let expired = matches!(error, ApiError::CredentialExpired { .. });
            if expired && !refresh_attempted && !cancellation.is_cancelled() {
                refresh_attempted = true;
                if self.refresh_credentials(&snapshot).await {
                    debug!(operation = request.operation(), "retrying with refreshed token");
                    continue;
                }
            }
            return Err(error);
        }
    }

    /// Runs the refresh protocol once. Returns true when the stored pair was
    /// replaced and persisted, false when the original error should surface.
    async fn refresh_credentials(&self, snapshot: &Credentials) -> bool {
        let (Some(refresher), Some(sink)) = (&self.refresher, &self.sink) else {
            return false;
        };
        let Some(refresh_token) = snapshot.refresh_token() else {
            return false;
        };

        let refreshed = match refresher.refresh(refresh_token).await {
            Ok(credentials) => credentials,
            Err(error) => {
                warn!(%error, "credential refresh failed");
                return false;
            }
        };

        // Swap before persisting so concurrent callers pick up the new pair
        // immediately; the retried request only goes out once both steps
        // completed.
        let stored = self.credentials.swap(refreshed);
        if let Err(error) = sink.persist(&stored).await {
            warn!(%error, "refreshed credential persistence failed");
            return false;
        }
        true
    }

    async fn send<T>(
        &self,
        request: &ApiRequest<T>,
        snapshot: &Credentials,
        cancellation: &CancellationToken,
    ) -> Result<ApiResponse, ApiError> {
        let operation = request.operation();
        let mut builder = self
            .http
            .request(request.kind().method(), request.url().clone())
            .header(AUTHORIZATION, format!("token {}", snapshot.access_token()))
            .header(USER_AGENT, USER_AGENT_VALUE);
        if let Some(accept) = request.accept() {
            builder = builder.header(ACCEPT, accept);
        }
        builder = match request.request_body() {
            Some(RequestBody::Json(value)) => builder.json(value),
            Some(RequestBody::Form(fields)) => builder.form(fields),
            None => builder,
        };

        debug!(operation, kind = ?request.kind(), "sending request");
        let response = tokio::select! {
            () = cancellation.cancelled() => return Err(ApiError::Cancelled),
            result = builder.send() => result.map_err(|error| ApiError::Network {
                message: format!("{operation} failed: {error}"),
            })?,
        };

        let status = response.status();
        let headers = response.headers().clone();
        let body = tokio::select! {
            () = cancellation.cancelled() => return Err(ApiError::Cancelled),
            result = response.bytes() => result
                .map_err(|error| ApiError::Network {
                    message: format!("{operation} body read failed: {error}"),
                })?
                .to_vec(),
        };
        debug!(operation, status = status.as_u16(), "response received");
        Ok(ApiResponse::new(status, headers, body))
    }
}

impl std::fmt::Debug for RequestExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestExecutor")
            .field("refresher", &self.refresher.is_some())
            .finish_non_exhaustive()
    }
}

/// Structured JSON error body returned by the service.
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    message: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

fn classify_failure(operation: &str, status: StatusCode, body: &[u8]) -> ApiError {
    let parsed: ErrorBody = serde_json::from_slice(body).unwrap_or_default();
    let message = parsed
        .message
        .or(parsed.error_description)
        .unwrap_or_else(|| String::from_utf8_lossy(body).trim().to_owned());

    if is_auth_status(status) {
        let lowered = message.to_lowercase();
        if lowered.contains("rate limit") {
            return ApiError::RateLimitExceeded {
                message: format!("{operation} failed: {message}"),
            };
        }
        if lowered.contains("token is expired") {
            return ApiError::CredentialExpired {
                message: format!("{operation} failed: {message}"),
            };
        }
        if parsed.error.as_deref() == Some("invalid_grant") {
            return ApiError::Authentication {
                message: format!("{operation} failed: refresh grant rejected: {message}"),
            };
        }
        return ApiError::Authentication {
            message: format!("{operation} failed: {status} {message}"),
        };
    }

    ApiError::RequestFailed {
        status: status.as_u16(),
        message: format!("{operation} failed: {message}"),
    }
}

const fn is_auth_status(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::UNAUTHORIZED | StatusCode::PAYMENT_REQUIRED | StatusCode::FORBIDDEN
    )
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde::Deserialize;
    use tokio_util::sync::CancellationToken;
    use url::Url;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::RequestExecutor;
    use crate::api::credentials::{
        CredentialStore, Credentials, MockCredentialRefresher, MockCredentialSink,
    };
    use crate::api::error::ApiError;
    use crate::api::request::ApiRequest;

    #[derive(Debug, Deserialize, PartialEq, Eq)]
    struct Widget {
        name: String,
    }

    fn executor_with(store: Arc<CredentialStore>) -> RequestExecutor {
        RequestExecutor::new(store).expect("executor should build")
    }

    fn widget_url(server: &MockServer) -> Url {
        Url::parse(&format!("{}/widget", server.uri())).expect("url")
    }

    #[tokio::test]
    async fn successful_request_extracts_the_typed_value() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/widget"))
            .and(header("Authorization", "token access-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "name": "gear"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let store = Arc::new(CredentialStore::new(Credentials::new("access-1", None)));
        let executor = executor_with(store);
        let request = ApiRequest::<Widget>::get_json(widget_url(&server));

        let widget = executor
            .execute(&request, &CancellationToken::new())
            .await
            .expect("request should succeed");
        assert_eq!(widget.name, "gear");
    }

    #[tokio::test]
    async fn not_found_on_optional_request_yields_none() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/widget"))
            .respond_with(ResponseTemplate::new(404).set_body_json(serde_json::json!({
                "message": "Not Found"
            })))
            .mount(&server)
            .await;

        let store = Arc::new(CredentialStore::new(Credentials::new("access-1", None)));
        let executor = executor_with(store);
        let request = ApiRequest::<Option<Widget>>::optional_json(widget_url(&server));

        let result = executor
            .execute(&request, &CancellationToken::new())
            .await
            .expect("optional request should succeed");
        assert_eq!(result, None);
    }

    #[tokio::test]
    async fn not_found_on_plain_request_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/widget"))
            .respond_with(ResponseTemplate::new(404).set_body_json(serde_json::json!({
                "message": "Not Found"
            })))
            .mount(&server)
            .await;

        let store = Arc::new(CredentialStore::new(Credentials::new("access-1", None)));
        let executor = executor_with(store);
        let request = ApiRequest::<Widget>::get_json(widget_url(&server));

        let error = executor
            .execute(&request, &CancellationToken::new())
            .await
            .expect_err("plain 404 should fail");
        assert!(matches!(
            error,
            ApiError::RequestFailed { status: 404, .. }
        ));
    }

    #[tokio::test]
    async fn forbidden_rate_limit_body_classifies_as_rate_limit() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/widget"))
            .respond_with(ResponseTemplate::new(403).set_body_json(serde_json::json!({
                "message": "API rate limit exceeded"
            })))
            .mount(&server)
            .await;

        let store = Arc::new(CredentialStore::new(Credentials::new("access-1", None)));
        let executor = executor_with(store);
        let request = ApiRequest::<Widget>::get_json(widget_url(&server));

        let error = executor
            .execute(&request, &CancellationToken::new())
            .await
            .expect_err("rate limited request should fail");
        assert!(
            matches!(error, ApiError::RateLimitExceeded { .. }),
            "expected RateLimitExceeded, got {error:?}"
        );
    }

    #[tokio::test]
    async fn invalid_grant_body_classifies_as_authentication_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/widget"))
            .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
                "error": "invalid_grant",
                "error_description": "refresh token revoked"
            })))
            .mount(&server)
            .await;

        let store = Arc::new(CredentialStore::new(Credentials::new("access-1", None)));
        let executor = executor_with(store);
        let request = ApiRequest::<Widget>::get_json(widget_url(&server));

        let error = executor
            .execute(&request, &CancellationToken::new())
            .await
            .expect_err("revoked grant should fail");
        assert!(matches!(error, ApiError::Authentication { .. }));
    }

    #[tokio::test]
    async fn expired_token_refreshes_once_and_retries() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/widget"))
            .and(header("Authorization", "token stale"))
            .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
                "message": "This token is expired"
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/widget"))
            .and(header("Authorization", "token fresh"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "name": "gear"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let mut refresher = MockCredentialRefresher::new();
        refresher
            .expect_refresh()
            .withf(|token| token == "refresh-1")
            .times(1)
            .returning(|_| Ok(Credentials::new("fresh", Some("refresh-2"))));
        let mut sink = MockCredentialSink::new();
        sink.expect_persist().times(1).returning(|_| Ok(()));

        let store = Arc::new(CredentialStore::new(Credentials::new(
            "stale",
            Some("refresh-1"),
        )));
        let executor = executor_with(Arc::clone(&store))
            .with_refresher(Arc::new(refresher), Arc::new(sink));
        let request = ApiRequest::<Widget>::get_json(widget_url(&server));

        let widget = executor
            .execute(&request, &CancellationToken::new())
            .await
            .expect("retried request should succeed");
        assert_eq!(widget.name, "gear");

        let stored = store.get();
        assert_eq!(stored.access_token(), "fresh");
        assert_eq!(stored.refresh_token(), Some("refresh-2"));
    }

    #[tokio::test]
    async fn expired_token_without_refresh_token_surfaces_the_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/widget"))
            .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
                "message": "This token is expired"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let mut refresher = MockCredentialRefresher::new();
        refresher.expect_refresh().times(0);
        let mut sink = MockCredentialSink::new();
        sink.expect_persist().times(0);

        let store = Arc::new(CredentialStore::new(Credentials::new("stale", None)));
        let executor = executor_with(store)
            .with_refresher(Arc::new(refresher), Arc::new(sink));
        let request = ApiRequest::<Widget>::get_json(widget_url(&server));

        let error = executor
            .execute(&request, &CancellationToken::new())
            .await
            .expect_err("expiry without refresh token should fail");
        assert!(matches!(error, ApiError::CredentialExpired { .. }));
    }

    #[tokio::test]
    async fn failed_refresh_surfaces_the_original_error_without_second_attempt() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/widget"))
            .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
                "message": "This token is expired"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let mut refresher = MockCredentialRefresher::new();
        refresher.expect_refresh().times(1).returning(|_| {
            Err(ApiError::Authentication {
                message: "refresh grant rejected".to_owned(),
            })
        });
        let mut sink = MockCredentialSink::new();
        sink.expect_persist().times(0);

        let store = Arc::new(CredentialStore::new(Credentials::new(
            "stale",
            Some("refresh-1"),
        )));
        let executor = executor_with(store)
            .with_refresher(Arc::new(refresher), Arc::new(sink));
        let request = ApiRequest::<Widget>::get_json(widget_url(&server));

        let error = executor
            .execute(&request, &CancellationToken::new())
            .await
            .expect_err("failed refresh should surface the original error");
        assert!(matches!(error, ApiError::CredentialExpired { .. }));
    }

    #[tokio::test]
    async fn cancelled_call_never_reaches_the_server() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/widget"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let store = Arc::new(CredentialStore::new(Credentials::new("access-1", None)));
        let executor = executor_with(store);
        let request = ApiRequest::<Widget>::get_json(widget_url(&server));

        let cancellation = CancellationToken::new();
        cancellation.cancel();
        let error = executor
            .execute(&request, &cancellation)
            .await
            .expect_err("cancelled call should fail");
        assert_eq!(error, ApiError::Cancelled);
    }
}
