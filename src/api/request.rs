//! Transport primitives: request descriptors and the response abstraction.
//!
//! An [`ApiRequest`] is a pure value describing one API call together with a
//! typed extraction function; executing it never mutates shared state. The
//! request kinds form a closed set so the executor's dispatch is exhaustive.

use std::fmt;

use http::{HeaderMap, Method, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use url::Url;

use super::error::ApiError;

/// Accept header value requesting a raw unified diff body.
pub const DIFF_MEDIA_TYPE: &str = "application/vnd.github.diff";

/// The closed set of request kinds understood by the executor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    /// Plain GET; a 404 is an error.
    Get,
    /// GET where a 404 is a valid "absent" outcome rather than an error.
    OptionalGet,
    /// HEAD request; only status and headers are meaningful.
    Head,
    /// POST with a body.
    Post,
    /// PATCH with a body.
    Patch,
    /// DELETE request.
    Delete,
}

impl RequestKind {
    /// HTTP method for this kind.
    #[must_use]
    pub fn method(self) -> Method {
        match self {
            Self::Get | Self::OptionalGet => Method::GET,
            Self::Head => Method::HEAD,
            Self::Post => Method::POST,
            Self::Patch => Method::PATCH,
            Self::Delete => Method::DELETE,
        }
    }
}

/// Request body together with its content type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestBody {
    /// JSON-encoded body.
    Json(serde_json::Value),
    /// Form-encoded key/value body.
    Form(Vec<(String, String)>),
}

/// A fully received response: status, headers, and the raw body.
///
/// The executor reads the body eagerly so classification can inspect any
/// structured JSON error payload before extraction runs.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: Vec<u8>,
}

impl ApiResponse {
    /// Creates a response value.
    #[must_use]
    pub const fn new(status: StatusCode, headers: HeaderMap, body: Vec<u8>) -> Self {
        Self {
            status,
            headers,
            body,
        }
    }

    /// Response status code.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.status
    }

    /// All response headers.
    #[must_use]
    pub const fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Looks up a header value as a string.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|value| value.to_str().ok())
    }

    /// Raw body bytes.
    #[must_use]
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Body decoded as UTF-8 text.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Deserialization`] when the body is not valid UTF-8.
    pub fn text(&self) -> Result<&str, ApiError> {
        std::str::from_utf8(&self.body).map_err(|error| ApiError::Deserialization {
            message: format!("response body is not UTF-8: {error}"),
        })
    }

    /// Body decoded as JSON into the requested type.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Deserialization`] when decoding fails.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, ApiError> {
        serde_json::from_slice(&self.body).map_err(|error| ApiError::Deserialization {
            message: format!("response body decode failed: {error}"),
        })
    }
}

type ExtractFn<T> = Box<dyn Fn(&ApiResponse) -> Result<T, ApiError> + Send + Sync>;
type AbsentFn<T> = Box<dyn Fn() -> T + Send + Sync>;

/// Immutable description of one API call with a typed extraction function.
///
/// Built through the kind-specific constructors; the builder methods return a
/// modified copy so a descriptor never changes after it is handed to the
/// executor.
pub struct ApiRequest<T> {
    kind: RequestKind,
    url: Url,
    body: Option<RequestBody>,
    accept: Option<String>,
    operation: String,
    extract: ExtractFn<T>,
    absent: Option<AbsentFn<T>>,
}

impl<T> ApiRequest<T> {
    fn new(kind: RequestKind, url: Url, extract: ExtractFn<T>) -> Self {
        let operation = format!("{} {}", kind.method(), url.path());
        Self {
            kind,
            url,
            body: None,
            accept: None,
            operation,
            extract,
            absent: None,
        }
    }

    /// GET returning a JSON body.
    #[must_use]
    pub fn get_json(url: Url) -> Self
    where
        T: DeserializeOwned + 'static,
    {
        Self::new(RequestKind::Get, url, Box::new(ApiResponse::json))
    }

    /// GET with a custom extraction function, for callers that need both
    /// headers and body (pagination link headers, for instance).
    #[must_use]
    pub fn get_with(url: Url, extract: ExtractFn<T>) -> Self {
        Self::new(RequestKind::Get, url, extract)
    }

    /// POST with a JSON body, returning a JSON body.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Deserialization`] when the body fails to encode.
    pub fn post_json<B: Serialize>(url: Url, body: &B) -> Result<Self, ApiError>
    where
        T: DeserializeOwned + 'static,
    {
        let value = serde_json::to_value(body).map_err(|error| ApiError::Deserialization {
            message: format!("request body encode failed: {error}"),
        })?;
        let mut request = Self::new(RequestKind::Post, url, Box::new(ApiResponse::json));
        request.body = Some(RequestBody::Json(value));
        Ok(request)
    }

    /// POST with a form-encoded body, returning a JSON body.
    #[must_use]
    pub fn post_form(url: Url, fields: Vec<(String, String)>) -> Self
    where
        T: DeserializeOwned + 'static,
    {
        let mut request = Self::new(RequestKind::Post, url, Box::new(ApiResponse::json));
        request.body = Some(RequestBody::Form(fields));
        request
    }

    /// PATCH with a JSON body, returning a JSON body.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Deserialization`] when the body fails to encode.
    pub fn patch_json<B: Serialize>(url: Url, body: &B) -> Result<Self, ApiError>
    where
        T: DeserializeOwned + 'static,
    {
        let value = serde_json::to_value(body).map_err(|error| ApiError::Deserialization {
            message: format!("request body encode failed: {error}"),
        })?;
        let mut request = Self::new(RequestKind::Patch, url, Box::new(ApiResponse::json));
        request.body = Some(RequestBody::Json(value));
        Ok(request)
    }

    /// Overrides the Accept header, opting into alternative response media
    /// types such as raw diffs or schema previews.
    #[must_use]
    pub fn with_accept(mut self, media_type: &str) -> Self {
        self.accept = Some(media_type.to_owned());
        self
    }

    /// Sets the human-readable operation name used in error messages.
    #[must_use]
    pub fn with_operation(mut self, operation: &str) -> Self {
        self.operation = operation.to_owned();
        self
    }

    /// Request kind.
    #[must_use]
    pub const fn kind(&self) -> RequestKind {
        self.kind
    }

    /// Target URL.
    #[must_use]
    pub const fn url(&self) -> &Url {
        &self.url
    }

    /// Request body, when the kind carries one.
    #[must_use]
    pub const fn request_body(&self) -> Option<&RequestBody> {
        self.body.as_ref()
    }

    /// Accept header override, when set.
    #[must_use]
    pub fn accept(&self) -> Option<&str> {
        self.accept.as_deref()
    }

    /// Human-readable operation name for error messages.
    #[must_use]
    pub fn operation(&self) -> &str {
        &self.operation
    }

    /// Runs the extraction function against a successful response.
    ///
    /// # Errors
    ///
    /// Propagates the extraction function's error, typically
    /// [`ApiError::Deserialization`].
    pub fn extract(&self, response: &ApiResponse) -> Result<T, ApiError> {
        (self.extract)(response)
    }

    /// Produces the "absent" value for an optional request that received a
    /// 404, or `None` for every other request kind.
    #[must_use]
    pub fn absent_value(&self) -> Option<T> {
        self.absent.as_ref().map(|produce| produce())
    }

    /// Composes a fallible mapping onto the extraction function.
    ///
    /// The descriptor fields are carried over unchanged. An optional
    /// request's absent producer cannot pass through a fallible mapping and
    /// is dropped; compose before wrapping in [`ApiRequest::optional_json`]
    /// semantics, not after.
    #[must_use]
    pub fn map<U, F>(self, f: F) -> ApiRequest<U>
    where
        T: 'static,
        F: Fn(T) -> Result<U, ApiError> + Send + Sync + 'static,
    {
        let extract = self.extract;
        ApiRequest {
            kind: self.kind,
            url: self.url,
            body: self.body,
            accept: self.accept,
            operation: self.operation,
            extract: Box::new(move |response| f(extract(response)?)),
            absent: None,
        }
    }
}

impl ApiRequest<String> {
    /// GET returning the raw body as text, typically with a diff Accept
    /// override.
    #[must_use]
    pub fn get_text(url: Url) -> Self {
        Self::new(
            RequestKind::Get,
            url,
            Box::new(|response| response.text().map(ToOwned::to_owned)),
        )
    }
}

impl ApiRequest<()> {
    /// HEAD request discarding the body.
    #[must_use]
    pub fn head(url: Url) -> Self {
        Self::new(RequestKind::Head, url, Box::new(|_| Ok(())))
    }

    /// DELETE request discarding the body.
    #[must_use]
    pub fn delete(url: Url) -> Self {
        Self::new(RequestKind::Delete, url, Box::new(|_| Ok(())))
    }
}

impl<T> ApiRequest<Option<T>> {
    /// Optional GET returning a JSON body.
    ///
    /// A 404 response yields `Ok(None)` instead of an error; every other
    /// request kind propagates 404 as [`ApiError::RequestFailed`].
    #[must_use]
    pub fn optional_json(url: Url) -> Self
    where
        T: DeserializeOwned + 'static,
    {
        let mut request = Self::new(
            RequestKind::OptionalGet,
            url,
            Box::new(|response| response.json().map(Some)),
        );
        request.absent = Some(Box::new(|| None));
        request
    }
}

impl<T> fmt::Debug for ApiRequest<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiRequest")
            .field("kind", &self.kind)
            .field("url", &self.url.as_str())
            .field("operation", &self.operation)
            .field("accept", &self.accept)
            .finish_non_exhaustive()
    }
}
