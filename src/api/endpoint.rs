//! Server endpoint description and API URL derivation.
//!
//! A [`ServerEndpoint`] is an immutable value describing where the hosting
//! service lives. It normalises to a human-facing base URL and an API base
//! URL; the public host and self-hosted instances use different API path
//! suffixes.

use url::Url;

use super::error::ApiError;

/// Hostname of the default public instance.
pub const PUBLIC_HOST: &str = "github.com";

/// API host used for the default public instance.
const PUBLIC_API_HOST: &str = "api.github.com";

/// API path suffix appended for self-hosted instances.
const SELF_HOSTED_API_SUFFIX: &str = "api/v3";

/// GraphQL path suffix appended for self-hosted instances.
const SELF_HOSTED_GRAPHQL_SUFFIX: &str = "api/graphql";

/// URL scheme accepted by an endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scheme {
    /// TLS transport. The default; all constructors produce this unless the
    /// insecure escape hatch is used.
    Https,
    /// Plain HTTP. Only available through [`ServerEndpoint::insecure`].
    Http,
}

impl Scheme {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Https => "https",
            Self::Http => "http",
        }
    }
}

/// Location of a hosting service instance.
///
/// Equality is by the four descriptive fields, so two endpoints constructed
/// from the same host, port, scheme, and path suffix compare equal regardless
/// of how they were built.
///
/// # Example
///
/// ```
/// use octoreview::api::endpoint::ServerEndpoint;
///
/// let public = ServerEndpoint::public();
/// assert_eq!(
///     public.api_url().expect("public API URL").as_str(),
///     "https://api.github.com/"
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ServerEndpoint {
    scheme: Scheme,
    host: String,
    port: Option<u16>,
    path: Option<String>,
}

impl ServerEndpoint {
    /// The default public instance.
    #[must_use]
    pub fn public() -> Self {
        Self {
            scheme: Scheme::Https,
            host: PUBLIC_HOST.to_owned(),
            port: None,
            path: None,
        }
    }

    /// A self-hosted instance reached over HTTPS.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::InvalidUrl`] when the host is empty.
    pub fn self_hosted(host: &str) -> Result<Self, ApiError> {
        Self::build(Scheme::Https, host)
    }

    /// A self-hosted instance reached over plain HTTP.
    ///
    /// HTTPS is forced by default; this constructor is the explicit escape
    /// hatch for instances that cannot terminate TLS.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::InvalidUrl`] when the host is empty.
    pub fn insecure(host: &str) -> Result<Self, ApiError> {
        Self::build(Scheme::Http, host)
    }

    fn build(scheme: Scheme, host: &str) -> Result<Self, ApiError> {
        let trimmed = host.trim();
        if trimmed.is_empty() {
            return Err(ApiError::InvalidUrl("host must not be empty".to_owned()));
        }
        Ok(Self {
            scheme,
            host: trimmed.to_owned(),
            port: None,
            path: None,
        })
    }

    /// Returns a copy of this endpoint with an explicit port.
    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Returns a copy of this endpoint with a custom path prefix, as used by
    /// self-hosted instances mounted below a sub-path.
    #[must_use]
    pub fn with_path(mut self, path: &str) -> Self {
        let trimmed = path.trim_matches('/');
        self.path = if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_owned())
        };
        self
    }

    /// Derives an endpoint from a web URL such as a pull request link.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::InvalidUrl`] when the URL has no host.
    pub fn from_web_url(url: &Url) -> Result<Self, ApiError> {
        let host = url
            .host_str()
            .ok_or_else(|| ApiError::InvalidUrl("URL must include a host".to_owned()))?;
        let scheme = if url.scheme().eq_ignore_ascii_case("http") {
            Scheme::Http
        } else {
            Scheme::Https
        };
        let mut endpoint = Self::build(scheme, host)?;
        endpoint.port = url.port();
        Ok(endpoint)
    }

    /// Returns true when this endpoint is the default public instance.
    #[must_use]
    pub fn is_public(&self) -> bool {
        self.host.eq_ignore_ascii_case(PUBLIC_HOST) && self.path.is_none()
    }

    /// Hostname of the instance.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Human-facing base URL, suitable for display and for building links.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::InvalidUrl`] when the host cannot form a URL.
    pub fn base_url(&self) -> Result<Url, ApiError> {
        let mut url = self.authority_url(&self.host)?;
        if let Some(path) = &self.path {
            url.set_path(path);
        }
        Ok(url)
    }

    /// REST API base URL.
    ///
    /// The public host maps to its dedicated API host; self-hosted instances
    /// append the API suffix after any custom path prefix.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::InvalidUrl`] when the host cannot form a URL.
    pub fn api_url(&self) -> Result<Url, ApiError> {
        if self.is_public() {
            return self.authority_url(PUBLIC_API_HOST);
        }
        self.suffixed_url(SELF_HOSTED_API_SUFFIX)
    }

    /// GraphQL endpoint URL.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::InvalidUrl`] when the host cannot form a URL.
    pub fn graphql_url(&self) -> Result<Url, ApiError> {
        if self.is_public() {
            let mut url = self.authority_url(PUBLIC_API_HOST)?;
            url.set_path("graphql");
            return Ok(url);
        }
        self.suffixed_url(SELF_HOSTED_GRAPHQL_SUFFIX)
    }

    fn suffixed_url(&self, suffix: &str) -> Result<Url, ApiError> {
        let mut url = self.authority_url(&self.host)?;
        let path = self.path.as_ref().map_or_else(
            || suffix.to_owned(),
            |prefix| format!("{prefix}/{suffix}"),
        );
        url.set_path(&path);
        Ok(url)
    }

    fn authority_url(&self, host: &str) -> Result<Url, ApiError> {
        // Bracket bare IPv6 hosts so the authority parses.
        let authority = if host.contains(':') {
            format!("[{host}]")
        } else {
            host.to_owned()
        };
        let mut url = Url::parse(&format!("{}://{authority}", self.scheme.as_str()))
            .map_err(|error| ApiError::InvalidUrl(error.to_string()))?;
        url.set_port(self.port)
            .map_err(|()| ApiError::InvalidUrl("invalid port".to_owned()))?;
        Ok(url)
    }
}
