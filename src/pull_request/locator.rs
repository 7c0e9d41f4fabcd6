//! Identity wrappers and API route construction for pull requests.

use url::Url;

use crate::api::endpoint::ServerEndpoint;
use crate::api::error::ApiError;

/// Repository owner wrapper to avoid stringly typed parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryOwner(String);

impl RepositoryOwner {
    fn new(value: &str) -> Result<Self, ApiError> {
        if value.is_empty() {
            return Err(ApiError::InvalidUrl(
                "repository owner must not be empty".to_owned(),
            ));
        }
        Ok(Self(value.to_owned()))
    }

    /// Borrow the owner value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Repository name wrapper to prevent parameter mix-ups.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryName(String);

impl RepositoryName {
    fn new(value: &str) -> Result<Self, ApiError> {
        if value.is_empty() {
            return Err(ApiError::InvalidUrl(
                "repository name must not be empty".to_owned(),
            ));
        }
        Ok(Self(value.to_owned()))
    }

    /// Borrow the repository name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Pull request number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PullRequestNumber(u64);

impl PullRequestNumber {
    fn new(value: u64) -> Result<Self, ApiError> {
        if value == 0 {
            return Err(ApiError::InvalidUrl(
                "pull request number must be positive".to_owned(),
            ));
        }
        Ok(Self(value))
    }

    /// Returns the numeric value.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

/// Appends path segments to an endpoint's API base, preserving any suffix.
fn api_route(endpoint: &ServerEndpoint, segments: &[&str]) -> Result<Url, ApiError> {
    let mut url = endpoint.api_url()?;
    {
        let mut path = url
            .path_segments_mut()
            .map_err(|()| ApiError::InvalidUrl("API base cannot carry a path".to_owned()))?;
        path.pop_if_empty();
        for segment in segments {
            path.push(segment);
        }
    }
    Ok(url)
}

/// A repository on a specific server instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryLocator {
    owner: RepositoryOwner,
    repository: RepositoryName,
}

impl RepositoryLocator {
    /// Creates a locator from owner and repository name strings.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::InvalidUrl`] when either value is empty.
    pub fn new(owner: &str, repository: &str) -> Result<Self, ApiError> {
        Ok(Self {
            owner: RepositoryOwner::new(owner)?,
            repository: RepositoryName::new(repository)?,
        })
    }

    /// Repository owner.
    #[must_use]
    pub const fn owner(&self) -> &RepositoryOwner {
        &self.owner
    }

    /// Repository name.
    #[must_use]
    pub const fn repository(&self) -> &RepositoryName {
        &self.repository
    }

    /// Route below `/repos/{owner}/{repo}` on the endpoint's API base.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::InvalidUrl`] when the endpoint cannot form a URL.
    pub fn api_route(
        &self,
        endpoint: &ServerEndpoint,
        tail: &[&str],
    ) -> Result<Url, ApiError> {
        let mut segments = vec!["repos", self.owner.as_str(), self.repository.as_str()];
        segments.extend_from_slice(tail);
        api_route(endpoint, &segments)
    }
}

/// A pull request within a repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequestLocator {
    repository: RepositoryLocator,
    number: PullRequestNumber,
}

impl PullRequestLocator {
    /// Creates a locator from its parts.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::InvalidUrl`] when owner or repository is empty or
    /// the number is zero.
    pub fn new(owner: &str, repository: &str, number: u64) -> Result<Self, ApiError> {
        Ok(Self {
            repository: RepositoryLocator::new(owner, repository)?,
            number: PullRequestNumber::new(number)?,
        })
    }

    /// Parses a web URL in the form
    /// `https://<host>/<owner>/<repo>/pull/<number>`, deriving the endpoint
    /// from the host.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::InvalidUrl`] when the URL does not match that
    /// shape.
    pub fn parse(input: &str) -> Result<(ServerEndpoint, Self), ApiError> {
        let parsed = Url::parse(input).map_err(|error| ApiError::InvalidUrl(error.to_string()))?;
        let endpoint = ServerEndpoint::from_web_url(&parsed)?;

        let mut segments = parsed
            .path_segments()
            .ok_or_else(|| ApiError::InvalidUrl("URL must carry a path".to_owned()))?;
        let owner = segments.next().unwrap_or_default();
        let repository = segments.next().unwrap_or_default();
        let marker = segments.next().unwrap_or_default();
        let number_segment = segments.next().unwrap_or_default();

        if marker != "pull" {
            return Err(ApiError::InvalidUrl(
                "URL must match /owner/repo/pull/<number>".to_owned(),
            ));
        }
        let number = number_segment.parse::<u64>().map_err(|_| {
            ApiError::InvalidUrl("pull request number must be a positive integer".to_owned())
        })?;

        Ok((endpoint, Self::new(owner, repository, number)?))
    }

    /// The repository this pull request belongs to.
    #[must_use]
    pub const fn repository(&self) -> &RepositoryLocator {
        &self.repository
    }

    /// Pull request number.
    #[must_use]
    pub const fn number(&self) -> u64 {
        self.number.get()
    }

    /// URL of the pull request resource.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::InvalidUrl`] when the endpoint cannot form a URL.
    pub fn pull_request_url(&self, endpoint: &ServerEndpoint) -> Result<Url, ApiError> {
        self.repository
            .api_route(endpoint, &["pulls", &self.number.get().to_string()])
    }

    /// URL of the pull request's commit listing, requesting the largest page
    /// size the API allows.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::InvalidUrl`] when the endpoint cannot form a URL.
    pub fn commits_url(&self, endpoint: &ServerEndpoint) -> Result<Url, ApiError> {
        let mut url = self
            .repository
            .api_route(endpoint, &["pulls", &self.number.get().to_string(), "commits"])?;
        url.query_pairs_mut().append_pair("per_page", "100");
        Ok(url)
    }

    /// URL of a single commit resource.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::InvalidUrl`] when the endpoint cannot form a URL.
    pub fn commit_url(&self, endpoint: &ServerEndpoint, oid: &str) -> Result<Url, ApiError> {
        self.repository.api_route(endpoint, &["commits", oid])
    }

    /// URL of the two-dot compare resource between two revisions.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::InvalidUrl`] when the endpoint cannot form a URL.
    pub fn compare_url(
        &self,
        endpoint: &ServerEndpoint,
        base: &str,
        head: &str,
    ) -> Result<Url, ApiError> {
        self.repository
            .api_route(endpoint, &["compare", &format!("{base}...{head}")])
    }
}

#[cfg(test)]
mod tests {
    use super::PullRequestLocator;
    use crate::api::endpoint::ServerEndpoint;
    use crate::api::error::ApiError;

    #[test]
    fn parse_accepts_a_public_pull_request_url() {
        let (endpoint, locator) =
            PullRequestLocator::parse("https://github.com/octo/cat/pull/42").expect("parse");
        assert!(endpoint.is_public());
        assert_eq!(locator.repository().owner().as_str(), "octo");
        assert_eq!(locator.repository().repository().as_str(), "cat");
        assert_eq!(locator.number(), 42);
    }

    #[test]
    fn parse_rejects_non_pull_paths() {
        let error = PullRequestLocator::parse("https://github.com/octo/cat/issues/42")
            .expect_err("issues URL should be rejected");
        assert!(matches!(error, ApiError::InvalidUrl(_)));
    }

    #[test]
    fn parse_rejects_zero_numbers() {
        assert!(PullRequestLocator::parse("https://github.com/octo/cat/pull/0").is_err());
        assert!(PullRequestLocator::parse("https://github.com/octo/cat/pull/x").is_err());
    }

    #[test]
    fn routes_are_built_against_the_api_base() {
        let endpoint = ServerEndpoint::self_hosted("ghe.example.com").expect("endpoint");
        let locator = PullRequestLocator::new("octo", "cat", 7).expect("locator");

        assert_eq!(
            locator.pull_request_url(&endpoint).expect("url").as_str(),
            "https://ghe.example.com/api/v3/repos/octo/cat/pulls/7"
        );
        assert_eq!(
            locator.commits_url(&endpoint).expect("url").as_str(),
            "https://ghe.example.com/api/v3/repos/octo/cat/pulls/7/commits?per_page=100"
        );
        assert_eq!(
            locator
                .compare_url(&endpoint, "abc", "def")
                .expect("url")
                .as_str(),
            "https://ghe.example.com/api/v3/repos/octo/cat/compare/abc...def"
        );
    }
}
