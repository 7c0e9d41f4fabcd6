//! Facade for loading pull-request data, consumed by UI collaborators.
//!
//! `load_commits` pages the flat commit list in and shapes it into a graph;
//! `load_changes` runs the full pipeline and returns the assembled
//! [`ChangesProvider`]. Both thread one cancellation token through every
//! request they derive.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

use crate::api::endpoint::ServerEndpoint;
use crate::api::error::ApiError;
use crate::api::executor::RequestExecutor;
use crate::api::pagination::{self, PageToken};
use crate::api::request::{ApiRequest, DIFF_MEDIA_TYPE};

use super::changes::{self, ChangesProvider, DiffSource};
use super::commit::{ApiCommitListItem, CommitRecord};
use super::graph::CommitGraph;
use super::locator::PullRequestLocator;

/// Pull request metadata needed by the change-set pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequestInfo {
    /// Pull request number.
    pub number: u64,
    /// Title, when the server provides one.
    pub title: Option<String>,
    /// Head branch commit hash.
    pub head_oid: String,
    /// Base branch commit hash.
    pub base_oid: String,
}

#[derive(Debug, Clone, Deserialize)]
struct ApiPullRequest {
    number: u64,
    title: Option<String>,
    head: ApiBranchRef,
    base: ApiBranchRef,
}

#[derive(Debug, Clone, Deserialize)]
struct ApiBranchRef {
    sha: String,
}

#[derive(Debug, Clone, Deserialize)]
struct ApiCompare {
    merge_base_commit: ApiCompareCommit,
}

#[derive(Debug, Clone, Deserialize)]
struct ApiCompareCommit {
    sha: String,
}

#[derive(Debug, Clone, Deserialize)]
struct ApiCommitWithFiles {
    #[serde(default)]
    files: Vec<ApiCommitFile>,
}

#[derive(Debug, Clone, Deserialize)]
struct ApiCommitFile {
    filename: String,
}

impl From<ApiPullRequest> for PullRequestInfo {
    fn from(api: ApiPullRequest) -> Self {
        Self {
            number: api.number,
            title: api.title,
            head_oid: api.head.sha,
            base_oid: api.base.sha,
        }
    }
}

/// Loads pull-request commits and change sets through the executor.
pub struct PullRequestDataService {
    executor: Arc<RequestExecutor>,
    endpoint: ServerEndpoint,
    locator: PullRequestLocator,
}

impl PullRequestDataService {
    /// Creates a service for one pull request.
    #[must_use]
    pub const fn new(
        executor: Arc<RequestExecutor>,
        endpoint: ServerEndpoint,
        locator: PullRequestLocator,
    ) -> Self {
        Self {
            executor,
            endpoint,
            locator,
        }
    }

    /// Fetches the pull request's metadata, or `None` when it does not
    /// exist.
    ///
    /// # Errors
    ///
    /// Returns a classified [`ApiError`] for any failure other than a 404.
    pub async fn find_pull_request(
        &self,
        cancellation: &CancellationToken,
    ) -> Result<Option<PullRequestInfo>, ApiError> {
        let url = self.locator.pull_request_url(&self.endpoint)?;
        let request = ApiRequest::<Option<ApiPullRequest>>::optional_json(url)
            .with_operation("load pull request");
        let found = self.executor.execute(&request, cancellation).await?;
        Ok(found.map(ApiPullRequest::into))
    }

    /// Loads the complete commit list and reconstructs the commit graph.
    ///
    /// Pages are fetched strictly sequentially through the link-header
    /// loader; the graph is built only once the list is complete.
    ///
    /// # Errors
    ///
    /// Propagates request failures, [`ApiError::GraphConstruction`] when the
    /// list has no head commit, and [`ApiError::Cancelled`].
    #[instrument(skip(self, cancellation), fields(pr = self.locator.number()))]
    pub async fn load_commits(
        &self,
        cancellation: &CancellationToken,
    ) -> Result<CommitGraph, ApiError> {
        let first_url = self.locator.commits_url(&self.endpoint)?;
        let items = pagination::load_all(cancellation, None, |token| {
            let url = match token {
                Some(PageToken::Link(next)) => next,
                _ => first_url.clone(),
            };
            let request = pagination::linked_page_request::<ApiCommitListItem>(url)
                .with_operation("load pull request commits");
            async move { self.executor.execute(&request, cancellation).await }
        })
        .await?;

        debug!(commits = items.len(), "commit list loaded");
        let records: Vec<CommitRecord> = items.into_iter().map(ApiCommitListItem::into).collect();
        CommitGraph::from_records(records)
    }

    /// Runs the full pipeline and returns the assembled provider.
    ///
    /// The merge base is requested explicitly through the compare endpoint
    /// rather than inferred from the graph.
    ///
    /// # Errors
    ///
    /// Propagates any pipeline failure; no partial provider is ever
    /// returned.
    #[instrument(skip(self, cancellation), fields(pr = self.locator.number()))]
    pub async fn load_changes(
        &self,
        cancellation: &CancellationToken,
    ) -> Result<ChangesProvider, ApiError> {
        let info = self
            .find_pull_request(cancellation)
            .await?
            .ok_or_else(|| ApiError::RequestFailed {
                status: 404,
                message: format!("pull request #{} not found", self.locator.number()),
            })?;
        let graph = self.load_commits(cancellation).await?;
        let merge_base = self
            .merge_base(&info.base_oid, graph.head(), cancellation)
            .await?;

        let source = RestDiffSource {
            executor: Arc::clone(&self.executor),
            endpoint: self.endpoint.clone(),
            locator: self.locator.clone(),
        };
        changes::assemble(graph, merge_base, &source, cancellation).await
    }

    /// Paths reported by the server's file-list endpoint for one commit.
    ///
    /// # Errors
    ///
    /// Propagates request failures and [`ApiError::Cancelled`].
    pub async fn commit_changed_paths(
        &self,
        oid: &str,
        cancellation: &CancellationToken,
    ) -> Result<Vec<String>, ApiError> {
        let url = self.locator.commit_url(&self.endpoint, oid)?;
        let request =
            ApiRequest::<ApiCommitWithFiles>::get_json(url).with_operation("load commit files");
        let commit = self.executor.execute(&request, cancellation).await?;
        Ok(commit.files.into_iter().map(|file| file.filename).collect())
    }

    async fn merge_base(
        &self,
        base: &str,
        head: &str,
        cancellation: &CancellationToken,
    ) -> Result<String, ApiError> {
        let url = self.locator.compare_url(&self.endpoint, base, head)?;
        let request =
            ApiRequest::<ApiCompare>::get_json(url).with_operation("resolve merge base");
        let compared = self.executor.execute(&request, cancellation).await?;
        Ok(compared.merge_base_commit.sha)
    }
}

impl std::fmt::Debug for PullRequestDataService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PullRequestDataService")
            .field("locator", &self.locator)
            .finish_non_exhaustive()
    }
}

/// REST-backed diff source used by the assembler.
struct RestDiffSource {
    executor: Arc<RequestExecutor>,
    endpoint: ServerEndpoint,
    locator: PullRequestLocator,
}

#[async_trait]
impl DiffSource for RestDiffSource {
    async fn commit_diff(
        &self,
        oid: &str,
        cancellation: &CancellationToken,
    ) -> Result<String, ApiError> {
        let url = self.locator.commit_url(&self.endpoint, oid)?;
        let request = ApiRequest::get_text(url)
            .with_accept(DIFF_MEDIA_TYPE)
            .with_operation("load commit diff");
        self.executor.execute(&request, cancellation).await
    }

    async fn compare_diff(
        &self,
        base: &str,
        head: &str,
        cancellation: &CancellationToken,
    ) -> Result<String, ApiError> {
        let url = self.locator.compare_url(&self.endpoint, base, head)?;
        let request = ApiRequest::get_text(url)
            .with_accept(DIFF_MEDIA_TYPE)
            .with_operation("load compare diff");
        self.executor.execute(&request, cancellation).await
    }
}
