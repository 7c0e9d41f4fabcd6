//! Cached repository metadata: collaborators, labels, and assignees.
//!
//! Each collection is fetched through a cursor-paged GraphQL connection and
//! memoized until explicitly invalidated, so review UI lookups hit the
//! network once per collection rather than once per keystroke.

use std::sync::Arc;

use serde::Deserialize;
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::api::endpoint::ServerEndpoint;
use crate::api::error::ApiError;
use crate::api::executor::RequestExecutor;
use crate::api::graphql::{GraphQlPage, GraphQlQuery};
use crate::api::pagination::{self, PageToken};
use crate::memo::MemoizedValue;

use super::locator::RepositoryLocator;

const COLLABORATORS_QUERY: &str = "\
query($owner: String!, $name: String!, $cursor: String) {
  repository(owner: $owner, name: $name) {
    collaborators(first: 100, after: $cursor) {
      pageInfo { hasNextPage endCursor }
      nodes { login name }
    }
  }
}";

const ASSIGNEES_QUERY: &str = "\
query($owner: String!, $name: String!, $cursor: String) {
  repository(owner: $owner, name: $name) {
    assignableUsers(first: 100, after: $cursor) {
      pageInfo { hasNextPage endCursor }
      nodes { login name }
    }
  }
}";

const LABELS_QUERY: &str = "\
query($owner: String!, $name: String!, $cursor: String) {
  repository(owner: $owner, name: $name) {
    labels(first: 100, after: $cursor) {
      pageInfo { hasNextPage endCursor }
      nodes { name color description }
    }
  }
}";

/// A user account that can review or be assigned.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Collaborator {
    /// Account login.
    pub login: String,
    /// Display name, when set on the profile.
    pub name: Option<String>,
}

/// An issue label defined on the repository.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Label {
    /// Label name.
    pub name: String,
    /// Hex colour without the leading `#`.
    pub color: Option<String>,
    /// Free-form description.
    pub description: Option<String>,
}

#[derive(Deserialize)]
struct CollaboratorsData {
    repository: CollaboratorsRepository,
}

#[derive(Deserialize)]
struct CollaboratorsRepository {
    collaborators: GraphQlPage<Collaborator>,
}

#[derive(Deserialize)]
struct AssigneesData {
    repository: AssigneesRepository,
}

#[derive(Deserialize)]
struct AssigneesRepository {
    #[serde(rename = "assignableUsers")]
    assignable_users: GraphQlPage<Collaborator>,
}

#[derive(Deserialize)]
struct LabelsData {
    repository: LabelsRepository,
}

#[derive(Deserialize)]
struct LabelsRepository {
    labels: GraphQlPage<Label>,
}

/// Lazily-loaded, invalidatable repository metadata.
pub struct RepositoryDataService {
    executor: Arc<RequestExecutor>,
    endpoint: ServerEndpoint,
    repository: RepositoryLocator,
    collaborators: MemoizedValue<Vec<Collaborator>>,
    assignees: MemoizedValue<Vec<Collaborator>>,
    labels: MemoizedValue<Vec<Label>>,
}

impl RepositoryDataService {
    /// Creates the service with all caches empty.
    #[must_use]
    pub const fn new(
        executor: Arc<RequestExecutor>,
        endpoint: ServerEndpoint,
        repository: RepositoryLocator,
    ) -> Self {
        Self {
            executor,
            endpoint,
            repository,
            collaborators: MemoizedValue::new(),
            assignees: MemoizedValue::new(),
            labels: MemoizedValue::new(),
        }
    }

    /// Users with push access, loaded once and then served from cache.
    ///
    /// # Errors
    ///
    /// Propagates request failures and [`ApiError::Cancelled`]; a failed
    /// load leaves the cache empty so the next call retries.
    pub async fn collaborators(
        &self,
        cancellation: &CancellationToken,
    ) -> Result<Arc<Vec<Collaborator>>, ApiError> {
        self.collaborators
            .get_or_load(|| {
                self.load_connection::<CollaboratorsData, Collaborator>(
                    COLLABORATORS_QUERY,
                    "load collaborators",
                    |data| data.repository.collaborators,
                    cancellation,
                )
            })
            .await
    }

    /// Users assignable to issues and pull requests, served from cache.
    ///
    /// # Errors
    ///
    /// Propagates request failures and [`ApiError::Cancelled`].
    pub async fn assignees(
        &self,
        cancellation: &CancellationToken,
    ) -> Result<Arc<Vec<Collaborator>>, ApiError> {
        self.assignees
            .get_or_load(|| {
                self.load_connection::<AssigneesData, Collaborator>(
                    ASSIGNEES_QUERY,
                    "load assignees",
                    |data| data.repository.assignable_users,
                    cancellation,
                )
            })
            .await
    }

    /// Labels defined on the repository, served from cache.
    ///
    /// # Errors
    ///
    /// Propagates request failures and [`ApiError::Cancelled`].
    pub async fn labels(
        &self,
        cancellation: &CancellationToken,
    ) -> Result<Arc<Vec<Label>>, ApiError> {
        self.labels
            .get_or_load(|| {
                self.load_connection::<LabelsData, Label>(
                    LABELS_QUERY,
                    "load labels",
                    |data| data.repository.labels,
                    cancellation,
                )
            })
            .await
    }

    /// Drops the collaborator cache; the next read refetches.
    pub async fn invalidate_collaborators(&self) {
        self.collaborators.invalidate().await;
    }

    /// Drops the assignee cache; the next read refetches.
    pub async fn invalidate_assignees(&self) {
        self.assignees.invalidate().await;
    }

    /// Drops the label cache; the next read refetches.
    pub async fn invalidate_labels(&self) {
        self.labels.invalidate().await;
    }

    /// Drops every cache at once, typically after a push or settings change.
    pub async fn invalidate_all(&self) {
        self.invalidate_collaborators().await;
        self.invalidate_assignees().await;
        self.invalidate_labels().await;
    }

    async fn load_connection<D, N>(
        &self,
        query: &'static str,
        operation: &'static str,
        unwrap: fn(D) -> GraphQlPage<N>,
        cancellation: &CancellationToken,
    ) -> Result<Vec<N>, ApiError>
    where
        D: DeserializeOwned + Send + Sync + 'static,
        N: Send + Sync + 'static,
    {
        let owner = self.repository.owner().as_str();
        let name = self.repository.repository().as_str();
        let items = pagination::load_all(cancellation, None, |token| {
            let cursor = match token {
                Some(PageToken::Cursor(value)) => serde_json::Value::String(value),
                _ => serde_json::Value::Null,
            };
            let graphql = GraphQlQuery::new(
                query,
                serde_json::json!({"owner": owner, "name": name, "cursor": cursor}),
            )
            .with_operation(operation);
            async move {
                let request = graphql.request::<D>(&self.endpoint)?;
                let data = self.executor.execute(&request, cancellation).await?;
                Ok(unwrap(data).into_page())
            }
        })
        .await?;
        debug!(operation, items = items.len(), "repository metadata loaded");
        Ok(items)
    }
}

impl std::fmt::Debug for RepositoryDataService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RepositoryDataService")
            .field("repository", &self.repository)
            .finish_non_exhaustive()
    }
}
