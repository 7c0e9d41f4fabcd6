//! Concurrent diff assembly into an immutable changes provider.
//!
//! The assembler walks the commit graph in child-before-parent order and
//! issues two diff requests per commit concurrently: one against the
//! immediate parent and one against the pull request's merge base. All
//! requests are joined before the provider is constructed, so callers only
//! ever observe a complete provider or an error, never a partially populated
//! one.

use std::collections::HashMap;

use async_trait::async_trait;
use futures::future::try_join_all;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::api::error::ApiError;

use super::diff::{FilePatch, parse_unified_diff};
use super::graph::CommitGraph;

/// Source of raw unified diff text for commits and revision ranges.
///
/// Implemented over the REST API by the service layer; mocked in tests.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DiffSource: Send + Sync {
    /// Diff of a single commit against its first parent (the commit's own
    /// changes). Used for root commits that have no in-window parent.
    async fn commit_diff(
        &self,
        oid: &str,
        cancellation: &CancellationToken,
    ) -> Result<String, ApiError>;

    /// Diff between two revisions.
    async fn compare_diff(
        &self,
        base: &str,
        head: &str,
        cancellation: &CancellationToken,
    ) -> Result<String, ApiError>;
}

/// The two patch lists assembled for one commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchSet {
    local: Vec<FilePatch>,
    cumulative: Vec<FilePatch>,
}

impl PatchSet {
    /// Patches of this commit against its immediate parent.
    #[must_use]
    pub fn local(&self) -> &[FilePatch] {
        &self.local
    }

    /// Patches of this commit against the pull request's merge base.
    #[must_use]
    pub fn cumulative(&self) -> &[FilePatch] {
        &self.cumulative
    }
}

/// Immutable map from commit hash to its assembled patch pair.
///
/// Created once per successful assembly run and discarded wholesale when the
/// pull request is refreshed; there is no incremental update.
#[derive(Debug)]
pub struct ChangesProvider {
    merge_base: String,
    graph: CommitGraph,
    patches: HashMap<String, PatchSet>,
}

impl ChangesProvider {
    /// The merge-base hash the cumulative patches were computed against.
    #[must_use]
    pub fn merge_base(&self) -> &str {
        &self.merge_base
    }

    /// The reconstructed commit graph.
    #[must_use]
    pub const fn graph(&self) -> &CommitGraph {
        &self.graph
    }

    /// The patch pair for a commit, when the hash belongs to the graph.
    #[must_use]
    pub fn patches_for(&self, oid: &str) -> Option<&PatchSet> {
        self.patches.get(oid)
    }
}

/// Fetches and parses every commit's diff pair, then publishes the provider.
///
/// Fan-out is one concurrent unit per commit with two concurrent requests
/// inside it; the executor's connection pool provides the implicit bound.
/// Any non-cancellation failure aborts the whole assembly: siblings are
/// cancelled and no provider is produced.
///
/// # Errors
///
/// Propagates the first fetch or parse error, or [`ApiError::Cancelled`]
/// when the token fires before the join completes.
pub async fn assemble(
    graph: CommitGraph,
    merge_base: String,
    source: &dyn DiffSource,
    cancellation: &CancellationToken,
) -> Result<ChangesProvider, ApiError> {
    let order = graph.descending_order();
    debug!(commits = order.len(), merge_base, "assembling change sets");

    let fan_out = cancellation.child_token();
    let graph_ref = &graph;
    let merge_base_ref = merge_base.as_str();
    let tasks = order.iter().map(|oid| {
        let token = fan_out.clone();
        async move {
            let pair = fetch_patch_pair(graph_ref, merge_base_ref, oid, source, &token).await?;
            Ok::<_, ApiError>((oid.clone(), pair))
        }
    });

    let joined = tokio::select! {
        () = cancellation.cancelled() => {
            fan_out.cancel();
            return Err(ApiError::Cancelled);
        }
        result = try_join_all(tasks) => result,
    };
    let pairs = match joined {
        Ok(pairs) => pairs,
        Err(error) => {
            fan_out.cancel();
            return Err(error);
        }
    };

    Ok(ChangesProvider {
        merge_base,
        graph,
        patches: pairs.into_iter().collect(),
    })
}

async fn fetch_patch_pair(
    graph: &CommitGraph,
    merge_base: &str,
    oid: &str,
    source: &dyn DiffSource,
    cancellation: &CancellationToken,
) -> Result<PatchSet, ApiError> {
    let parent = graph.parents_of(oid).first();
    let (local_raw, cumulative_raw) = tokio::try_join!(
        async {
            match parent {
                Some(parent_oid) => source.compare_diff(parent_oid, oid, cancellation).await,
                None => source.commit_diff(oid, cancellation).await,
            }
        },
        source.compare_diff(merge_base, oid, cancellation),
    )?;

    Ok(PatchSet {
        local: parse_unified_diff(&local_raw)?,
        cumulative: parse_unified_diff(&cumulative_raw)?,
    })
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use tokio_util::sync::CancellationToken;

    use super::{DiffSource, MockDiffSource, assemble};
    use crate::api::error::ApiError;
    use crate::pull_request::commit::CommitRecord;
    use crate::pull_request::graph::CommitGraph;

    fn record(oid: &str, parents: &[&str]) -> CommitRecord {
        CommitRecord {
            oid: oid.to_owned(),
            parents: parents.iter().map(|&p| p.to_owned()).collect(),
            author: None,
            committer: None,
            message: None,
        }
    }

    fn linear_graph() -> CommitGraph {
        CommitGraph::from_records(vec![
            record("a", &[]),
            record("b", &["a"]),
            record("c", &["b"]),
        ])
        .expect("graph should build")
    }

    fn diff_for(path: &str) -> String {
        format!(
            "diff --git a/{path} b/{path}\n--- a/{path}\n+++ b/{path}\n@@ -1,1 +1,1 @@\n-x\n+y\n"
        )
    }

    #[tokio::test]
    async fn assembly_produces_a_patch_pair_for_every_commit() {
        let mut source = MockDiffSource::new();
        // Root commit "a" has no in-window parent: its local diff comes from
        // the commit endpoint.
        source
            .expect_commit_diff()
            .withf(|oid, _| oid == "a")
            .times(1)
            .returning(|oid, _| Ok(diff_for(&format!("local/{oid}.txt"))));
        source
            .expect_compare_diff()
            .times(5)
            .returning(|base, head, _| Ok(diff_for(&format!("{base}_{head}.txt"))));

        let provider = assemble(
            linear_graph(),
            "base".to_owned(),
            &source,
            &CancellationToken::new(),
        )
        .await
        .expect("assembly should succeed");

        assert_eq!(provider.merge_base(), "base");
        assert_eq!(provider.graph().len(), 3);
        for oid in ["a", "b", "c"] {
            let pair = provider.patches_for(oid).expect("patch set per commit");
            assert_eq!(pair.local().len(), 1);
            assert_eq!(pair.cumulative().len(), 1);
        }
        let head_pair = provider.patches_for("c").expect("head patch set");
        assert_eq!(
            head_pair.local().first().map(|p| p.path.as_str()),
            Some("b_c.txt")
        );
        assert_eq!(
            head_pair.cumulative().first().map(|p| p.path.as_str()),
            Some("base_c.txt")
        );
        assert!(provider.patches_for("unknown").is_none());
    }

    #[tokio::test]
    async fn one_failed_fetch_fails_the_whole_assembly() {
        let mut source = MockDiffSource::new();
        source
            .expect_commit_diff()
            .returning(|oid, _| Ok(diff_for(&format!("{oid}.txt"))));
        source.expect_compare_diff().returning(|base, head, _| {
            if head == "b" {
                Err(ApiError::RequestFailed {
                    status: 500,
                    message: "diff unavailable".to_owned(),
                })
            } else {
                Ok(diff_for(&format!("{base}_{head}.txt")))
            }
        });

        let error = assemble(
            linear_graph(),
            "base".to_owned(),
            &source,
            &CancellationToken::new(),
        )
        .await
        .expect_err("assembly should fail");
        assert!(matches!(
            error,
            ApiError::RequestFailed { status: 500, .. }
        ));
    }

    #[tokio::test]
    async fn malformed_diff_text_fails_the_whole_assembly() {
        let mut source = MockDiffSource::new();
        source
            .expect_commit_diff()
            .returning(|_, _| Ok("diff --git a/x b/x\n@@ broken\n".to_owned()));
        source
            .expect_compare_diff()
            .returning(|base, head, _| Ok(diff_for(&format!("{base}_{head}.txt"))));

        let error = assemble(
            linear_graph(),
            "base".to_owned(),
            &source,
            &CancellationToken::new(),
        )
        .await
        .expect_err("assembly should fail");
        assert!(matches!(error, ApiError::DiffParse { .. }));
    }

    /// Source whose fetches park until their request token fires, recording
    /// how many were started.
    struct ParkedSource {
        started: AtomicUsize,
    }

    impl ParkedSource {
        async fn park(&self, cancellation: &CancellationToken) -> Result<String, ApiError> {
            self.started.fetch_add(1, Ordering::SeqCst);
            cancellation.cancelled().await;
            Err(ApiError::Cancelled)
        }
    }

    #[async_trait]
    impl DiffSource for ParkedSource {
        async fn commit_diff(
            &self,
            _oid: &str,
            cancellation: &CancellationToken,
        ) -> Result<String, ApiError> {
            self.park(cancellation).await
        }

        async fn compare_diff(
            &self,
            _base: &str,
            _head: &str,
            cancellation: &CancellationToken,
        ) -> Result<String, ApiError> {
            self.park(cancellation).await
        }
    }

    #[tokio::test]
    async fn mid_flight_cancellation_aborts_outstanding_fetches() {
        let source = ParkedSource {
            started: AtomicUsize::new(0),
        };
        let cancellation = CancellationToken::new();

        let assembly = assemble(linear_graph(), "base".to_owned(), &source, &cancellation);
        tokio::pin!(assembly);

        // First poll fans out every fetch; all of them park on their tokens.
        assert!(futures::poll!(assembly.as_mut()).is_pending());
        let in_flight = source.started.load(Ordering::SeqCst);
        assert_eq!(in_flight, 6);

        cancellation.cancel();
        let error = assembly
            .await
            .expect_err("cancelled assembly should fail");
        assert_eq!(error, ApiError::Cancelled);
        // No new fetches were issued after the token fired.
        assert_eq!(source.started.load(Ordering::SeqCst), in_flight);
    }

    #[tokio::test]
    async fn pre_cancelled_assembly_fails_fast() {
        let mut source = MockDiffSource::new();
        source
            .expect_commit_diff()
            .returning(|_, cancellation| {
                if cancellation.is_cancelled() {
                    Err(ApiError::Cancelled)
                } else {
                    Ok(String::new())
                }
            });
        source
            .expect_compare_diff()
            .returning(|_, _, cancellation| {
                if cancellation.is_cancelled() {
                    Err(ApiError::Cancelled)
                } else {
                    Ok(String::new())
                }
            });

        let cancellation = CancellationToken::new();
        cancellation.cancel();
        let error = assemble(linear_graph(), "base".to_owned(), &source, &cancellation)
            .await
            .expect_err("cancelled assembly should fail");
        assert_eq!(error, ApiError::Cancelled);
    }
}
