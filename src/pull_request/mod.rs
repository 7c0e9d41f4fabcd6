//! Pull-request change-set reconstruction.
//!
//! The pipeline: the commit list is paged in through the executor, shaped
//! into a DAG by [`graph`], and walked by [`changes`], which fetches each
//! commit's diffs concurrently and publishes an immutable
//! [`changes::ChangesProvider`]. [`service`] is the facade consumed by UI
//! collaborators; [`repository_data`] carries the lazily-cached repository
//! metadata used by review dialogs.

pub mod changes;
pub mod commit;
pub mod diff;
pub mod graph;
pub mod locator;
pub mod repository_data;
pub mod service;

pub use changes::{ChangesProvider, DiffSource, PatchSet};
pub use commit::{CommitRecord, GitActor};
pub use diff::{ChangeKind, DiffHunk, FilePatch};
pub use graph::CommitGraph;
pub use locator::{PullRequestLocator, RepositoryLocator};
pub use repository_data::{Collaborator, Label, RepositoryDataService};
pub use service::{PullRequestDataService, PullRequestInfo};
