//! Client-side integration layer for reviewing pull requests against a
//! GitHub-style hosting service.
//!
//! The crate provides three cooperating pieces:
//!
//! - an authenticated request executor with transparent one-shot credential
//!   refresh and structured error classification ([`api::executor`]),
//! - a pagination loader unifying link-header and cursor-based paging
//!   ([`api::pagination`]),
//! - a pull-request change-set pipeline that reconstructs the commit history
//!   as a DAG, fetches per-commit diffs concurrently, and publishes an
//!   immutable changes provider ([`pull_request`]).
//!
//! UI rendering, credential storage, and working-copy git operations are
//! collaborator concerns; they interact with this crate only through the
//! traits exposed here.

pub mod api;
pub mod memo;
pub mod pull_request;

pub use api::credentials::{CredentialRefresher, CredentialSink, CredentialStore, Credentials};
pub use api::endpoint::ServerEndpoint;
pub use api::error::ApiError;
pub use api::executor::RequestExecutor;
pub use api::request::{ApiRequest, ApiResponse};
pub use pull_request::changes::{ChangesProvider, DiffSource, PatchSet};
pub use pull_request::graph::CommitGraph;
pub use pull_request::locator::PullRequestLocator;
pub use pull_request::service::PullRequestDataService;
