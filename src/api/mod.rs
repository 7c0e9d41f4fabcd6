//! Authenticated request execution against a GitHub-style API.
//!
//! This module owns everything between a request value and a typed result:
//! endpoint URL derivation, credential storage and refresh, the request and
//! response abstractions, the executor with its error classification, and the
//! pagination loader. Wire-level specifics of individual resources live in
//! [`crate::pull_request`].

pub mod credentials;
pub mod endpoint;
pub mod error;
pub mod executor;
pub mod graphql;
pub mod pagination;
pub mod request;

pub use credentials::{CredentialRefresher, CredentialSink, CredentialStore, Credentials};
pub use endpoint::ServerEndpoint;
pub use error::ApiError;
pub use executor::RequestExecutor;
pub use pagination::{Page, PageToken};
pub use request::{ApiRequest, ApiResponse};
