//! Credential pair storage and the refresh collaborator seams.
//!
//! The credential pair is the only long-lived mutable shared state in the
//! request layer. It is held as an immutable value behind an atomic swap, so
//! concurrent readers never observe a torn pair.

use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;

use super::error::ApiError;

/// An access token with its optional refresh token.
///
/// The pair is immutable; the executor replaces the whole value through
/// [`CredentialStore::swap`] when the refresh protocol runs. Token material is
/// redacted from the `Debug` output and must never be logged.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    access_token: String,
    refresh_token: Option<String>,
}

impl Credentials {
    /// Creates a credential pair.
    ///
    /// A blank refresh token is treated as absent, which disables the
    /// refresh protocol for requests made with this pair.
    #[must_use]
    pub fn new(access_token: &str, refresh_token: Option<&str>) -> Self {
        let refresh = refresh_token
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .map(ToOwned::to_owned);
        Self {
            access_token: access_token.trim().to_owned(),
            refresh_token: refresh,
        }
    }

    /// Borrows the access token.
    #[must_use]
    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    /// Borrows the refresh token when one is available.
    #[must_use]
    pub fn refresh_token(&self) -> Option<&str> {
        self.refresh_token.as_deref()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Shared credential slot with read-copy-on-refresh semantics.
///
/// Readers take a cheap `Arc` snapshot; the refresh protocol builds a new
/// pair and swaps it in atomically, so every caller that starts after a swap
/// observes the refreshed value.
pub struct CredentialStore {
    current: RwLock<Arc<Credentials>>,
}

impl CredentialStore {
    /// Creates a store holding the given pair.
    #[must_use]
    pub fn new(credentials: Credentials) -> Self {
        Self {
            current: RwLock::new(Arc::new(credentials)),
        }
    }

    /// Returns a snapshot of the current pair.
    #[must_use]
    pub fn get(&self) -> Arc<Credentials> {
        let guard = self
            .current
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&guard)
    }

    /// Replaces the stored pair, returning the new snapshot.
    pub fn swap(&self, credentials: Credentials) -> Arc<Credentials> {
        let replacement = Arc::new(credentials);
        let mut guard = self
            .current
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        *guard = Arc::clone(&replacement);
        replacement
    }
}

impl fmt::Debug for CredentialStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialStore").finish_non_exhaustive()
    }
}

/// Collaborator that exchanges a refresh token for a new credential pair.
///
/// Invoked by the executor at most once per logical request when the server
/// reports an expired access token.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CredentialRefresher: Send + Sync {
    /// Exchanges the refresh token for a new pair.
    async fn refresh(&self, refresh_token: &str) -> Result<Credentials, ApiError>;
}

/// Collaborator that persists a refreshed credential pair.
///
/// Called after a successful refresh and before the original request is
/// retried, so concurrent callers observe the refreshed credential.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CredentialSink: Send + Sync {
    /// Persists the refreshed pair.
    async fn persist(&self, credentials: &Credentials) -> Result<(), ApiError>;
}
