//! Commit records and their wire representations.
//!
//! Types prefixed with `Api` are deserialisation targets for the commit
//! listing endpoint; they convert into the public [`CommitRecord`] value.

use chrono::{DateTime, Utc};
use serde::Deserialize;

/// Author or committer identity attached to a commit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GitActor {
    /// Display name.
    pub name: Option<String>,
    /// Email address.
    pub email: Option<String>,
    /// Timestamp of the action.
    pub date: Option<DateTime<Utc>>,
}

/// An immutable commit value produced from a server response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitRecord {
    /// Stable commit hash.
    pub oid: String,
    /// Parent hashes in commit order. May reference commits outside the
    /// fetched window.
    pub parents: Vec<String>,
    /// Author identity.
    pub author: Option<GitActor>,
    /// Committer identity.
    pub committer: Option<GitActor>,
    /// Full commit message.
    pub message: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ApiCommitListItem {
    pub(crate) sha: String,
    #[serde(default)]
    pub(crate) parents: Vec<ApiCommitRef>,
    pub(crate) commit: ApiCommitDetail,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ApiCommitRef {
    pub(crate) sha: String,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ApiCommitDetail {
    pub(crate) message: Option<String>,
    pub(crate) author: Option<ApiGitActor>,
    pub(crate) committer: Option<ApiGitActor>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ApiGitActor {
    pub(crate) name: Option<String>,
    pub(crate) email: Option<String>,
    pub(crate) date: Option<DateTime<Utc>>,
}

impl From<ApiGitActor> for GitActor {
    fn from(actor: ApiGitActor) -> Self {
        Self {
            name: actor.name,
            email: actor.email,
            date: actor.date,
        }
    }
}

impl From<ApiCommitListItem> for CommitRecord {
    fn from(item: ApiCommitListItem) -> Self {
        Self {
            oid: item.sha,
            parents: item.parents.into_iter().map(|parent| parent.sha).collect(),
            author: item.commit.author.map(ApiGitActor::into),
            committer: item.commit.committer.map(ApiGitActor::into),
            message: item.commit.message,
        }
    }
}
