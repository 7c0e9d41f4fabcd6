//! Commit graph reconstruction from a flat commit list.
//!
//! The fetched window is a bounded slice of history, so parent hashes that
//! do not resolve within it are silently dropped. The head commit is the
//! record that is not any other record's parent; when several qualify the
//! builder keeps the last such record scanning from the list's tail, relying
//! on server-returned ordering.

use std::collections::{HashMap, HashSet};

use crate::api::error::ApiError;

use super::commit::CommitRecord;

/// Directed acyclic graph of the commits reachable from a pull request's
/// head commit.
///
/// Nodes are the fetched [`CommitRecord`] values; an edge `(child, parent)`
/// exists iff the parent hash resolves within the fetched set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitGraph {
    nodes: HashMap<String, CommitRecord>,
    edges: HashMap<String, Vec<String>>,
    head: String,
}

impl CommitGraph {
    /// Builds the graph from an unordered commit list.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::GraphConstruction`] when the list is empty or no
    /// commit satisfies the head property.
    pub fn from_records(records: Vec<CommitRecord>) -> Result<Self, ApiError> {
        let fetched: HashSet<String> = records.iter().map(|record| record.oid.clone()).collect();
        // Self-references do not make a commit its own child, so they must
        // not disqualify it from the head scan (they are likewise excluded
        // from the edge set below).
        let referenced: HashSet<&str> = records
            .iter()
            .flat_map(|record| {
                record
                    .parents
                    .iter()
                    .filter(|parent| **parent != record.oid)
                    .map(String::as_str)
            })
            .collect();

        // Tail scan: with several candidate heads, server ordering puts the
        // most recently inserted one last.
        let head = records
            .iter()
            .rev()
            .find(|record| !referenced.contains(record.oid.as_str()))
            .map(|record| record.oid.clone())
            .ok_or_else(|| ApiError::GraphConstruction {
                message: "no commit without in-window children".to_owned(),
            })?;

        let mut index: HashMap<String, CommitRecord> = records
            .into_iter()
            .map(|record| (record.oid.clone(), record))
            .collect();

        let mut nodes = HashMap::new();
        let mut edges = HashMap::new();
        let mut pending = vec![head.clone()];
        while let Some(oid) = pending.pop() {
            let Some(record) = index.remove(&oid) else {
                continue;
            };
            let parents: Vec<String> = record
                .parents
                .iter()
                .filter(|parent| fetched.contains(*parent) && **parent != oid)
                .cloned()
                .collect();
            pending.extend(parents.iter().cloned());
            edges.insert(oid.clone(), parents);
            nodes.insert(oid, record);
        }

        Ok(Self { nodes, edges, head })
    }

    /// Hash of the head commit.
    #[must_use]
    pub fn head(&self) -> &str {
        &self.head
    }

    /// Looks up a commit by hash.
    #[must_use]
    pub fn commit(&self, oid: &str) -> Option<&CommitRecord> {
        self.nodes.get(oid)
    }

    /// In-window parent hashes of a commit, in commit order.
    #[must_use]
    pub fn parents_of(&self, oid: &str) -> &[String] {
        self.edges.get(oid).map_or(&[], Vec::as_slice)
    }

    /// Number of commits reachable from the head.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// True when the graph holds no commits.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Iterates over all commits in the graph, in no particular order.
    pub fn commits(&self) -> impl Iterator<Item = &CommitRecord> {
        self.nodes.values()
    }

    /// Commit hashes ordered so that every commit precedes all of its
    /// in-window ancestors (children before parents), starting at the head.
    ///
    /// This is the ordering the diff assembler fans out over; it is
    /// deterministic for a given graph.
    #[must_use]
    pub fn descending_order(&self) -> Vec<String> {
        // Kahn's algorithm over (child -> parent) edges. A node becomes
        // ready once every in-window child has been emitted.
        let mut remaining_children: HashMap<&str, usize> = self
            .nodes
            .keys()
            .map(|oid| (oid.as_str(), 0))
            .collect();
        for parents in self.edges.values() {
            for parent in parents {
                if let Some(count) = remaining_children.get_mut(parent.as_str()) {
                    *count += 1;
                }
            }
        }

        let mut ready = std::collections::VecDeque::from([self.head.as_str()]);
        let mut order = Vec::with_capacity(self.nodes.len());
        while let Some(oid) = ready.pop_front() {
            order.push(oid.to_owned());
            for parent in self.parents_of(oid) {
                if let Some(count) = remaining_children.get_mut(parent.as_str()) {
                    *count -= 1;
                    if *count == 0 {
                        ready.push_back(parent.as_str());
                    }
                }
            }
        }
        order
    }
}
