// src/cache.rs

use crate::error::GitResult;
use crate::git::GitRepo;
use crate::model::{BlameCommit, CommitId, CommitTimestamps};
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

/// Timestamps of commits already resolved in one repository.
///
/// One cache per repository per batch run. Entries are only ever added;
/// commit timestamps never change for a given object name.
#[derive(Debug, Default)]
pub struct MetadataCache {
    entries: HashMap<CommitId, CommitTimestamps>,
    hits: usize,
    misses: usize,
}

impl MetadataCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, commit: &str) -> Option<CommitTimestamps> {
        self.entries.get(commit).copied()
    }

    pub fn insert(&mut self, commit: impl Into<CommitId>, timestamps: CommitTimestamps) {
        self.entries.entry(commit.into()).or_insert(timestamps);
    }

    /// Remember the commits a blame walk printed full headers for.
    pub fn record_blame_commits(&mut self, commits: &BTreeMap<CommitId, BlameCommit>) {
        for (id, commit) in commits {
            if let (Some(author), Some(committer)) = (commit.author_time(), commit.committer_time()) {
                self.insert(id.as_str(), CommitTimestamps { author, committer });
            }
        }
    }

    /// Cached timestamps of `commit`, asking git on a miss.
    pub fn resolve(&mut self, repo: &GitRepo, commit: &str) -> GitResult<CommitTimestamps> {
        if let Some(found) = self.get(commit) {
            self.hits += 1;
            return Ok(found);
        }
        self.misses += 1;
        debug!(commit, "metadata cache miss");
        let metadata = repo.get_commit_metadata(commit)?;
        let timestamps = CommitTimestamps::from(&metadata);
        self.insert(commit, timestamps);
        Ok(timestamps)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// `(hits, misses)` of [`MetadataCache::resolve`]
    pub fn stats(&self) -> (usize, usize) {
        (self.hits, self.misses)
    }
}
