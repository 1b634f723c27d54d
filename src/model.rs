// src/model.rs

use chrono::{DateTime, FixedOffset, TimeZone};
use serde::Serialize;
use std::collections::BTreeMap;

/// Full hexadecimal object name of a commit
pub type CommitId = String;

/// Path of a file relative to the top of the working copy
pub type FilePath = String;

/// Identity and time of an author or committer
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Signature {
    pub name: String,
    pub email: String,
    /// Seconds since the UNIX epoch
    pub timestamp: i64,
    /// Offset as git prints it, e.g. `-0600`
    pub tz_offset: String,
}

impl Signature {
    /// The timestamp in the signer's own timezone.
    pub fn datetime(&self) -> Option<DateTime<FixedOffset>> {
        let digits = self.tz_offset.get(1..)?;
        let hours: i32 = digits.get(..2)?.parse().ok()?;
        let minutes: i32 = digits.get(2..)?.parse().ok()?;
        let seconds = hours * 3600 + minutes * 60;
        let offset = match self.tz_offset.as_bytes().first()? {
            b'-' => FixedOffset::west_opt(seconds)?,
            _ => FixedOffset::east_opt(seconds)?,
        };
        offset.timestamp_opt(self.timestamp, 0).single()
    }
}

/// Read-only projection of a commit object
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Commit {
    pub id: CommitId,
    /// Empty for root commits
    pub parents: Vec<CommitId>,
    pub tree: String,
    pub author: Signature,
    pub committer: Signature,
    pub message: String,
}

/// Which side of a diff a patch line belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LineKind {
    Added,
    Removed,
    Context,
    /// The `\ No newline at end of file` marker
    NoNewline,
}

/// A single line inside one hunk of a file's diff
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PatchLine {
    pub content: String,
    pub kind: LineKind,
    /// Line number in the pre-image, absent for added lines
    pub source_line_no: Option<u32>,
    /// Line number in the post-image, absent for removed lines
    pub target_line_no: Option<u32>,
    /// 1-based position of the line in the whole diff output
    pub diff_line_no: usize,
}

impl PatchLine {
    pub fn is_added(&self) -> bool {
        self.kind == LineKind::Added
    }

    pub fn is_removed(&self) -> bool {
        self.kind == LineKind::Removed
    }
}

/// Inclusive range of post-image line numbers, `start <= end`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct LineExtent {
    pub start: u32,
    pub end: u32,
}

impl LineExtent {
    pub fn new(start: u32, end: u32) -> Option<Self> {
        (start <= end).then_some(LineExtent { start, end })
    }

    pub fn single(line: u32) -> Self {
        LineExtent { start: line, end: line }
    }

    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> u32 {
        self.end - self.start + 1
    }

    pub fn contains(&self, line: u32) -> bool {
        self.start <= line && line <= self.end
    }

    pub fn lines(&self) -> std::ops::RangeInclusive<u32> {
        self.start..=self.end
    }

    /// The `-L` argument for `git blame`
    pub fn to_blame_arg(&self) -> String {
        format!("{},{}", self.start, self.end)
    }
}

/// Where a blamed line went after the commit it is attributed to
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Lineage {
    /// Unchanged up to the queried reference
    StillPresent,
    /// Altered or removed by `commit`, which saw it at `path`
    Superseded { commit: CommitId, path: FilePath },
}

impl Lineage {
    pub fn is_present(&self) -> bool {
        matches!(self, Lineage::StillPresent)
    }

    pub fn next_commit(&self) -> Option<&str> {
        match self {
            Lineage::StillPresent => None,
            Lineage::Superseded { commit, .. } => Some(commit),
        }
    }
}

/// Commit-level fields of a blame walk, shared by all lines of that commit
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BlameCommit {
    /// Raw `key value` headers, e.g. `author-time`, `summary`
    pub fields: BTreeMap<String, String>,
    pub filename: Option<FilePath>,
    pub previous: Option<(CommitId, FilePath)>,
    pub boundary: bool,
}

impl BlameCommit {
    fn timestamp(&self, key: &str) -> Option<i64> {
        self.fields.get(key).and_then(|v| v.parse().ok())
    }

    pub fn author_time(&self) -> Option<i64> {
        self.timestamp("author-time")
    }

    pub fn committer_time(&self) -> Option<i64> {
        self.timestamp("committer-time")
    }
}

/// One line of a reverse-blame walk
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BlameRecord {
    /// Last commit in which the line still appears unchanged
    pub commit: CommitId,
    /// Line number in `commit`
    pub original_line_no: u32,
    /// Line number in the commit the walk started from
    pub final_line_no: u32,
    /// Path of the file in `commit`
    pub filename: FilePath,
    pub line: String,
    pub lineage: Lineage,
    pub boundary: bool,
}

/// Parsed reverse-blame output: commit fields plus lines in input order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlameOutput {
    pub commits: BTreeMap<CommitId, BlameCommit>,
    pub lines: Vec<BlameRecord>,
}

/// Author and committer time of a commit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CommitTimestamps {
    pub author: i64,
    pub committer: i64,
}

impl From<&Commit> for CommitTimestamps {
    fn from(commit: &Commit) -> Self {
        CommitTimestamps {
            author: commit.author.timestamp,
            committer: commit.committer.timestamp,
        }
    }
}

/// Survival totals for one targeted commit
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SurvivalSummary {
    pub lines_total: usize,
    pub lines_survived: usize,
    /// Earliest committer time among the commits that altered a line
    pub min_died_timestamp: Option<i64>,
}

impl SurvivalSummary {
    pub fn lines_died(&self) -> usize {
        self.lines_total - self.lines_survived
    }
}

/// Per-line provenance, from the targeted commit to the last place it is found
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LineSurvivalRecord {
    pub sha_filename: FilePath,
    pub sha_line_no: u32,
    pub last_commit: CommitId,
    pub last_filename: FilePath,
    pub last_line_no: u32,
    pub line: String,
    pub next_commit: Option<CommitId>,
    pub next_filename: Option<FilePath>,
}
