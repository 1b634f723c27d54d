// src/error.rs

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// The tool ran fine, but what it printed could not be understood.
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("commit header line is missing")]
    MissingCommitHeader,

    #[error("commit {commit} lacks a `{field}` line")]
    MissingCommitField { commit: String, field: &'static str },

    #[error("malformed {field} line: {line:?}")]
    Authorship { field: &'static str, line: String },

    #[error("blame output line {line_no}: {reason}")]
    Blame { line_no: usize, reason: String },

    #[error("diff output line {line_no}: {reason}")]
    Diff { line_no: usize, reason: String },

    #[error("shortlog line without a TAB: {0:?}")]
    Shortlog(String),

    #[error("expected a number, got {0:?}")]
    Number(String),
}

/// Errors from driving the git binary against one working copy.
#[derive(Error, Debug)]
pub enum GitError {
    #[error("failed to open repository at {path:?}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: git2::Error,
    },

    #[error("repository at {0:?} has no working directory (bare repo?)")]
    BareRepository(PathBuf),

    #[error("failed to run `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },

    #[error("`{command}` exited with status {exit_code}: {stderr}")]
    ToolInvocation {
        command: String,
        exit_code: i32,
        stderr: String,
    },

    #[error("`{command}` timed out after {seconds}s")]
    Timeout { command: String, seconds: u64 },

    #[error("could not parse git output: {0}")]
    Parse(#[from] ParseError),
}

impl GitError {
    /// Parse failures are tallied apart from invocation failures.
    pub fn is_parse(&self) -> bool {
        matches!(self, GitError::Parse(_))
    }
}

/// Systemic breakage: the whole batch stops.
#[derive(Error, Debug)]
pub enum FatalError {
    #[error("commit {sha} in {repo} resolves, but its metadata cannot be read: {source}")]
    UnresolvableCommit {
        repo: String,
        sha: String,
        #[source]
        source: GitError,
    },
}

pub type GitResult<T> = Result<T, GitError>;
