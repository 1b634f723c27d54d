// src/git/mod.rs

//! Line provenance queries answered by the `git` binary.
//!
//! Every query goes through an [`Oracle`], which runs git against the
//! working copy and hands back raw output. The submodules turn that output
//! into the types in [`crate::model`]:
//!
//! - `commit`: `rev-list --header` metadata and commit counting
//! - `refs`: object name resolution and reachability
//! - `diff`: unified diffs, changed-line extents and file lists
//! - `blame`: `blame --reverse --porcelain` walks
//! - `authors`: `shortlog` contribution counts

mod authors;
mod blame;
mod commit;
mod diff;
mod process;
mod refs;

pub use authors::{parse_shortlog_count, select_core_authors, AuthorStat};
pub use blame::parse_blame_porcelain;
pub use commit::{parse_authorship, parse_commit, StartFrom};
pub use diff::{
    added_line_extents, hunk_text, line_extents, parse_unified_diff, ChangedLines, FileStatus, Hunk,
    LineSide, PatchSet, PatchedFile,
};
pub use process::GitCli;

use crate::config::SurvivalConfig;
use crate::error::{GitError, GitResult};
use git2::Repository;
use std::path::{Path, PathBuf};

/// The empty tree object of SHA-1 repositories.
pub const EMPTY_TREE_SHA1: &str = "4b825dc642cb6eb9a060e54bf8d69288fbee4904";

/// What a finished git process left behind.
#[derive(Debug, Clone, Default)]
pub struct GitOutput {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    /// `-1` when the process was killed by a signal
    pub exit_code: i32,
}

impl GitOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    pub fn text(&self) -> String {
        decode_output(&self.stdout)
    }
}

/// Runs the version-control binary; the one seam between the engine and the outside world.
pub trait Oracle: Send + Sync {
    /// Run with `args` inside `workdir` and report the outcome, whatever the exit status.
    fn execute(&self, args: &[&str], workdir: &Path) -> GitResult<GitOutput>;
}

/// A local, non-bare working copy and the oracle used to query it.
pub struct GitRepo {
    path: PathBuf,
    config: SurvivalConfig,
    oracle: Box<dyn Oracle>,
}

impl std::fmt::Debug for GitRepo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitRepo").field("path", &self.path).finish()
    }
}

impl std::fmt::Display for GitRepo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.path.display())
    }
}

impl GitRepo {
    /// Open the working copy at `path`, querying it with the configured git binary.
    pub fn open(path: &Path, config: SurvivalConfig) -> GitResult<Self> {
        let repo = Repository::open(path).map_err(|source| GitError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        let workdir = repo
            .workdir()
            .ok_or_else(|| GitError::BareRepository(path.to_path_buf()))?
            .to_path_buf();
        let oracle = GitCli::new(&config.git_binary, config.timeout);
        Ok(Self::with_oracle(workdir, config, Box::new(oracle)))
    }

    /// Use `oracle` for every query instead of spawning git directly.
    pub fn with_oracle(path: PathBuf, config: SurvivalConfig, oracle: Box<dyn Oracle>) -> Self {
        GitRepo {
            path,
            config,
            oracle,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn config(&self) -> &SurvivalConfig {
        &self.config
    }

    /// Run git; any non-zero exit is a [`GitError::ToolInvocation`].
    pub fn run(&self, args: &[&str]) -> GitResult<GitOutput> {
        self.run_accepting(args, &[])
    }

    /// Run git, treating the listed non-zero exit codes as ordinary results.
    pub fn run_accepting(&self, args: &[&str], accepted: &[i32]) -> GitResult<GitOutput> {
        let output = self.oracle.execute(args, &self.path)?;
        if output.success() || accepted.contains(&output.exit_code) {
            return Ok(output);
        }
        Err(GitError::ToolInvocation {
            command: command_line(&self.config.git_binary, args),
            exit_code: output.exit_code,
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }

    /// Run git and decode its standard output.
    pub fn run_text(&self, args: &[&str]) -> GitResult<String> {
        Ok(self.run(args)?.text())
    }

    /// Contents of `path` as of `commit`.
    pub fn file_contents(&self, commit: &str, path: &str) -> GitResult<String> {
        let object = format!("{commit}:{path}");
        self.run_text(&["show", &object])
    }

    /// Value of the git configuration variable `name`, or `None` when unset.
    ///
    /// `value_type` is passed as `--type`, e.g. `bool` or `int`, so git
    /// canonicalizes the value.
    pub fn get_config(&self, name: &str, value_type: Option<&str>) -> GitResult<Option<String>> {
        let type_arg = value_type.map(|t| format!("--type={t}"));
        let mut args = vec!["config"];
        args.extend(type_arg.as_deref());
        args.push(name);

        let output = self.run_accepting(&args, &[1])?;
        if !output.success() {
            return Ok(None);
        }
        Ok(Some(output.text().trim().to_string()))
    }
}

pub(crate) fn command_line(binary: &str, args: &[&str]) -> String {
    let mut line = binary.to_string();
    for arg in args {
        line.push(' ');
        line.push_str(arg);
    }
    line
}

/// Decode tool output as UTF-8, falling back to Latin-1 so decoding never fails.
pub fn decode_output(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        Err(_) => bytes.iter().map(|&b| b as char).collect(),
    }
}

/// Undo git's C-style quoting of unusual path names (`"a\tb"`, `"\303\251"`).
pub fn unquote_path(path: &str) -> String {
    let Some(inner) = path
        .strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
    else {
        return path.to_string();
    };

    let mut bytes = Vec::with_capacity(inner.len());
    let mut chars = inner.bytes().peekable();
    while let Some(b) = chars.next() {
        if b != b'\\' {
            bytes.push(b);
            continue;
        }
        match chars.next() {
            Some(b'a') => bytes.push(0x07),
            Some(b'b') => bytes.push(0x08),
            Some(b't') => bytes.push(b'\t'),
            Some(b'n') => bytes.push(b'\n'),
            Some(b'v') => bytes.push(0x0b),
            Some(b'f') => bytes.push(0x0c),
            Some(b'r') => bytes.push(b'\r'),
            Some(d @ b'0'..=b'7') => {
                let mut value = u32::from(d - b'0');
                for _ in 0..2 {
                    match chars.peek() {
                        Some(&o @ b'0'..=b'7') => {
                            value = value * 8 + u32::from(o - b'0');
                            chars.next();
                        }
                        _ => break,
                    }
                }
                bytes.push((value & 0xff) as u8);
            }
            Some(other) => bytes.push(other),
            None => bytes.push(b'\\'),
        }
    }
    decode_output(&bytes)
}

/// Reject revision strings that git would read as an option or that cannot be a single argument.
pub fn is_safe_revision(rev: &str) -> bool {
    !rev.is_empty()
        && !rev.starts_with('-')
        && !rev.contains(['\0', '\n', '\r'])
        && !rev.chars().any(char::is_whitespace)
}
