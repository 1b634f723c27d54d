// src/git/commit.rs

use super::GitRepo;
use crate::error::{GitResult, ParseError};
use crate::model::{Commit, Signature};
use regex::Regex;
use std::sync::LazyLock;

static AUTHORSHIP_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(.*) <(.*)> ([0-9]+) ([-+][0-9]{4})$").expect("valid regex")
});

/// Where `rev-list` starts following parent links
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartFrom {
    /// The current commit, `HEAD`
    Current,
    /// Every ref, `--all`
    All,
    Rev(String),
}

impl StartFrom {
    pub(super) fn as_arg(&self) -> &str {
        match self {
            StartFrom::Current => "HEAD",
            StartFrom::All => "--all",
            StartFrom::Rev(rev) => rev,
        }
    }
}

/// Parse an `author`/`committer` value: `Name <email> 1693605193 -0600`.
pub fn parse_authorship(line: &str, field: &'static str) -> Result<Signature, ParseError> {
    let malformed = || ParseError::Authorship {
        field,
        line: line.to_string(),
    };
    let caps = AUTHORSHIP_RE.captures(line).ok_or_else(malformed)?;
    Ok(Signature {
        name: caps[1].to_string(),
        email: caps[2].to_string(),
        timestamp: caps[3].parse().map_err(|_| malformed())?,
        tz_offset: caps[4].to_string(),
    })
}

/// Parse one commit as printed by `git rev-list --parents --header`.
///
/// The first line is `<id> <parent>*`, followed by the raw header lines,
/// a blank line, and the message indented by four spaces.
pub fn parse_commit(text: &str) -> Result<Commit, ParseError> {
    let text = text.trim_end_matches('\0');
    let mut lines = text.split('\n');

    let header = lines
        .next()
        .filter(|line| !line.is_empty())
        .ok_or(ParseError::MissingCommitHeader)?;
    let mut ids = header.split(' ');
    let id = ids
        .next()
        .filter(|id| !id.is_empty() && id.bytes().all(|b| b.is_ascii_hexdigit()))
        .ok_or(ParseError::MissingCommitHeader)?
        .to_string();
    let parents: Vec<String> = ids.map(str::to_string).collect();

    let mut tree = None;
    let mut author = None;
    let mut committer = None;
    for line in lines.by_ref() {
        if line.is_empty() {
            break;
        }
        if let Some(value) = line.strip_prefix("tree ") {
            tree = Some(value.to_string());
        } else if let Some(value) = line.strip_prefix("author ") {
            author = Some(parse_authorship(value, "author")?);
        } else if let Some(value) = line.strip_prefix("committer ") {
            committer = Some(parse_authorship(value, "committer")?);
        }
    }

    let mut body: Vec<&str> = lines.map(|l| l.strip_prefix("    ").unwrap_or(l)).collect();
    while body.last().is_some_and(|l| l.is_empty()) {
        body.pop();
    }
    let mut message = body.join("\n");
    if !message.is_empty() {
        message.push('\n');
    }

    let missing = |field| ParseError::MissingCommitField {
        commit: id.clone(),
        field,
    };
    Ok(Commit {
        tree: tree.ok_or_else(|| missing("tree"))?,
        author: author.ok_or_else(|| missing("author"))?,
        committer: committer.ok_or_else(|| missing("committer"))?,
        id,
        parents,
        message,
    })
}

impl GitRepo {
    /// Resolve the metadata of a single commit.
    pub fn get_commit_metadata(&self, commit: &str) -> GitResult<Commit> {
        let text = self.run_text(&[
            "rev-list",
            "--parents",
            "--header",
            "--max-count=1",
            commit,
            "--",
        ])?;
        Ok(parse_commit(&text)?)
    }

    /// Count commits reachable from `start_from`.
    ///
    /// With `until_commit`, only commits on the ancestry path from it are
    /// counted. `until_commit` is then counted once as the boundary, but only
    /// when a later commit lies on that path: starting from `until_commit`
    /// itself gives 0, and starting one commit later gives 2.
    pub fn count_commits(
        &self,
        start_from: &StartFrom,
        until_commit: Option<&str>,
        first_parent: bool,
    ) -> GitResult<u64> {
        let ancestry;
        let mut args = vec!["rev-list", "--count", start_from.as_arg()];
        if let Some(until) = until_commit {
            ancestry = format!("--ancestry-path={until}");
            args.extend(["--not", until, ancestry.as_str(), "--boundary"]);
        }
        if first_parent {
            args.push("--first-parent");
        }
        let text = self.run_text(&args)?;
        let count = text.trim();
        Ok(count
            .parse()
            .map_err(|_| ParseError::Number(count.to_string()))?)
    }

    /// Newest commit reachable from `start_from` committed before `timestamp`.
    pub fn find_commit_by_timestamp(
        &self,
        timestamp: i64,
        start_from: &StartFrom,
    ) -> GitResult<Option<String>> {
        let min_age = format!("--min-age={timestamp}");
        let text = self.run_text(&["rev-list", min_age.as_str(), "-1", start_from.as_arg()])?;
        let commit = text.trim();
        Ok((!commit.is_empty()).then(|| commit.to_string()))
    }

    /// Root commits reachable from `start_from`.
    pub fn find_roots(&self, start_from: &StartFrom) -> GitResult<Vec<String>> {
        let text = self.run_text(&["rev-list", "--max-parents=0", start_from.as_arg()])?;
        Ok(text.lines().map(str::to_string).collect())
    }
}
