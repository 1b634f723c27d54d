// src/git/blame.rs

use super::{unquote_path, GitRepo};
use crate::error::{GitResult, ParseError};
use crate::model::{BlameCommit, BlameOutput, BlameRecord, CommitId, LineExtent, Lineage};
use regex::Regex;
use std::sync::LazyLock;

static BLAME_HEADER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([0-9a-f]{40}|[0-9a-f]{64}) ([0-9]+) ([0-9]+)(?: [0-9]+)?$").expect("valid regex")
});

/// A record whose header has been read but whose content line has not.
struct OpenRecord {
    commit: CommitId,
    original_line_no: u32,
    final_line_no: u32,
    /// `filename`/`previous` repeated for this record (commit seen under several paths)
    filename: Option<String>,
    previous: Option<(CommitId, String)>,
}

fn blame_error(line_no: usize, reason: impl Into<String>) -> ParseError {
    ParseError::Blame {
        line_no,
        reason: reason.into(),
    }
}

fn parse_line_no(value: &str, line_no: usize) -> Result<u32, ParseError> {
    value
        .parse()
        .map_err(|_| blame_error(line_no, format!("bad line number {value:?}")))
}

/// Parse `git blame --porcelain` output.
///
/// Commit headers (`author`, `committer-time`, `previous`, `boundary`, ...) are
/// printed in full only the first time a commit appears, so they are kept per
/// commit. Each TAB-prefixed content line closes one [`BlameRecord`], and its
/// [`Lineage`] is settled right there from the `previous` pointer in effect.
pub fn parse_blame_porcelain(text: &str) -> Result<BlameOutput, ParseError> {
    let mut output = BlameOutput::default();
    let mut current: Option<OpenRecord> = None;

    let mut lines: Vec<&str> = text.split('\n').collect();
    if lines.last() == Some(&"") {
        lines.pop();
    }

    for (idx, line) in lines.into_iter().enumerate() {
        let line_no = idx + 1;

        if let Some(content) = line.strip_prefix('\t') {
            let record = current
                .take()
                .ok_or_else(|| blame_error(line_no, "content line without a header"))?;
            let shared = output.commits.get(&record.commit);
            let (filename, previous) = match record.filename {
                Some(filename) => (Some(filename), record.previous),
                None => (
                    shared.and_then(|c| c.filename.clone()),
                    shared.and_then(|c| c.previous.clone()),
                ),
            };
            let filename =
                filename.ok_or_else(|| blame_error(line_no, "no filename for blamed line"))?;
            let lineage = match previous {
                Some((commit, path)) => Lineage::Superseded { commit, path },
                None => Lineage::StillPresent,
            };
            output.lines.push(BlameRecord {
                boundary: shared.is_some_and(|c| c.boundary),
                commit: record.commit,
                original_line_no: record.original_line_no,
                final_line_no: record.final_line_no,
                filename,
                line: content.to_string(),
                lineage,
            });
            continue;
        }

        if line.is_empty() {
            continue;
        }

        if let Some(caps) = BLAME_HEADER_RE.captures(line) {
            if current.is_some() {
                return Err(blame_error(line_no, "header while previous line is still open"));
            }
            let commit = caps[1].to_string();
            output.commits.entry(commit.clone()).or_default();
            current = Some(OpenRecord {
                commit,
                original_line_no: parse_line_no(&caps[2], line_no)?,
                final_line_no: parse_line_no(&caps[3], line_no)?,
                filename: None,
                previous: None,
            });
            continue;
        }

        let record = current
            .as_mut()
            .ok_or_else(|| blame_error(line_no, format!("unexpected line {line:?}")))?;
        let shared = output.commits.entry(record.commit.clone()).or_default();
        let (key, value) = line.split_once(' ').unwrap_or((line, ""));
        match key {
            "boundary" => shared.boundary = true,
            "filename" => {
                let path = unquote_path(value);
                shared.filename.get_or_insert_with(|| path.clone());
                record.filename = Some(path);
            }
            "previous" => {
                let (prev_commit, prev_path) = value
                    .split_once(' ')
                    .ok_or_else(|| blame_error(line_no, format!("malformed previous {value:?}")))?;
                let pointer = (prev_commit.to_string(), unquote_path(prev_path));
                shared.previous.get_or_insert_with(|| pointer.clone());
                record.previous = Some(pointer);
            }
            _ => {
                shared.fields.insert(key.to_string(), value.to_string());
            }
        }
    }

    if current.is_some() {
        return Err(blame_error(0, "output ends inside a record"));
    }
    Ok(output)
}

impl GitRepo {
    /// Trace lines of `file`, as of `commit`, forward in time up to `reference`.
    ///
    /// Each returned line is attributed to the last commit in which it still
    /// appears unchanged. With `line_extents` only those lines are traced,
    /// otherwise the whole file.
    ///
    /// When `commit` is the reference itself there is no later history and
    /// every traced line is still present, attributed to `commit`.
    pub fn reverse_blame(
        &self,
        commit: &str,
        file: &str,
        reference: &str,
        line_extents: Option<&[LineExtent]>,
    ) -> GitResult<BlameOutput> {
        let commit_oid = self.to_oid(&format!("{commit}^{{commit}}"))?;
        if let Some(oid) = commit_oid {
            if self.to_oid(&format!("{reference}^{{commit}}"))?.as_ref() == Some(&oid) {
                return self.blame_at_reference(&oid, file, line_extents);
            }
        }

        let range = format!("{commit}..{reference}");
        let line_args: Vec<String> = line_extents
            .unwrap_or_default()
            .iter()
            .map(LineExtent::to_blame_arg)
            .collect();

        let mut args = vec!["blame", "--reverse", range.as_str(), "--porcelain"];
        for arg in &line_args {
            args.extend(["-L", arg.as_str()]);
        }
        args.extend(["--", file]);

        let text = self.run_text(&args)?;
        Ok(parse_blame_porcelain(&text)?)
    }

    /// Lines of `file` at `commit`, all unchanged up to `commit` itself.
    fn blame_at_reference(
        &self,
        commit: &str,
        file: &str,
        line_extents: Option<&[LineExtent]>,
    ) -> GitResult<BlameOutput> {
        let contents = self.file_contents(commit, file)?;
        let wanted = |n: u32| line_extents.map_or(true, |extents| extents.iter().any(|e| e.contains(n)));

        let mut output = BlameOutput::default();
        output.commits.insert(
            commit.to_string(),
            BlameCommit {
                filename: Some(file.to_string()),
                ..Default::default()
            },
        );
        for (line_no, line) in (1u32..).zip(contents.split_terminator('\n')) {
            if !wanted(line_no) {
                continue;
            }
            output.lines.push(BlameRecord {
                commit: commit.to_string(),
                original_line_no: line_no,
                final_line_no: line_no,
                filename: file.to_string(),
                line: line.to_string(),
                lineage: Lineage::StillPresent,
                boundary: false,
            });
        }
        Ok(output)
    }
}
