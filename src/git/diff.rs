// src/git/diff.rs

use super::{unquote_path, GitRepo};
use crate::error::{GitError, GitResult, ParseError};
use crate::model::{FilePath, LineExtent, LineKind, PatchLine};
use regex::Regex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::LazyLock;
use tracing::debug;

static HUNK_HEADER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^@@ -([0-9]+)(?:,([0-9]+))? \+([0-9]+)(?:,([0-9]+))? @@ ?(.*)$")
        .expect("valid regex")
});

/// How a file changed between the two sides of a diff
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum FileStatus {
    Added,
    Removed,
    Modified,
    Renamed,
    Copied,
    TypeChanged,
}

impl FileStatus {
    fn from_letter(letter: char) -> Option<Self> {
        Some(match letter {
            'A' => FileStatus::Added,
            'D' => FileStatus::Removed,
            'M' => FileStatus::Modified,
            'R' => FileStatus::Renamed,
            'C' => FileStatus::Copied,
            'T' => FileStatus::TypeChanged,
            _ => return None,
        })
    }
}

/// Pre-image or post-image of a change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineSide {
    Pre,
    Post,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Hunk {
    pub source_start: u32,
    pub source_length: u32,
    pub target_start: u32,
    pub target_length: u32,
    /// Function context git prints after the second `@@`
    pub section_header: String,
    pub lines: Vec<PatchLine>,
}

impl Hunk {
    pub fn added_lines(&self) -> impl Iterator<Item = &PatchLine> {
        self.lines.iter().filter(|l| l.is_added())
    }
}

/// The diff of one file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PatchedFile {
    /// Pre-image path, `None` for `/dev/null`
    pub source_file: Option<FilePath>,
    /// Post-image path, `None` for `/dev/null`
    pub target_file: Option<FilePath>,
    pub status: FileStatus,
    pub is_binary: bool,
    pub hunks: Vec<Hunk>,
}

impl PatchedFile {
    fn new(source_file: Option<FilePath>, target_file: Option<FilePath>) -> Self {
        PatchedFile {
            source_file,
            target_file,
            status: FileStatus::Modified,
            is_binary: false,
            hunks: Vec::new(),
        }
    }

    /// Post-image path, or the pre-image path for removed files.
    pub fn path(&self) -> &str {
        match self.status {
            FileStatus::Removed => self.source_file.as_deref(),
            _ => self.target_file.as_deref().or(self.source_file.as_deref()),
        }
        .unwrap_or_default()
    }

    pub fn is_added_file(&self) -> bool {
        self.status == FileStatus::Added
    }

    pub fn is_removed_file(&self) -> bool {
        self.status == FileStatus::Removed
    }

    pub fn added_lines(&self) -> impl Iterator<Item = &PatchLine> {
        self.hunks.iter().flat_map(Hunk::added_lines)
    }
}

/// All files of one diff
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PatchSet {
    pub files: Vec<PatchedFile>,
}

impl PatchSet {
    pub fn file(&self, path: &str) -> Option<&PatchedFile> {
        self.files.iter().find(|f| f.path() == path)
    }
}

/// Changed lines of a diff on one side, per file.
///
/// On the post-image side these are the added lines keyed by post-image
/// path; on the pre-image side the removed lines keyed by pre-image path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangedLines {
    /// Maximal runs of changed line numbers, sorted and disjoint
    pub extents: BTreeMap<FilePath, Vec<LineExtent>>,
    pub lines: BTreeMap<FilePath, Vec<PatchLine>>,
    /// Files existing only on this side: brand new (post) or deleted (pre),
    /// never renames or copies
    pub whole_files: Vec<FilePath>,
}

/// Text of one side of a hunk, for matching changes against other text.
pub fn hunk_text(hunk: &Hunk, side: LineSide) -> String {
    let mut text = String::new();
    for line in &hunk.lines {
        let keep = match (line.kind, side) {
            (LineKind::Context, _) => true,
            (LineKind::Removed, LineSide::Pre) => true,
            (LineKind::Added, LineSide::Post) => true,
            _ => false,
        };
        if keep {
            text.push_str(&line.content);
            text.push('\n');
        }
    }
    text
}

/// Line number of `line` on `side`, if it is a line changed on that side.
fn changed_line_no(line: &PatchLine, side: LineSide) -> Option<u32> {
    match side {
        LineSide::Post if line.is_added() => line.target_line_no,
        LineSide::Pre if line.is_removed() => line.source_line_no,
        _ => None,
    }
}

/// Compress the added lines of a hunk into maximal contiguous extents.
///
/// An extent opens at an added line, grows over the following added lines,
/// and closes at the next non-added line or at the end of the hunk.
pub fn added_line_extents(hunk: &Hunk) -> Vec<LineExtent> {
    line_extents(hunk, LineSide::Post)
}

/// Like [`added_line_extents`], for the removed lines (`Pre`, source line
/// numbers) or the added lines (`Post`, target line numbers).
pub fn line_extents(hunk: &Hunk, side: LineSide) -> Vec<LineExtent> {
    let mut extents = Vec::new();
    let mut open: Option<(u32, u32)> = None;
    for line in &hunk.lines {
        match changed_line_no(line, side) {
            Some(number) => {
                open = Some(match open {
                    Some((start, _)) => (start, number),
                    None => (number, number),
                });
            }
            None => {
                if let Some((start, end)) = open.take() {
                    extents.extend(LineExtent::new(start, end));
                }
            }
        }
    }
    if let Some((start, end)) = open {
        extents.extend(LineExtent::new(start, end));
    }
    extents
}

fn diff_error(line_no: usize, reason: impl Into<String>) -> ParseError {
    ParseError::Diff {
        line_no,
        reason: reason.into(),
    }
}

/// Strip the `a/`/`b/` prefix, mapping `/dev/null` to `None`.
fn diff_path(raw: &str) -> Option<FilePath> {
    let raw = raw.strip_suffix('\t').unwrap_or(raw);
    let path = unquote_path(raw);
    if path == "/dev/null" {
        return None;
    }
    let stripped = path
        .strip_prefix("a/")
        .or_else(|| path.strip_prefix("b/"))
        .unwrap_or(&path);
    Some(stripped.to_string())
}

/// Split the quoted token at the start of `s`, returning it with the rest.
fn split_quoted(s: &str) -> Option<(&str, &str)> {
    let mut escaped = false;
    for (idx, ch) in s.char_indices().skip(1) {
        match ch {
            '\\' if !escaped => escaped = true,
            '"' if !escaped => return Some((&s[..=idx], &s[idx + 1..])),
            _ => escaped = false,
        }
    }
    None
}

/// Paths from `diff --git a/<old> b/<new>`; used only when no `---`/`+++` lines follow.
fn git_header_paths(rest: &str) -> Option<(FilePath, FilePath)> {
    let (old, new) = if rest.starts_with('"') {
        let (old, tail) = split_quoted(rest)?;
        (old, tail.trim_start())
    } else if rest.ends_with('"') {
        let split = rest.rfind(" \"")?;
        (&rest[..split], &rest[split + 1..])
    } else {
        // unquoted names may contain spaces; without a rename both halves are equal
        let half = rest.len().checked_sub(1)? / 2;
        let same = rest.is_char_boundary(half)
            && rest.as_bytes().get(half) == Some(&b' ')
            && rest[..half].get(2..) == rest[half + 1..].get(2..);
        if same {
            (&rest[..half], &rest[half + 1..])
        } else {
            let split = rest.find(" b/")?;
            (&rest[..split], &rest[split + 1..])
        }
    };
    Some((diff_path(old)?, diff_path(new)?))
}

/// Line counters of the hunk being read
struct HunkCursor {
    source_left: u32,
    target_left: u32,
    source_no: u32,
    target_no: u32,
}

impl HunkCursor {
    fn is_open(&self) -> bool {
        self.source_left > 0 || self.target_left > 0
    }
}

/// Parse the output of `git diff` into files, hunks and lines.
pub fn parse_unified_diff(text: &str) -> Result<PatchSet, ParseError> {
    let mut patch = PatchSet::default();
    let mut current: Option<PatchedFile> = None;
    let mut cursor = HunkCursor {
        source_left: 0,
        target_left: 0,
        source_no: 0,
        target_no: 0,
    };

    let mut lines: Vec<&str> = text.split('\n').collect();
    if lines.last() == Some(&"") {
        lines.pop();
    }

    for (idx, line) in lines.into_iter().enumerate() {
        let line_no = idx + 1;

        if cursor.is_open() {
            let file = current
                .as_mut()
                .ok_or_else(|| diff_error(line_no, "hunk outside of a file"))?;
            let hunk = file
                .hunks
                .last_mut()
                .ok_or_else(|| diff_error(line_no, "hunk lines without a header"))?;
            let (kind, content) = match line.as_bytes().first() {
                None => (LineKind::Context, ""),
                Some(b' ') => (LineKind::Context, &line[1..]),
                Some(b'+') => (LineKind::Added, &line[1..]),
                Some(b'-') => (LineKind::Removed, &line[1..]),
                Some(b'\\') => (LineKind::NoNewline, line),
                Some(_) => {
                    return Err(diff_error(
                        line_no,
                        format!(
                            "hunk ended early, {} source and {} target lines missing",
                            cursor.source_left, cursor.target_left
                        ),
                    ))
                }
            };
            let (source_line_no, target_line_no) = match kind {
                LineKind::Context if cursor.source_left > 0 && cursor.target_left > 0 => {
                    cursor.source_left -= 1;
                    cursor.target_left -= 1;
                    cursor.source_no += 1;
                    cursor.target_no += 1;
                    (Some(cursor.source_no - 1), Some(cursor.target_no - 1))
                }
                LineKind::Added if cursor.target_left > 0 => {
                    cursor.target_left -= 1;
                    cursor.target_no += 1;
                    (None, Some(cursor.target_no - 1))
                }
                LineKind::Removed if cursor.source_left > 0 => {
                    cursor.source_left -= 1;
                    cursor.source_no += 1;
                    (Some(cursor.source_no - 1), None)
                }
                LineKind::NoNewline => (None, None),
                _ => return Err(diff_error(line_no, "more lines than the hunk header announced")),
            };
            hunk.lines.push(PatchLine {
                content: content.to_string(),
                kind,
                source_line_no,
                target_line_no,
                diff_line_no: line_no,
            });
            continue;
        }

        if let Some(rest) = line.strip_prefix("diff --git ") {
            patch.files.extend(current.take());
            let (source, target) = git_header_paths(rest).unzip();
            current = Some(PatchedFile::new(source, target));
            continue;
        }

        let file = current
            .as_mut()
            .ok_or_else(|| diff_error(line_no, format!("unexpected line {line:?}")))?;

        if let Some(caps) = HUNK_HEADER_RE.captures(line) {
            let number = |i: usize, default: u32| -> Result<u32, ParseError> {
                caps.get(i).map_or(Ok(default), |m| {
                    m.as_str()
                        .parse()
                        .map_err(|_| diff_error(line_no, "bad hunk header number"))
                })
            };
            let hunk = Hunk {
                source_start: number(1, 0)?,
                source_length: number(2, 1)?,
                target_start: number(3, 0)?,
                target_length: number(4, 1)?,
                section_header: caps[5].to_string(),
                lines: Vec::new(),
            };
            cursor = HunkCursor {
                source_left: hunk.source_length,
                target_left: hunk.target_length,
                source_no: hunk.source_start,
                target_no: hunk.target_start,
            };
            file.hunks.push(hunk);
        } else if line.starts_with('\\') {
            // "\ No newline at end of file" after the last line of a hunk
            let hunk = file
                .hunks
                .last_mut()
                .ok_or_else(|| diff_error(line_no, "no-newline marker outside a hunk"))?;
            hunk.lines.push(PatchLine {
                content: line.to_string(),
                kind: LineKind::NoNewline,
                source_line_no: None,
                target_line_no: None,
                diff_line_no: line_no,
            });
        } else if let Some(path) = line.strip_prefix("--- ") {
            file.source_file = diff_path(path);
            if file.source_file.is_none() {
                file.status = FileStatus::Added;
            }
        } else if let Some(path) = line.strip_prefix("+++ ") {
            file.target_file = diff_path(path);
            if file.target_file.is_none() {
                file.status = FileStatus::Removed;
            }
        } else if line.starts_with("new file mode ") {
            file.status = FileStatus::Added;
        } else if line.starts_with("deleted file mode ") {
            file.status = FileStatus::Removed;
        } else if let Some(path) = line.strip_prefix("rename from ") {
            file.status = FileStatus::Renamed;
            file.source_file = Some(unquote_path(path));
        } else if let Some(path) = line.strip_prefix("rename to ") {
            file.status = FileStatus::Renamed;
            file.target_file = Some(unquote_path(path));
        } else if let Some(path) = line.strip_prefix("copy from ") {
            file.status = FileStatus::Copied;
            file.source_file = Some(unquote_path(path));
        } else if let Some(path) = line.strip_prefix("copy to ") {
            file.status = FileStatus::Copied;
            file.target_file = Some(unquote_path(path));
        } else if line.starts_with("Binary files ") || line == "GIT binary patch" {
            file.is_binary = true;
        } else if [
            "index ",
            "similarity index ",
            "dissimilarity index ",
            "old mode ",
            "new mode ",
        ]
        .iter()
        .any(|prefix| line.starts_with(prefix))
        {
            continue;
        } else {
            return Err(diff_error(line_no, format!("unexpected line {line:?}")));
        }
    }

    if cursor.is_open() {
        return Err(diff_error(0, "diff output ends inside a hunk"));
    }
    patch.files.extend(current);
    Ok(patch)
}

/// Split NUL-terminated `-z` output; the names are not quoted.
fn split_nul(text: &str) -> Vec<FilePath> {
    text.split_terminator('\0').map(str::to_string).collect()
}

impl GitRepo {
    /// Run `run` against `prev`, or against the first parent of `commit`.
    ///
    /// A root commit has no first parent; that shows up as a failed query,
    /// which is then retried against the empty tree.
    fn against_baseline<T>(
        &self,
        commit: &str,
        prev: Option<&str>,
        run: impl Fn(&str) -> GitResult<T>,
    ) -> GitResult<T> {
        if let Some(prev) = prev {
            return run(prev);
        }
        let parent = format!("{commit}^");
        match run(&parent) {
            Err(err @ GitError::ToolInvocation { .. }) => {
                if self.to_oid(&parent)?.is_some() {
                    return Err(err);
                }
                debug!(commit, "no first parent, comparing with the empty tree");
                run(&self.empty_tree()?)
            }
            result => result,
        }
    }

    /// Name of the empty tree in this repository's object format.
    pub fn empty_tree(&self) -> GitResult<String> {
        let text = self.run_text(&["hash-object", "-t", "tree", "--stdin"])?;
        Ok(text.trim().to_string())
    }

    /// Raw unified diff between `prev` (default: first parent or empty tree) and `commit`.
    pub fn unidiff_text(&self, commit: &str, prev: Option<&str>) -> GitResult<String> {
        self.against_baseline(commit, prev, |base| {
            self.run_text(&[
                "diff",
                "--no-color",
                "--no-ext-diff",
                "--no-textconv",
                "--src-prefix=a/",
                "--dst-prefix=b/",
                "--find-renames",
                "--find-copies",
                "--find-copies-harder",
                base,
                commit,
                "--",
            ])
        })
    }

    /// Parsed unified diff between `prev` (default: first parent or empty tree) and `commit`.
    pub fn unidiff(&self, commit: &str, prev: Option<&str>) -> GitResult<PatchSet> {
        let text = self.unidiff_text(commit, prev)?;
        Ok(parse_unified_diff(&text)?)
    }

    /// Extents of the lines `commit` changed on `side`, for every file with any.
    ///
    /// `Post` gives the added lines in post-image numbering, `Pre` the
    /// removed lines in pre-image numbering.
    pub fn changed_line_extents(
        &self,
        commit: &str,
        prev: Option<&str>,
        side: LineSide,
    ) -> GitResult<ChangedLines> {
        let patch = self.unidiff(commit, prev)?;
        let mut changed = ChangedLines::default();
        for file in &patch.files {
            let (path, whole_file) = match side {
                LineSide::Post => (file.target_file.as_ref(), file.is_added_file()),
                // a copy leaves its source untouched
                LineSide::Pre if file.status == FileStatus::Copied => continue,
                LineSide::Pre => (file.source_file.as_ref(), file.is_removed_file()),
            };
            let Some(path) = path else {
                continue;
            };
            let extents: Vec<LineExtent> = file.hunks.iter().flat_map(|h| line_extents(h, side)).collect();
            if extents.is_empty() {
                continue;
            }
            if whole_file {
                changed.whole_files.push(path.clone());
            }
            let lines = file
                .hunks
                .iter()
                .flat_map(|h| &h.lines)
                .filter(|l| changed_line_no(l, side).is_some())
                .cloned()
                .collect();
            changed.lines.insert(path.clone(), lines);
            changed.extents.insert(path.clone(), extents);
        }
        Ok(changed)
    }

    /// Every file in the tree of `commit`.
    pub fn list_files(&self, commit: &str) -> GitResult<Vec<FilePath>> {
        let text = self.run_text(&["ls-tree", "-r", "--name-only", "--full-tree", "-z", commit])?;
        Ok(split_nul(&text))
    }

    /// Files changed by `commit` relative to its first parent.
    ///
    /// `Post` names them as they are after the change, `Pre` as before it
    /// (renames are followed; added files have no pre-image name).
    pub fn list_changed_files(&self, commit: &str, side: LineSide) -> GitResult<Vec<FilePath>> {
        match side {
            LineSide::Post => {
                let text = self.run_text(&[
                    "diff-tree",
                    "-M",
                    "-r",
                    "--root",
                    "--name-only",
                    "--no-commit-id",
                    "-z",
                    commit,
                ])?;
                Ok(split_nul(&text))
            }
            LineSide::Pre => Ok(self
                .diff_file_status(commit, None)?
                .into_keys()
                .filter_map(|(pre, _)| pre)
                .collect()),
        }
    }

    /// Name and status of every changed file, keyed by `(pre-image, post-image)` path.
    pub fn diff_file_status(
        &self,
        commit: &str,
        prev: Option<&str>,
    ) -> GitResult<BTreeMap<(Option<FilePath>, Option<FilePath>), FileStatus>> {
        let text = self.against_baseline(commit, prev, |base| {
            self.run_text(&[
                "diff-tree",
                "--no-commit-id",
                "--find-renames",
                "-l5000",
                "--name-status",
                "-r",
                base,
                commit,
            ])
        })?;

        let mut result = BTreeMap::new();
        for (idx, line) in text.lines().enumerate() {
            let mut fields = line.split('\t');
            let letter = fields.next().and_then(|s| s.chars().next());
            let status = letter
                .and_then(FileStatus::from_letter)
                .ok_or_else(|| diff_error(idx + 1, format!("unknown status line {line:?}")))?;
            let first = fields
                .next()
                .map(unquote_path)
                .ok_or_else(|| diff_error(idx + 1, "status line without a path"))?;
            let key = match status {
                FileStatus::Renamed | FileStatus::Copied => {
                    let second = fields
                        .next()
                        .map(unquote_path)
                        .ok_or_else(|| diff_error(idx + 1, "rename without a target"))?;
                    (Some(first), Some(second))
                }
                FileStatus::Added => (None, Some(first)),
                FileStatus::Removed => (Some(first), None),
                _ => (Some(first.clone()), Some(first)),
            };
            result.insert(key, status);
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git::EMPTY_TREE_SHA1;
    use crate::test_support::FixtureRepo;
    use std::collections::BTreeSet;

    const DIFF: &str = "\
diff --git a/example_file b/renamed_file
similarity index 80%
rename from example_file
rename to renamed_file
index 9daeafb..2a4e2b1 100644
--- a/example_file
+++ b/renamed_file
@@ -1,5 +1,5 @@
 example
 2
 3
-4
+4b
 5
diff --git a/new_file b/new_file
new file mode 100644
index 0000000..8b1a393
--- /dev/null
+++ b/new_file
@@ -0,0 +1,3 @@
+0
+1
+2
diff --git a/subdir/subfile b/subdir/subfile
index 3f20edf..b7c5c3a 100644
--- a/subdir/subfile
+++ b/subdir/subfile
@@ -1 +1,2 @@
-subfile
\\ No newline at end of file
+subfile
+subfile
diff --git a/gone b/gone
deleted file mode 100644
index 8b1a393..0000000
--- a/gone
+++ /dev/null
@@ -1,2 +0,0 @@
-a
-b
diff --git a/old name b/new name
similarity index 100%
rename from old name
rename to new name
diff --git a/logo.png b/logo.png
new file mode 100644
index 0000000..e69de29
Binary files /dev/null and b/logo.png differ
";

    #[test]
    fn test_parse_unified_diff_files() {
        let patch = parse_unified_diff(DIFF).unwrap();
        let paths: Vec<&str> = patch.files.iter().map(|f| f.path()).collect();
        assert_eq!(
            paths,
            vec!["renamed_file", "new_file", "subdir/subfile", "gone", "new name", "logo.png"]
        );

        let renamed = &patch.files[0];
        assert_eq!(renamed.status, FileStatus::Renamed);
        assert_eq!(renamed.source_file.as_deref(), Some("example_file"));
        assert_eq!(patch.files[1].status, FileStatus::Added);
        assert!(patch.files[1].source_file.is_none());
        assert_eq!(patch.files[2].status, FileStatus::Modified);
        assert!(patch.files[3].is_removed_file());
        assert_eq!(patch.files[4].status, FileStatus::Renamed);
        assert!(patch.files[4].hunks.is_empty());
        assert!(patch.files[5].is_binary);
        assert!(patch.files[5].is_added_file());
    }

    #[test]
    fn test_parse_unified_diff_line_numbers() {
        let patch = parse_unified_diff(DIFF).unwrap();
        let hunk = &patch.files[0].hunks[0];
        assert_eq!((hunk.source_start, hunk.source_length), (1, 5));
        assert_eq!((hunk.target_start, hunk.target_length), (1, 5));

        let removed = &hunk.lines[3];
        assert_eq!(removed.kind, LineKind::Removed);
        assert_eq!(removed.content, "4");
        assert_eq!((removed.source_line_no, removed.target_line_no), (Some(4), None));
        let added = &hunk.lines[4];
        assert_eq!(added.content, "4b");
        assert_eq!((added.source_line_no, added.target_line_no), (None, Some(4)));
        assert_eq!(added.diff_line_no, 13);
        let context = &hunk.lines[5];
        assert_eq!((context.source_line_no, context.target_line_no), (Some(5), Some(5)));

        let subfile = &patch.files[2].hunks[0];
        assert_eq!(subfile.lines[1].kind, LineKind::NoNewline);
        let targets: Vec<Option<u32>> = subfile.added_lines().map(|l| l.target_line_no).collect();
        assert_eq!(targets, vec![Some(1), Some(2)]);
    }

    #[test]
    fn test_truncated_diff_is_an_error() {
        let cut = DIFF.find("+2\n").unwrap();
        assert!(matches!(
            parse_unified_diff(&DIFF[..cut]),
            Err(ParseError::Diff { .. })
        ));
        assert!(parse_unified_diff("garbage\n").is_err());
    }

    #[test]
    fn test_quoted_paths() {
        let text = "\
diff --git \"a/tab\\there\" \"b/tab\\there\"
new file mode 100644
index 0000000..e69de29
";
        let patch = parse_unified_diff(text).unwrap();
        assert_eq!(patch.files[0].path(), "tab\there");
    }

    fn hunk_from(kinds: &str) -> Hunk {
        let mut source = 10;
        let mut target = 10;
        let lines = kinds
            .chars()
            .enumerate()
            .map(|(i, k)| {
                let kind = match k {
                    '+' => LineKind::Added,
                    '-' => LineKind::Removed,
                    _ => LineKind::Context,
                };
                let target_line_no = (kind != LineKind::Removed).then(|| {
                    target += 1;
                    target - 1
                });
                let source_line_no = (kind != LineKind::Added).then(|| {
                    source += 1;
                    source - 1
                });
                PatchLine {
                    content: format!("line {i}"),
                    kind,
                    source_line_no,
                    target_line_no,
                    diff_line_no: i + 1,
                }
            })
            .collect();
        Hunk {
            source_start: 10,
            source_length: 0,
            target_start: 10,
            target_length: 0,
            section_header: String::new(),
            lines,
        }
    }

    #[test]
    fn test_added_line_extents() {
        // context 10, added 11-12, removed, context 13, added 14, removed, added 15-16
        let hunk = hunk_from(" ++- +-++");
        let extents = added_line_extents(&hunk);
        assert_eq!(
            extents,
            vec![
                LineExtent::new(11, 12).unwrap(),
                LineExtent::single(14),
                LineExtent::new(15, 16).unwrap(),
            ]
        );

        // union of extents is exactly the set of added line numbers
        let from_extents: BTreeSet<u32> = extents.iter().flat_map(|e| e.lines()).collect();
        let added: BTreeSet<u32> = hunk.added_lines().filter_map(|l| l.target_line_no).collect();
        assert_eq!(from_extents, added);

        assert!(added_line_extents(&hunk_from("  -- ")).is_empty());
        assert_eq!(
            added_line_extents(&hunk_from("+++")),
            vec![LineExtent::new(10, 12).unwrap()]
        );
    }

    #[test]
    fn test_removed_line_extents() {
        // source: context 10, removed 11, context 12, removed 13-14
        let hunk = hunk_from(" +-+ --+");
        assert_eq!(
            line_extents(&hunk, LineSide::Pre),
            vec![LineExtent::single(11), LineExtent::new(13, 14).unwrap()]
        );
        assert_eq!(line_extents(&hunk, LineSide::Post), added_line_extents(&hunk));
        assert!(line_extents(&hunk_from(" ++ "), LineSide::Pre).is_empty());
    }

    #[test]
    fn test_hunk_text() {
        let patch = parse_unified_diff(DIFF).unwrap();
        let hunk = &patch.files[0].hunks[0];
        assert_eq!(hunk_text(hunk, LineSide::Pre), "example\n2\n3\n4\n5\n");
        assert_eq!(hunk_text(hunk, LineSide::Post), "example\n2\n3\n4b\n5\n");
    }

    #[test]
    fn test_changed_line_extents_for_root_commit() {
        let fixture = FixtureRepo::scenario();
        let repo = fixture.git_repo();

        // no prev: the missing parent is detected and the empty tree used
        let changed = repo.changed_line_extents(&fixture.root, None, LineSide::Post).unwrap();
        assert_eq!(
            changed.extents.get("f"),
            Some(&vec![LineExtent::new(1, 5).unwrap()])
        );
        assert_eq!(changed.whole_files, vec!["f".to_string()]);

        // nothing existed before the root commit
        let pre = repo.changed_line_extents(&fixture.root, None, LineSide::Pre).unwrap();
        assert_eq!(pre, ChangedLines::default());

        let explicit = repo
            .changed_line_extents(&fixture.root, Some(EMPTY_TREE_SHA1), LineSide::Post)
            .unwrap();
        assert_eq!(explicit, changed);
    }

    #[test]
    fn test_changed_line_extents_for_child_commit() {
        let fixture = FixtureRepo::scenario();
        let repo = fixture.git_repo();

        let changed = repo.changed_line_extents(&fixture.change, None, LineSide::Post).unwrap();
        assert_eq!(changed.extents.len(), 1);
        assert_eq!(changed.extents["f"], vec![LineExtent::single(4)]);
        assert_eq!(changed.lines["f"][0].content, "line 4 changed");
        assert!(changed.whole_files.is_empty());

        let removed = repo.changed_line_extents(&fixture.change, None, LineSide::Pre).unwrap();
        assert_eq!(removed.extents["f"], vec![LineExtent::single(4)]);
        assert_eq!(removed.lines["f"].len(), 1);
        assert_eq!(removed.lines["f"][0].content, "line 4");
        assert_eq!(removed.lines["f"][0].source_line_no, Some(4));
    }

    #[test]
    fn test_pre_image_extents_of_deletion() {
        let fixture = FixtureRepo::history();
        let repo = fixture.git_repo();
        let deletion = fixture.deletion.clone().unwrap();

        let added = repo.changed_line_extents(&deletion, None, LineSide::Post).unwrap();
        assert!(added.extents.is_empty());
        let removed = repo.changed_line_extents(&deletion, None, LineSide::Pre).unwrap();
        assert_eq!(removed.extents.len(), 1);
        assert_eq!(removed.extents["f"], vec![LineExtent::single(1)]);
        assert!(removed.whole_files.is_empty());

        // `g` is a copy of `f`; nothing was removed from `f`
        let copy = fixture.copy.clone().unwrap();
        let from_copy = repo.changed_line_extents(&copy, None, LineSide::Pre).unwrap();
        assert!(from_copy.extents.is_empty());
    }

    #[test]
    fn test_list_files() {
        let fixture = FixtureRepo::history();
        let repo = fixture.git_repo();

        assert_eq!(repo.list_files(&fixture.root).unwrap(), vec!["f"]);
        assert_eq!(repo.list_files("HEAD").unwrap(), vec!["f", "g"]);
        assert!(repo.list_files("no-such-commit").is_err());
    }

    #[test]
    fn test_list_changed_files() {
        let fixture = FixtureRepo::history();
        let repo = fixture.git_repo();
        let copy = fixture.copy.clone().unwrap();

        assert_eq!(repo.list_changed_files(&fixture.root, LineSide::Post).unwrap(), vec!["f"]);
        assert!(repo.list_changed_files(&fixture.root, LineSide::Pre).unwrap().is_empty());
        assert_eq!(repo.list_changed_files(&fixture.change, LineSide::Pre).unwrap(), vec!["f"]);
        // `g` is new, so it has no pre-image name
        assert_eq!(repo.list_changed_files(&copy, LineSide::Post).unwrap(), vec!["g"]);
        assert!(repo.list_changed_files(&copy, LineSide::Pre).unwrap().is_empty());
    }

    #[test]
    fn test_empty_tree() {
        let fixture = FixtureRepo::scenario();
        let repo = fixture.git_repo();
        assert_eq!(repo.empty_tree().unwrap(), EMPTY_TREE_SHA1);
    }

    #[test]
    fn test_unidiff_of_unknown_commit_fails() {
        let fixture = FixtureRepo::scenario();
        let repo = fixture.git_repo();
        let err = repo.unidiff("no-such-commit", None).unwrap_err();
        assert!(matches!(err, GitError::ToolInvocation { .. }));
    }

    #[test]
    fn test_diff_file_status() {
        let fixture = FixtureRepo::scenario();
        let repo = fixture.git_repo();

        let root = repo.diff_file_status(&fixture.root, None).unwrap();
        assert_eq!(
            root.get(&(None, Some("f".to_string()))),
            Some(&FileStatus::Added)
        );
        let change = repo.diff_file_status(&fixture.change, None).unwrap();
        assert_eq!(
            change.get(&(Some("f".to_string()), Some("f".to_string()))),
            Some(&FileStatus::Modified)
        );
    }
}
