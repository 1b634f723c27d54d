// src/survival.rs

//! Did the lines a commit added survive up to the reference?
//!
//! For a targeted commit the added lines are found from its diff, grouped
//! into extents per file, and each file is reverse-blamed on those extents.
//! A blamed line without a `previous` pointer is still present, unchanged,
//! at the reference; any other line was altered or removed by the commit
//! its pointer names.

use crate::cache::MetadataCache;
use crate::error::GitResult;
use crate::git::{GitRepo, LineSide};
use crate::model::{
    BlameCommit, BlameRecord, CommitId, FilePath, LineExtent, LineSurvivalRecord, SurvivalSummary,
};
use std::collections::BTreeMap;
use tracing::debug;

/// Reverse-blame results for one file changed by the targeted commit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSurvival {
    /// Post-image path in the targeted commit
    pub path: FilePath,
    pub commits: BTreeMap<CommitId, BlameCommit>,
    pub lines: Vec<BlameRecord>,
}

/// Reverse-blame results for every file the targeted commit added lines to
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangesSurvival {
    pub files: Vec<FileSurvival>,
}

impl ChangesSurvival {
    /// `(lines_survived, lines_total)`
    pub fn counts(&self) -> (usize, usize) {
        changes_survival_perc(&self.files)
    }

    /// Fields of `commit` as printed by any of the blame walks.
    pub fn blame_commit(&self, commit: &str) -> Option<&BlameCommit> {
        self.files
            .iter()
            .filter_map(|f| f.commits.get(commit))
            .find(|c| c.committer_time().is_some())
    }

    pub fn lines(&self) -> impl Iterator<Item = (&FileSurvival, &BlameRecord)> {
        self.files
            .iter()
            .flat_map(|file| file.lines.iter().map(move |line| (file, line)))
    }

    /// Provenance of every blamed line.
    pub fn line_records(&self) -> Vec<LineSurvivalRecord> {
        self.lines()
            .map(|(file, line)| {
                let (next_commit, next_filename) = match &line.lineage {
                    crate::model::Lineage::StillPresent => (None, None),
                    crate::model::Lineage::Superseded { commit, path } => {
                        (Some(commit.clone()), Some(path.clone()))
                    }
                };
                LineSurvivalRecord {
                    sha_filename: file.path.clone(),
                    sha_line_no: line.final_line_no,
                    last_commit: line.commit.clone(),
                    last_filename: line.filename.clone(),
                    last_line_no: line.original_line_no,
                    line: line.line.clone(),
                    next_commit,
                    next_filename,
                }
            })
            .collect()
    }
}

/// Count the blamed lines, and those of them still present.
pub fn changes_survival_perc(files: &[FileSurvival]) -> (usize, usize) {
    let mut lines_total = 0;
    let mut lines_survived = 0;
    for file in files {
        lines_total += file.lines.len();
        lines_survived += file.lines.iter().filter(|l| l.lineage.is_present()).count();
    }
    (lines_survived, lines_total)
}

impl GitRepo {
    /// Reverse-blame the lines `commit` added relative to `prev`
    /// (default: its first parent, or the empty tree for a root commit).
    pub fn changes_survival(&self, commit: &str, prev: Option<&str>) -> GitResult<ChangesSurvival> {
        let reference = self.config().reference.clone();
        let changed = self.changed_line_extents(commit, prev, LineSide::Post)?;

        // whole-file blame is only used where git agrees the file is brand new
        let pure_additions: Vec<&FilePath> = if self.config().addition_optimization {
            let status = self.diff_file_status(commit, prev)?;
            changed
                .whole_files
                .iter()
                .filter(|path| status.contains_key(&(None, Some(path.to_string()))))
                .collect()
        } else {
            Vec::new()
        };

        let mut survival = ChangesSurvival::default();
        for (path, extents) in &changed.extents {
            let line_extents: Option<&[LineExtent]> = if pure_additions.contains(&path) {
                None
            } else {
                Some(extents)
            };
            debug!(commit, path = %path, extents = extents.len(), whole_file = line_extents.is_none(), "reverse blame");
            let blame = self.reverse_blame(commit, path, &reference, line_extents)?;
            survival.files.push(FileSurvival {
                path: path.clone(),
                commits: blame.commits,
                lines: blame.lines,
            });
        }
        Ok(survival)
    }
}

/// Totals for `survival`, with the earliest time one of its lines was altered.
///
/// The committer time of each altering commit comes from the blame headers
/// when any walk printed them, else from `cache`, else from git.
pub fn summarize(
    repo: &GitRepo,
    survival: &ChangesSurvival,
    cache: &mut MetadataCache,
) -> GitResult<SurvivalSummary> {
    let (lines_survived, lines_total) = survival.counts();
    let mut summary = SurvivalSummary {
        lines_total,
        lines_survived,
        min_died_timestamp: None,
    };
    if lines_survived == lines_total {
        return Ok(summary);
    }

    for (_, line) in survival.lines() {
        let Some(next) = line.lineage.next_commit() else {
            continue;
        };
        let died = match survival.blame_commit(next).and_then(BlameCommit::committer_time) {
            Some(time) => time,
            None => cache.resolve(repo, next)?.committer,
        };
        summary.min_died_timestamp = Some(summary.min_died_timestamp.map_or(died, |m| m.min(died)));
    }
    Ok(summary)
}

/// Survival of the lines `commit` added, measured at the configured reference.
pub fn survival(
    repo: &GitRepo,
    commit: &str,
    prev: Option<&str>,
    cache: &mut MetadataCache,
) -> GitResult<(SurvivalSummary, ChangesSurvival)> {
    let changes = repo.changes_survival(commit, prev)?;
    for file in &changes.files {
        cache.record_blame_commits(&file.commits);
    }
    let summary = summarize(repo, &changes, cache)?;
    Ok((summary, changes))
}
