// src/batch.rs

use crate::cache::MetadataCache;
use crate::config::SurvivalConfig;
use crate::dataset::{CommitRow, CommitSurvivalRow, LineSurvivalRow, Registry};
use crate::error::{FatalError, GitError, GitResult};
use crate::git::{is_safe_revision, GitRepo, StartFrom};
use crate::model::{CommitTimestamps, LineSurvivalRecord};
use crate::survival::{self, ChangesSurvival};
use indicatif::{ParallelProgressIterator, ProgressBar, ProgressIterator};
use rayon::prelude::*;
use std::collections::HashMap;
use std::fmt;
use std::ops::AddAssign;
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// Counters of a batch run, reported at completion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchStats {
    pub n_rows: usize,
    /// Rows whose repository is not registered or cannot be opened
    pub n_skipped: usize,
    /// Missing SHA, or one that does not name a commit
    pub n_invalid: usize,
    pub n_unmerged: usize,
    /// Commits whose survival could not be computed, parse failures included
    pub n_errors: usize,
    pub n_parse_errors: usize,
    pub n_completed: usize,
    pub lines_survived: usize,
    pub lines_total: usize,
    pub repositories_opened: usize,
}

impl BatchStats {
    /// Errors from the git binary itself: failed or timed-out invocations.
    pub fn n_invocation_errors(&self) -> usize {
        self.n_errors - self.n_parse_errors
    }

    pub fn survival_percentage(&self) -> Option<f64> {
        (self.lines_total > 0)
            .then(|| 100.0 * self.lines_survived as f64 / self.lines_total as f64)
    }
}

impl AddAssign for BatchStats {
    fn add_assign(&mut self, other: Self) {
        self.n_rows += other.n_rows;
        self.n_skipped += other.n_skipped;
        self.n_invalid += other.n_invalid;
        self.n_unmerged += other.n_unmerged;
        self.n_errors += other.n_errors;
        self.n_parse_errors += other.n_parse_errors;
        self.n_completed += other.n_completed;
        self.lines_survived += other.lines_survived;
        self.lines_total += other.lines_total;
        self.repositories_opened += other.repositories_opened;
    }
}

impl fmt::Display for BatchStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Commits in table:     {}", self.n_rows)?;
        writeln!(f, "Repositories opened:  {}", self.repositories_opened)?;
        writeln!(f, "Skipped:              {}", self.n_skipped)?;
        writeln!(f, "Invalid SHA:          {}", self.n_invalid)?;
        writeln!(f, "Not merged:           {}", self.n_unmerged)?;
        writeln!(
            f,
            "Errors:               {} ({} invocation, {} parse)",
            self.n_errors,
            self.n_invocation_errors(),
            self.n_parse_errors
        )?;
        writeln!(f, "Completed:            {}", self.n_completed)?;
        match self.survival_percentage() {
            Some(perc) => write!(
                f,
                "Lines survived:       {} / {} ({perc:.2}%)",
                self.lines_survived, self.lines_total
            ),
            None => write!(f, "Lines survived:       0 / 0"),
        }
    }
}

/// Terminal state of one targeted commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitState {
    Invalid,
    Unmerged,
    Errored,
    Completed,
}

/// Result of processing one row of the commit table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitOutcome {
    pub state: CommitState,
    pub row: CommitSurvivalRow,
    pub lines: Vec<LineSurvivalRow>,
}

impl CommitOutcome {
    fn stopped(state: CommitState, row: CommitSurvivalRow) -> Self {
        CommitOutcome {
            state,
            row,
            lines: Vec::new(),
        }
    }
}

fn errored(mut row: CommitSurvivalRow, err: GitError, stats: &mut BatchStats) -> CommitOutcome {
    warn!(repo = %row.repo_name, sha = ?row.sha, error = %err, "failed to compute survival");
    stats.n_errors += 1;
    if err.is_parse() {
        stats.n_parse_errors += 1;
    }
    row.error = Some(true);
    CommitOutcome::stopped(CommitState::Errored, row)
}

/// Timestamps of `commit`, from the blame headers if printed there, else via `cache`.
fn timestamps_of(
    repo: &GitRepo,
    changes: &ChangesSurvival,
    cache: &mut MetadataCache,
    commit: &str,
) -> GitResult<CommitTimestamps> {
    let from_blame = changes
        .blame_commit(commit)
        .and_then(|c| Some(CommitTimestamps {
            author: c.author_time()?,
            committer: c.committer_time()?,
        }));
    match from_blame {
        Some(timestamps) => Ok(timestamps),
        None => cache.resolve(repo, commit),
    }
}

fn line_rows(
    repo: &GitRepo,
    row: &CommitSurvivalRow,
    sha: &str,
    changes: &ChangesSurvival,
    cache: &mut MetadataCache,
) -> GitResult<Vec<LineSurvivalRow>> {
    let records: Vec<LineSurvivalRecord> = changes.line_records();
    let mut rows = Vec::with_capacity(records.len());
    for record in records {
        let last = timestamps_of(repo, changes, cache, &record.last_commit)?;
        let next = match &record.next_commit {
            Some(next) => Some(timestamps_of(repo, changes, cache, next)?),
            None => None,
        };
        rows.push(LineSurvivalRow {
            repo_name: row.repo_name.clone(),
            sha: sha.to_string(),
            sha_filename: record.sha_filename,
            sha_line_no: record.sha_line_no,
            last_commit: record.last_commit,
            last_filename: record.last_filename,
            last_line_no: record.last_line_no,
            line: record.line,
            next_commit: record.next_commit,
            next_filename: record.next_filename,
            last_author_timestamp: Some(last.author),
            last_committer_timestamp: Some(last.committer),
            next_author_timestamp: next.map(|t| t.author),
            next_committer_timestamp: next.map(|t| t.committer),
        });
    }
    Ok(rows)
}

/// Compute the survival row (and per-line rows) for one targeted commit.
///
/// Every expected failure ends up in the returned row and in `stats`. Only a
/// commit that verifies as valid but for which git refuses to print the
/// metadata is returned as an error, and stops the batch. Metadata that is
/// printed but malformed, or that times out, marks just this commit.
pub fn process_single_commit(
    repo: &GitRepo,
    repo_name: &str,
    sha: Option<&str>,
    stats: &mut BatchStats,
    cache: &mut MetadataCache,
) -> Result<CommitOutcome, FatalError> {
    let mut row = CommitSurvivalRow::new(repo_name, sha);

    // 1. Does the SHA name a commit?
    let Some(sha) = sha.filter(|s| is_safe_revision(s)) else {
        debug!(repo_name, ?sha, "missing or unusable SHA");
        stats.n_invalid += 1;
        return Ok(CommitOutcome::stopped(CommitState::Invalid, row));
    };
    match repo.is_valid_commit(sha) {
        Ok(true) => row.sha_is_valid = true,
        Ok(false) => {
            debug!(repo_name, sha, "SHA does not resolve to a commit");
            stats.n_invalid += 1;
            return Ok(CommitOutcome::stopped(CommitState::Invalid, row));
        }
        Err(err) => return Ok(errored(row, err, stats)),
    }

    // 2. Metadata
    let metadata = match repo.get_commit_metadata(sha) {
        Ok(metadata) => metadata,
        Err(err @ (GitError::Parse(_) | GitError::Timeout { .. })) => {
            return Ok(errored(row, err, stats))
        }
        Err(source) => {
            return Err(FatalError::UnresolvableCommit {
                repo: repo.to_string(),
                sha: sha.to_string(),
                source,
            })
        }
    };
    cache.insert(metadata.id.as_str(), CommitTimestamps::from(&metadata));
    row.author_timestamp = Some(metadata.author.timestamp);
    row.committer_timestamp = Some(metadata.committer.timestamp);
    row.n_parents = Some(metadata.parents.len());
    let commit = metadata.id.as_str();
    let reference = repo.config().reference.as_str();

    // 3. Reachable from the reference?
    match repo.is_merged(commit, reference) {
        Ok(true) => row.is_merged_head = Some(true),
        Ok(false) => {
            debug!(repo_name, sha, reference, "commit not merged");
            row.is_merged_head = Some(false);
            row.error = Some(false);
            stats.n_unmerged += 1;
            return Ok(CommitOutcome::stopped(CommitState::Unmerged, row));
        }
        Err(err) => return Ok(errored(row, err, stats)),
    }

    // 4. Distance from the reference
    match repo.count_commits(&StartFrom::Rev(reference.to_string()), Some(commit), false) {
        Ok(count) => row.number_of_commits_from_head = Some(count),
        Err(err) => return Ok(errored(row, err, stats)),
    }

    // 5. Survival of the added lines
    let (summary, changes) = match survival::survival(repo, commit, None, cache) {
        Ok(result) => result,
        Err(err) => return Ok(errored(row, err, stats)),
    };
    let lines = match line_rows(repo, &row, sha, &changes, cache) {
        Ok(lines) => lines,
        Err(err) => return Ok(errored(row, err, stats)),
    };

    row.error = Some(false);
    row.change_lines_survived = Some(summary.lines_survived);
    row.change_lines_total = Some(summary.lines_total);
    row.min_died_committer_timestamp = summary.min_died_timestamp;
    stats.n_completed += 1;
    stats.lines_survived += summary.lines_survived;
    stats.lines_total += summary.lines_total;

    Ok(CommitOutcome {
        state: CommitState::Completed,
        row,
        lines,
    })
}

/// Output of a batch run, in input order.
#[derive(Debug, Default)]
pub struct BatchOutput {
    pub commits: Vec<CommitSurvivalRow>,
    pub lines: Vec<LineSurvivalRow>,
    pub stats: BatchStats,
}

/// Rows of the commit table that live in one repository.
struct RepositoryGroup<'a> {
    project: String,
    path: PathBuf,
    rows: Vec<(usize, &'a CommitRow)>,
}

struct GroupOutput {
    outcomes: Vec<(usize, CommitOutcome)>,
    stats: BatchStats,
}

fn process_group(group: RepositoryGroup<'_>, config: &SurvivalConfig) -> Result<GroupOutput, FatalError> {
    let mut stats = BatchStats::default();
    let repo = match GitRepo::open(&group.path, config.clone()) {
        Ok(repo) => repo,
        Err(err) => {
            warn!(project = %group.project, error = %err, "cannot open repository, skipping its rows");
            stats.n_skipped += group.rows.len();
            return Ok(GroupOutput {
                outcomes: Vec::new(),
                stats,
            });
        }
    };
    stats.repositories_opened += 1;
    info!(project = %group.project, path = %repo, rows = group.rows.len(), "processing repository");

    let mut cache = MetadataCache::new();
    let mut outcomes = Vec::with_capacity(group.rows.len());
    for (index, row) in group.rows {
        let outcome =
            process_single_commit(&repo, &row.repo_name, row.sha.as_deref(), &mut stats, &mut cache)?;
        outcomes.push((index, outcome));
    }

    let (hits, misses) = cache.stats();
    debug!(project = %group.project, hits, misses, cached = cache.len(), "metadata cache");
    Ok(GroupOutput { outcomes, stats })
}

fn process_sequential(
    groups: Vec<RepositoryGroup<'_>>,
    config: &SurvivalConfig,
    progress: &ProgressBar,
) -> Result<Vec<GroupOutput>, FatalError> {
    groups
        .into_iter()
        .progress_with(progress.clone())
        .map(|group| process_group(group, config))
        .collect()
}

/// Group rows by repository, keeping the order in which repositories first appear.
fn group_rows<'a>(
    rows: &'a [CommitRow],
    registry: &Registry,
    stats: &mut BatchStats,
) -> Vec<RepositoryGroup<'a>> {
    let mut groups: Vec<RepositoryGroup<'a>> = Vec::new();
    let mut by_project: HashMap<&str, usize> = HashMap::new();

    for (index, row) in rows.iter().enumerate() {
        let project = row.project();
        let Some(info) = registry.get(project) else {
            warn!(repo = %row.repo_name, "repository not in registry, skipping");
            stats.n_skipped += 1;
            continue;
        };
        let slot = *by_project.entry(project).or_insert_with(|| {
            groups.push(RepositoryGroup {
                project: project.to_string(),
                path: info.repository_path.clone(),
                rows: Vec::new(),
            });
            groups.len() - 1
        });
        groups[slot].rows.push((index, row));
    }
    groups
}

/// Compute survival for every row of the commit table.
///
/// Repositories are processed on `config.jobs` threads; `progress` advances
/// once per repository.
pub fn run_batch(
    rows: &[CommitRow],
    registry: &Registry,
    config: &SurvivalConfig,
    progress: &ProgressBar,
) -> Result<BatchOutput, FatalError> {
    let mut stats = BatchStats {
        n_rows: rows.len(),
        ..Default::default()
    };

    // 1. Group the table by repository
    let groups = group_rows(rows, registry, &mut stats);
    info!(rows = rows.len(), repositories = groups.len(), jobs = config.jobs, "starting batch");
    progress.set_length(groups.len() as u64);

    // 2. Process the repositories
    let results = if config.jobs > 1 {
        match rayon::ThreadPoolBuilder::new().num_threads(config.jobs).build() {
            Ok(pool) => pool.install(|| {
                groups
                    .into_par_iter()
                    .progress_with(progress.clone())
                    .map(|group| process_group(group, config))
                    .collect::<Result<Vec<_>, _>>()
            }),
            Err(err) => {
                warn!(error = %err, "cannot build thread pool, running sequentially");
                process_sequential(groups, config, progress)
            }
        }
    } else {
        process_sequential(groups, config, progress)
    }?;
    progress.finish_and_clear();

    // 3. Restore input order
    let mut outcomes: Vec<(usize, CommitOutcome)> = Vec::with_capacity(rows.len());
    for result in results {
        stats += result.stats;
        outcomes.extend(result.outcomes);
    }
    outcomes.sort_by_key(|(index, _)| *index);

    let mut output = BatchOutput {
        stats,
        ..Default::default()
    };
    for (_, outcome) in outcomes {
        output.commits.push(outcome.row);
        output.lines.extend(outcome.lines);
    }
    info!(commits = output.commits.len(), lines = output.lines.len(), "batch finished");
    Ok(output)
}
