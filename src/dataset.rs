// src/dataset.rs

//! Input and output records of a batch run, and their JSON files.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// One targeted commit of the input table.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct CommitRow {
    /// `owner/repo`
    #[serde(rename = "RepoName")]
    pub repo_name: String,
    #[serde(rename = "Sha", default)]
    pub sha: Option<String>,
}

impl CommitRow {
    /// Registry key: the last path component of `RepoName`.
    pub fn project(&self) -> &str {
        self.repo_name
            .rsplit('/')
            .next()
            .unwrap_or(self.repo_name.as_str())
    }
}

/// Where a project's working copy was cloned.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct RepositoryInfo {
    pub project: String,
    #[serde(default)]
    pub repository_url: Option<String>,
    pub repository_path: PathBuf,
}

/// Cloned repositories by project name.
pub type Registry = HashMap<String, RepositoryInfo>;

/// Survival of one targeted commit.
///
/// Fields after `ShaIsValid` stay empty once processing stops early:
/// invalid SHA, commit not merged, or a per-commit error.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitSurvivalRow {
    #[serde(rename = "RepoName")]
    pub repo_name: String,
    #[serde(rename = "Sha")]
    pub sha: Option<String>,
    #[serde(rename = "ShaIsValid")]
    pub sha_is_valid: bool,
    pub author_timestamp: Option<i64>,
    pub committer_timestamp: Option<i64>,
    pub n_parents: Option<usize>,
    #[serde(rename = "isMergedHEAD")]
    pub is_merged_head: Option<bool>,
    #[serde(rename = "numberOfCommitsFromHEAD")]
    pub number_of_commits_from_head: Option<u64>,
    pub error: Option<bool>,
    pub change_lines_survived: Option<usize>,
    pub change_lines_total: Option<usize>,
    pub min_died_committer_timestamp: Option<i64>,
}

impl CommitSurvivalRow {
    pub fn new(repo_name: &str, sha: Option<&str>) -> Self {
        CommitSurvivalRow {
            repo_name: repo_name.to_string(),
            sha: sha.map(str::to_string),
            ..Default::default()
        }
    }
}

/// Provenance of one line added by a targeted commit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineSurvivalRow {
    #[serde(rename = "RepoName")]
    pub repo_name: String,
    #[serde(rename = "Sha")]
    pub sha: String,
    #[serde(rename = "ShaFilename")]
    pub sha_filename: String,
    #[serde(rename = "ShaLineNo")]
    pub sha_line_no: u32,
    pub last_commit: String,
    pub last_filename: String,
    pub last_line_no: u32,
    pub line: String,
    pub next_commit: Option<String>,
    pub next_filename: Option<String>,
    pub last_author_timestamp: Option<i64>,
    pub last_committer_timestamp: Option<i64>,
    pub next_author_timestamp: Option<i64>,
    pub next_committer_timestamp: Option<i64>,
}

/// Read the commit table, a JSON array of `{"RepoName", "Sha"}` objects.
pub fn load_commit_rows(path: &Path) -> Result<Vec<CommitRow>> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read commit table {}", path.display()))?;
    serde_json::from_str(&text)
        .with_context(|| format!("Failed to parse commit table {}", path.display()))
}

/// Read the repository registry.
///
/// Relative `repository_path` entries are taken relative to the directory
/// holding the registry file.
pub fn load_registry(path: &Path) -> Result<Registry> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read repository registry {}", path.display()))?;
    let entries: Vec<RepositoryInfo> = serde_json::from_str(&text)
        .with_context(|| format!("Failed to parse repository registry {}", path.display()))?;

    let base = path.parent().unwrap_or(Path::new(""));
    Ok(entries
        .into_iter()
        .map(|mut info| {
            if info.repository_path.is_relative() {
                info.repository_path = base.join(&info.repository_path);
            }
            (info.project.clone(), info)
        })
        .collect())
}

/// Write `records` as a JSON array, or one object per line with `jsonl`.
pub fn write_records<T: Serialize>(path: &Path, records: &[T], jsonl: bool) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create output directory {}", parent.display()))?;
    }
    let file =
        File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    let mut writer = BufWriter::new(file);

    if jsonl {
        for record in records {
            serde_json::to_writer(&mut writer, record)?;
            writer.write_all(b"\n")?;
        }
    } else {
        serde_json::to_writer_pretty(&mut writer, records)?;
        writer.write_all(b"\n")?;
    }
    writer
        .flush()
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_commit_rows_with_missing_sha() {
        let rows: Vec<CommitRow> = serde_json::from_str(
            r#"[
                {"RepoName": "owner/project", "Sha": "abc"},
                {"RepoName": "owner/project", "Sha": null},
                {"RepoName": "other/thing"}
            ]"#,
        )
        .unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].sha.as_deref(), Some("abc"));
        assert_eq!(rows[1].sha, None);
        assert_eq!(rows[2].sha, None);
        assert_eq!(rows[0].project(), "project");
        assert_eq!(rows[2].project(), "thing");
    }

    #[test]
    fn test_load_registry_resolves_relative_paths() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("repositories.json");
        fs::write(
            &path,
            r#"[
                {"project": "a", "repository_url": "https://example.com/o/a", "repository_path": "clones/a"},
                {"project": "b", "repository_path": "/srv/b"}
            ]"#,
        )
        .unwrap();

        let registry = load_registry(&path).unwrap();
        assert_eq!(registry.len(), 2);
        assert_eq!(registry["a"].repository_path, dir.path().join("clones/a"));
        assert_eq!(registry["b"].repository_path, PathBuf::from("/srv/b"));
        assert_eq!(registry["b"].repository_url, None);
    }

    #[test]
    fn test_row_field_names() {
        let mut row = CommitSurvivalRow::new("o/p", Some("abc"));
        row.is_merged_head = Some(true);
        row.min_died_committer_timestamp = Some(5);
        let value = serde_json::to_value(&row).unwrap();
        assert_eq!(value["RepoName"], "o/p");
        assert_eq!(value["ShaIsValid"], false);
        assert_eq!(value["isMergedHEAD"], true);
        assert_eq!(value["minDiedCommitterTimestamp"], 5);
        assert!(value["numberOfCommitsFromHEAD"].is_null());
        assert!(value["changeLinesTotal"].is_null());

        let line = serde_json::to_value(LineSurvivalRow::default()).unwrap();
        for key in ["ShaFilename", "ShaLineNo", "lastCommit", "nextFilename", "nextCommitterTimestamp"] {
            assert!(line.get(key).is_some(), "{key}");
        }
    }

    #[test]
    fn test_write_records_json_and_jsonl() {
        let dir = tempfile::tempdir().unwrap();
        let rows = vec![
            CommitSurvivalRow::new("o/p", Some("a")),
            CommitSurvivalRow::new("o/p", None),
        ];

        let json = dir.path().join("out/commits.json");
        write_records(&json, &rows, false).unwrap();
        let back: Vec<CommitSurvivalRow> =
            serde_json::from_str(&fs::read_to_string(&json).unwrap()).unwrap();
        assert_eq!(back, rows);

        let jsonl = dir.path().join("commits.jsonl");
        write_records(&jsonl, &rows, true).unwrap();
        let text = fs::read_to_string(&jsonl).unwrap();
        assert_eq!(text.lines().count(), 2);
    }
}
