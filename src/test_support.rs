// src/test_support.rs

//! Small repositories built with git2 for the tests.

use crate::config::SurvivalConfig;
use crate::error::GitResult;
use crate::git::{GitCli, GitOutput, GitRepo, Oracle};
use git2::{Oid, Repository, RepositoryInitOptions, Signature, Time};
use std::path::Path;
use tempfile::TempDir;

/// Committer time of the first fixture commit.
pub const BASE_TIME: i64 = 1_700_000_000;
/// Seconds between consecutive fixture commits.
pub const STEP: i64 = 3_600;

const FILE_F: &str = "line 1\nline 2\nline 3\nline 4\nline 5\n";

pub struct FixtureRepo {
    pub dir: TempDir,
    pub root: String,
    pub change: String,
    pub side: Option<String>,
    pub copy: Option<String>,
    pub deletion: Option<String>,
    commit_count: i64,
}

impl FixtureRepo {
    fn init() -> (TempDir, Repository) {
        let dir = tempfile::tempdir().unwrap();
        let mut opts = RepositoryInitOptions::new();
        opts.initial_head("main");
        let repo = Repository::init_opts(dir.path(), &opts).unwrap();
        let mut config = repo.config().unwrap();
        config.set_str("user.name", "A U Thor").unwrap();
        config.set_str("user.email", "author@example.com").unwrap();
        (dir, repo)
    }

    /// Write `files` (path, contents) and commit them on HEAD.
    fn commit(repo: &Repository, time: i64, message: &str, files: &[(&str, &str)]) -> String {
        let workdir = repo.workdir().unwrap().to_path_buf();
        let mut index = repo.index().unwrap();
        for (path, contents) in files {
            std::fs::write(workdir.join(path), contents).unwrap();
            index.add_path(Path::new(path)).unwrap();
        }
        index.write().unwrap();
        let tree = repo.find_tree(index.write_tree().unwrap()).unwrap();

        let author = Signature::new("A U Thor", "author@example.com", &Time::new(time - 60, 0)).unwrap();
        let committer = Signature::new("C O Mitter", "committer@example.com", &Time::new(time, 0)).unwrap();
        let parent = repo.head().ok().and_then(|h| h.peel_to_commit().ok());
        let parents: Vec<&git2::Commit> = parent.iter().collect();
        repo.commit(Some("HEAD"), &author, &committer, message, &tree, &parents)
            .unwrap()
            .to_string()
    }

    fn next_time(&mut self) -> i64 {
        self.commit_count += 1;
        BASE_TIME + STEP * self.commit_count
    }

    /// Root commit adding `f` with five lines, then a commit changing line 4.
    pub fn scenario() -> Self {
        let (dir, repo) = Self::init();
        let root = Self::commit(&repo, BASE_TIME, "Initial commit\n", &[("f", FILE_F)]);
        let changed = FILE_F.replace("line 4\n", "line 4 changed\n");
        let change = Self::commit(&repo, BASE_TIME + STEP, "Change line 4\n", &[("f", &changed)]);
        FixtureRepo {
            dir,
            root,
            change,
            side: None,
            copy: None,
            deletion: None,
            commit_count: 1,
        }
    }

    /// Like [`FixtureRepo::scenario`], but the second commit only adds an unrelated file.
    pub fn scenario_untouched() -> Self {
        let (dir, repo) = Self::init();
        let root = Self::commit(&repo, BASE_TIME, "Initial commit\n", &[("f", FILE_F)]);
        let change = Self::commit(&repo, BASE_TIME + STEP, "Add h\n", &[("h", "unrelated\n")]);
        FixtureRepo {
            dir,
            root,
            change,
            side: None,
            copy: None,
            deletion: None,
            commit_count: 1,
        }
    }

    /// [`FixtureRepo::scenario`] plus `refs/heads/side`, one commit off the root.
    pub fn scenario_with_side_branch() -> Self {
        let mut fixture = Self::scenario();
        let time = fixture.next_time();
        let repo = fixture.repository();
        let root = repo.find_commit(Oid::from_str(&fixture.root).unwrap()).unwrap();

        let blob = repo.blob(b"side work\n").unwrap();
        let mut builder = repo.treebuilder(Some(&root.tree().unwrap())).unwrap();
        builder.insert("side.txt", blob, 0o100644).unwrap();
        let tree = repo.find_tree(builder.write().unwrap()).unwrap();

        let sig = Signature::new("S I De", "side@example.com", &Time::new(time, 0)).unwrap();
        let side = repo
            .commit(Some("refs/heads/side"), &sig, &sig, "Side work\n", &tree, &[&root])
            .unwrap();
        fixture.side = Some(side.to_string());
        fixture
    }

    /// [`FixtureRepo::scenario`], then `g` copied from `f` with line 2 edited,
    /// then a commit that only deletes line 1 of `f`.
    pub fn history() -> Self {
        let mut fixture = Self::scenario();
        let repo = fixture.repository();

        let f = FILE_F.replace("line 4\n", "line 4 changed\n");
        let g = f.replace("line 2\n", "line 2 copied\n");
        let time = fixture.next_time();
        fixture.copy = Some(Self::commit(&repo, time, "Copy f to g\n", &[("g", &g)]));

        let trimmed = f.replacen("line 1\n", "", 1);
        let time = fixture.next_time();
        fixture.deletion = Some(Self::commit(&repo, time, "Drop line 1\n", &[("f", &trimmed)]));
        fixture
    }

    pub fn repository(&self) -> Repository {
        Repository::open(self.dir.path()).unwrap()
    }

    pub fn tree_of(&self, commit: &str) -> String {
        let repo = self.repository();
        let commit = repo.find_commit(Oid::from_str(commit).unwrap()).unwrap();
        commit.tree_id().to_string()
    }

    /// Store `body` as a commit object as is, without checking its headers.
    pub fn write_raw_commit(&self, body: &str) -> String {
        let repo = self.repository();
        let odb = repo.odb().unwrap();
        odb.write(git2::ObjectType::Commit, body.as_bytes())
            .unwrap()
            .to_string()
    }

    /// Every commit of the fixture on the main branch, oldest first.
    pub fn commits(&self) -> Vec<String> {
        let mut commits = vec![self.root.clone(), self.change.clone()];
        commits.extend(self.copy.clone());
        commits.extend(self.deletion.clone());
        commits
    }

    pub fn git_repo(&self) -> GitRepo {
        self.git_repo_with(SurvivalConfig::default())
    }

    pub fn git_repo_with(&self, config: SurvivalConfig) -> GitRepo {
        GitRepo::open(self.dir.path(), config).unwrap()
    }

    /// Query the fixture through `oracle`.
    pub fn git_repo_with_oracle(&self, oracle: impl Oracle + 'static) -> GitRepo {
        GitRepo::with_oracle(
            self.dir.path().to_path_buf(),
            SurvivalConfig::default(),
            Box::new(oracle),
        )
    }
}

/// Runs real git, but cuts `blame` output short whenever the blamed range
/// starts at `commit`.
pub struct TruncatedBlame {
    pub inner: GitCli,
    pub commit: String,
}

impl TruncatedBlame {
    pub fn new(commit: &str) -> Self {
        TruncatedBlame {
            inner: GitCli::new("git", None),
            commit: commit.to_string(),
        }
    }
}

impl Oracle for TruncatedBlame {
    fn execute(&self, args: &[&str], workdir: &Path) -> GitResult<GitOutput> {
        let mut output = self.inner.execute(args, workdir)?;
        let range = format!("{}..", self.commit);
        if args.first() == Some(&"blame") && args.iter().any(|a| a.starts_with(&range)) {
            // drop the final content line
            let text = String::from_utf8_lossy(&output.stdout).into_owned();
            let cut = text.trim_end_matches('\n').rfind('\n').map_or(0, |i| i + 1);
            output.stdout = text.as_bytes()[..cut].to_vec();
        }
        Ok(output)
    }
}
