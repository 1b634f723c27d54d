// src/cli.rs

use clap::Parser;
use line_survival::config::SurvivalConfig;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// JSON array of targeted commits: `{"RepoName": "owner/repo", "Sha": "..."}`
    #[arg(short, long)]
    pub commits: PathBuf,

    /// JSON array of cloned repositories: `{"project", "repository_url", "repository_path"}`
    #[arg(short, long)]
    pub repositories: PathBuf,

    /// Where to write the per-commit survival rows
    #[arg(short, long)]
    pub output: PathBuf,

    /// Where to write the per-line survival rows
    #[arg(short, long)]
    pub lines_output: Option<PathBuf>,

    /// Reference that survival is measured against
    #[arg(long, default_value = "HEAD")]
    pub reference: String,

    /// Timeout for a single git invocation, in seconds (0 waits forever)
    #[arg(long, default_value_t = 600)]
    pub timeout: u64,

    /// Blame files that the commit created as a whole, not by line extents
    #[arg(long)]
    pub addition_optimization: bool,

    /// Number of repositories processed in parallel
    #[arg(short, long, default_value_t = 1)]
    pub jobs: usize,

    /// The git binary to run
    #[arg(long, env = "LINE_SURVIVAL_GIT", default_value = "git")]
    pub git: String,

    /// Write JSON Lines instead of a JSON array
    #[arg(long)]
    pub jsonl: bool,

    /// Log every git invocation
    #[arg(short, long)]
    pub verbose: bool,

    /// Hide the progress bar
    #[arg(short, long)]
    pub quiet: bool,
}

impl Args {
    pub fn survival_config(&self) -> SurvivalConfig {
        SurvivalConfig {
            git_binary: self.git.clone(),
            jobs: self.jobs.max(1),
            ..SurvivalConfig::default()
        }
        .with_reference(self.reference.as_str())
        .with_timeout_secs(self.timeout)
        .with_addition_optimization(self.addition_optimization)
    }
}
