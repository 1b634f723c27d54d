// src/config.rs

use std::time::Duration;

/// Settings for one survival run, handed to every repository handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SurvivalConfig {
    /// Program invoked for every git query
    pub git_binary: String,
    /// Reference that survival is measured against
    pub reference: String,
    /// Upper bound for a single git invocation; `None` waits forever
    pub timeout: Option<Duration>,
    /// Blame files added by the commit as a whole instead of by extents
    pub addition_optimization: bool,
    /// Number of repositories processed concurrently
    pub jobs: usize,
}

impl Default for SurvivalConfig {
    fn default() -> Self {
        SurvivalConfig {
            git_binary: "git".to_string(),
            reference: "HEAD".to_string(),
            timeout: Some(Duration::from_secs(600)),
            addition_optimization: false,
            jobs: 1,
        }
    }
}

impl SurvivalConfig {
    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = reference.into();
        self
    }

    pub fn with_addition_optimization(mut self, enabled: bool) -> Self {
        self.addition_optimization = enabled;
        self
    }

    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout = (secs > 0).then(|| Duration::from_secs(secs));
        self
    }
}
