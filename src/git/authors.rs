// src/git/authors.rs

use super::{GitRepo, StartFrom};
use crate::error::{GitResult, ParseError};
use serde::Serialize;

/// Number of commits of one author
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthorStat {
    pub author: String,
    pub count: u64,
}

/// Parse `git shortlog --summary` lines: `SPACE* <count> TAB <author>`.
pub fn parse_shortlog_count(text: &str) -> Result<Vec<AuthorStat>, ParseError> {
    let mut stats = Vec::new();
    for line in text.lines().filter(|l| !l.trim().is_empty()) {
        let (count, author) = line
            .split_once('\t')
            .ok_or_else(|| ParseError::Shortlog(line.to_string()))?;
        let count = count.trim();
        stats.push(AuthorStat {
            author: author.to_string(),
            count: count
                .parse()
                .map_err(|_| ParseError::Number(count.to_string()))?,
        });
    }
    Ok(stats)
}

/// Pick the smallest set of top contributors whose commits add up to more
/// than `perc` of all commits.
///
/// Authors tied with the last one picked are included as well. Returns the
/// authors, most commits first, and the fraction of commits they cover.
pub fn select_core_authors(mut stats: Vec<AuthorStat>, perc: f64) -> (Vec<AuthorStat>, f64) {
    stats.sort_by(|a, b| b.count.cmp(&a.count));
    let total: u64 = stats.iter().map(|s| s.count).sum();
    if total == 0 {
        return (Vec::new(), 0.0);
    }

    let mut running = 0;
    let mut picked = 0;
    for stat in &stats {
        running += stat.count;
        picked += 1;
        if running as f64 > perc * total as f64 {
            break;
        }
    }
    let last_count = stats[picked - 1].count;
    while picked < stats.len() && stats[picked].count == last_count {
        running += stats[picked].count;
        picked += 1;
    }

    stats.truncate(picked);
    (stats, running as f64 / total as f64)
}

impl GitRepo {
    /// Raw `git shortlog --summary -n` output, authors by commit count.
    pub fn list_authors_shortlog(&self, start_from: &StartFrom) -> GitResult<String> {
        self.run_text(&["shortlog", "--summary", "-n", start_from.as_arg()])
    }

    /// Authors covering more than `perc` of the commits reachable from `start_from`.
    pub fn list_core_authors(
        &self,
        start_from: &StartFrom,
        perc: f64,
    ) -> GitResult<(Vec<AuthorStat>, f64)> {
        let text = self.list_authors_shortlog(start_from)?;
        Ok(select_core_authors(parse_shortlog_count(&text)?, perc))
    }
}
