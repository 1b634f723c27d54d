// src/git/refs.rs

use super::GitRepo;
use crate::error::GitResult;

impl GitRepo {
    /// Full object name of `obj`, or `None` when it does not resolve.
    pub fn to_oid(&self, obj: &str) -> GitResult<Option<String>> {
        let output = self.run_accepting(
            &["rev-parse", "--quiet", "--verify", "--end-of-options", obj],
            &[1],
        )?;
        if !output.success() {
            return Ok(None);
        }
        let oid = output.text().trim().to_string();
        Ok((!oid.is_empty()).then_some(oid))
    }

    /// Whether `commit` names a commit object in this repository.
    pub fn is_valid_commit(&self, commit: &str) -> GitResult<bool> {
        Ok(self.to_oid(&format!("{commit}^{{commit}}"))?.is_some())
    }

    /// The ref a symbolic ref points to; `None` when it is not symbolic (e.g. detached HEAD).
    pub fn resolve_symbolic_ref(&self, name: &str) -> GitResult<Option<String>> {
        let output = self.run_accepting(&["symbolic-ref", "--quiet", name], &[1])?;
        if !output.success() {
            return Ok(None);
        }
        Ok(Some(output.text().trim().to_string()))
    }

    /// Short name of the checked-out branch.
    pub fn current_branch(&self) -> GitResult<Option<String>> {
        let output = self.run_accepting(&["symbolic-ref", "--quiet", "--short", "HEAD"], &[1])?;
        if !output.success() {
            return Ok(None);
        }
        Ok(Some(output.text().trim().to_string()))
    }

    /// Expand `HEAD` among `patterns` to the branch it points to; a detached HEAD drops out.
    fn expand_ref_patterns(&self, patterns: &[&str]) -> GitResult<Vec<String>> {
        let mut refs = Vec::with_capacity(patterns.len());
        for &pattern in patterns {
            if pattern == "HEAD" {
                refs.extend(self.resolve_symbolic_ref(pattern)?);
            } else {
                refs.push(pattern.to_string());
            }
        }
        Ok(refs)
    }

    /// Refs matching any of `patterns` that contain `commit`.
    ///
    /// Patterns follow `git for-each-ref`: fnmatch globs, or literal prefixes
    /// ending at a slash.
    pub fn check_merged_into(&self, commit: &str, patterns: &[&str]) -> GitResult<Vec<String>> {
        let refs = self.expand_ref_patterns(patterns)?;
        let contains = format!("--contains={commit}");
        let mut args = vec!["for-each-ref", contains.as_str(), "--format=%(refname)"];
        args.extend(refs.iter().map(String::as_str));
        let text = self.run_text(&args)?;
        Ok(text.lines().map(str::to_string).collect())
    }

    /// Whether `ancestor` is reachable from `descendant`.
    pub fn is_ancestor(&self, ancestor: &str, descendant: &str) -> GitResult<bool> {
        let output = self.run_accepting(&["merge-base", "--is-ancestor", ancestor, descendant], &[1])?;
        Ok(output.success())
    }

    /// Full ref name behind `name`, e.g. `main` as `refs/heads/main`.
    ///
    /// `None` for object names and for anything that does not resolve.
    pub fn symbolic_full_name(&self, name: &str) -> GitResult<Option<String>> {
        let output = self.run_accepting(
            &["rev-parse", "--symbolic-full-name", "--end-of-options", name],
            &[128],
        )?;
        let full = output.text().trim().to_string();
        Ok((output.success() && full.starts_with("refs/")).then_some(full))
    }

    /// Whether `commit` is part of the history of `reference`.
    ///
    /// `reference` may be `HEAD`, a full or short ref name, or any other
    /// revision; an unresolvable reference contains nothing.
    pub fn is_merged(&self, commit: &str, reference: &str) -> GitResult<bool> {
        if reference == "HEAD" {
            if self.resolve_symbolic_ref("HEAD")?.is_none() {
                // detached HEAD has no ref to list, ask about the commit itself
                return self.is_ancestor(commit, "HEAD");
            }
            return Ok(!self.check_merged_into(commit, &["HEAD"])?.is_empty());
        }
        if let Some(full) = self.symbolic_full_name(reference)? {
            return Ok(!self.check_merged_into(commit, &[full.as_str()])?.is_empty());
        }
        if self.to_oid(reference)?.is_none() {
            return Ok(false);
        }
        self.is_ancestor(commit, reference)
    }

    /// Create a lightweight tag.
    pub fn create_tag(&self, name: &str, commit: &str) -> GitResult<()> {
        self.run(&["tag", name, commit])?;
        Ok(())
    }

    pub fn list_tags(&self) -> GitResult<Vec<String>> {
        let text = self.run_text(&["tag", "--list"])?;
        Ok(text.lines().map(|l| l.trim_end().to_string()).collect())
    }
}
