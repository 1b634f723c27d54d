// src/lib.rs

//! Line survival analysis for commits in local git repositories.
//!
//! For a commit, the lines it added are traced forward with `git blame
//! --reverse` up to a reference (usually `HEAD`), to find out which of
//! them are still present unchanged and when the others were altered.

pub mod batch;
pub mod cache;
pub mod config;
pub mod dataset;
pub mod error;
pub mod git;
pub mod model;
pub mod survival;

#[cfg(test)]
mod test_support;
