use regex::Regex;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

/// Errors that can occur while building a matcher
#[derive(Error, Debug)]
pub enum FilterError {
    #[error("Invalid regex pattern '{pattern}': {source}")]
    InvalidRegex {
        pattern: String,
        source: regex::Error,
    },
}

/// Outcome of matching one event path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchDecision {
    /// Path matched and goes to the dispatch queue
    Accept,
    /// Path did not match and is dropped
    Skip,
}

/// A path that satisfied the configured pattern.
///
/// Only [`PathMatcher::accept`] builds one, so nothing unmatched can reach the
/// dispatch queue.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MatchedPath(PathBuf);

impl MatchedPath {
    pub fn as_path(&self) -> &Path {
        &self.0
    }

    pub fn into_path_buf(self) -> PathBuf {
        self.0
    }
}

/// Filters raw event paths against the configured pattern.
///
/// The pattern is anchored at the start of the path but not at the end, so
/// `/var/log/.*\.gz` accepts `/var/log/a.gz` as well as `/var/log/a.gz.tmp`.
/// Add a trailing `$` for full-string matching.
#[derive(Debug, Clone)]
pub struct PathMatcher {
    pattern: String,
    regex: Regex,
}

impl PathMatcher {
    pub fn new(pattern: &str) -> Result<Self, FilterError> {
        let regex =
            Regex::new(&format!("^(?:{})", pattern)).map_err(|e| FilterError::InvalidRegex {
                pattern: pattern.to_string(),
                source: e,
            })?;

        Ok(Self {
            pattern: pattern.to_string(),
            regex,
        })
    }

    /// Check if the path matches, without logging
    pub fn matches(&self, path: &Path) -> bool {
        self.regex.is_match(&path.to_string_lossy())
    }

    /// Match and log the decision
    pub fn evaluate(&self, path: &Path) -> MatchDecision {
        if self.matches(path) {
            info!(path = %path.display(), "Path matched, adding to queue");
            MatchDecision::Accept
        } else {
            debug!(path = %path.display(), "Path not matched, skipping");
            MatchDecision::Skip
        }
    }

    /// Wrap the path as a [`MatchedPath`] if it matches
    pub fn accept(&self, path: PathBuf) -> Option<MatchedPath> {
        match self.evaluate(&path) {
            MatchDecision::Accept => Some(MatchedPath(path)),
            MatchDecision::Skip => None,
        }
    }

    /// The pattern as configured, without the anchor
    pub fn pattern(&self) -> &str {
        &self.pattern
    }
}
