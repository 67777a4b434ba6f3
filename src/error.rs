//! # Error Handling
//!
//! This module defines the centralized error type for the `swap-deps`
//! library. It uses `thiserror` to build a single `Error` enum covering every
//! anticipated failure mode, each with enough context (file, repository, pid)
//! to tell the user which resource was involved.
//!
//! The variants fall into a few groups:
//!
//! - **User input**: `InvalidSpec` (malformed `org/repo#branch` strings) and
//!   `Validation` (missing paths, unknown dependencies, guarded directories).
//!   Both are reported before anything on disk is touched.
//! - **State**: `InconsistentState` when a backup exists next to a manifest
//!   that no longer looks swapped. Never resolved automatically.
//! - **Collaborators**: `Fetch` for git failures, `Build` for install/build
//!   commands, `Process` for watch-process signalling.
//! - **Files**: `Parse` for malformed manifests, `Registry` for the watch
//!   registry, plus wrapped I/O and serialization errors.
//! - **Batches**: `Aggregate` groups several independent failures so they can
//!   be reported together.

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for swap-deps operations
#[derive(Error, Debug)]
pub enum Error {
    /// A repository reference such as `org/repo#branch` could not be parsed.
    #[error("Invalid repository spec '{spec}': {message}")]
    InvalidSpec { spec: String, message: String },

    /// A precondition failed before any mutation took place.
    #[error("Validation failed: {message}")]
    Validation { message: String },

    /// A backup exists but the live manifest is not in a swapped state.
    #[error("Inconsistent state for {}: {message}", path.display())]
    InconsistentState { path: PathBuf, message: String },

    /// A git operation against a remote repository failed.
    #[error("Failed to fetch {repository}@{r#ref}: {message}")]
    Fetch {
        repository: String,
        r#ref: String,
        message: String,
    },

    /// A manifest could not be parsed. The file is left untouched.
    #[error("Failed to parse {}: {message}", path.display())]
    Parse { path: PathBuf, message: String },

    /// An install, build or watch command failed.
    #[error("Build step failed for {target}: {message}")]
    Build { target: String, message: String },

    /// Signalling or inspecting a process failed.
    #[error("Process {pid}: {message}")]
    Process { pid: u32, message: String },

    /// The watch registry file could not be read or written.
    #[error("Watch registry error at {}: {message}", path.display())]
    Registry { path: PathBuf, message: String },

    /// Several independent failures gathered during one phase.
    #[error("{} errors: {}", errors.len(), errors.iter().map(|e| e.to_string()).collect::<Vec<_>>().join("; "))]
    Aggregate { errors: Vec<Error> },

    /// An I/O error, wrapped from `std::io::Error`.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A YAML parsing error, wrapped from `serde_yaml::Error`.
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// A JSON error, wrapped from `serde_json::Error`.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A regular expression error, wrapped from `regex::Error`.
    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),

    /// A glob pattern error, wrapped from `glob::PatternError`.
    #[error("Glob pattern error: {0}")]
    Glob(#[from] glob::PatternError),

    /// A URL parsing error, wrapped from `url::ParseError`.
    #[error("URL parsing error: {0}")]
    UrlParse(#[from] url::ParseError),
}

impl Error {
    /// Collapse a list of errors into one: the error itself when there is
    /// exactly one, an `Aggregate` otherwise. Returns `None` for an empty list.
    pub fn from_batch(mut errors: Vec<Error>) -> Option<Error> {
        match errors.len() {
            0 => None,
            1 => errors.pop(),
            _ => Some(Error::Aggregate { errors }),
        }
    }
}

/// A convenient type alias for `Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_invalid_spec() {
        let error = Error::InvalidSpec {
            spec: "shakacode/".to_string(),
            message: "repository name is empty".to_string(),
        };
        let display = format!("{}", error);
        assert!(display.contains("Invalid repository spec"));
        assert!(display.contains("shakacode/"));
        assert!(display.contains("repository name is empty"));
    }

    #[test]
    fn test_error_display_inconsistent_state() {
        let error = Error::InconsistentState {
            path: PathBuf::from("/tmp/demo/Gemfile"),
            message: "backup exists but manifest is not swapped".to_string(),
        };
        let display = format!("{}", error);
        assert!(display.contains("/tmp/demo/Gemfile"));
        assert!(display.contains("not swapped"));
    }

    #[test]
    fn test_error_display_fetch() {
        let error = Error::Fetch {
            repository: "shakacode/shakapacker".to_string(),
            r#ref: "main".to_string(),
            message: "Repository not found".to_string(),
        };
        let display = format!("{}", error);
        assert_eq!(
            display,
            "Failed to fetch shakacode/shakapacker@main: Repository not found"
        );
    }

    #[test]
    fn test_error_display_process() {
        let error = Error::Process {
            pid: 4242,
            message: "permission denied".to_string(),
        };
        assert_eq!(format!("{}", error), "Process 4242: permission denied");
    }

    #[test]
    fn test_from_batch() {
        assert!(Error::from_batch(Vec::new()).is_none());

        let single = Error::from_batch(vec![Error::Validation {
            message: "one".to_string(),
        }])
        .unwrap();
        assert!(matches!(single, Error::Validation { .. }));

        let many = Error::from_batch(vec![
            Error::Validation {
                message: "one".to_string(),
            },
            Error::Validation {
                message: "two".to_string(),
            },
        ])
        .unwrap();
        let display = many.to_string();
        assert!(display.starts_with("2 errors"));
        assert!(display.contains("one"));
        assert!(display.contains("two"));
    }

    #[test]
    fn test_error_from_io_error() {
        let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "File not found");
        let error: Error = io_error.into();
        let display = format!("{}", error);
        assert!(display.contains("I/O error"));
        assert!(display.contains("File not found"));
    }

    #[test]
    fn test_error_from_json_error() {
        let json_error = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let error: Error = json_error.into();
        assert!(format!("{}", error).contains("JSON error"));
    }

    #[test]
    fn test_error_from_yaml_error() {
        let yaml_str = "invalid: [unclosed";
        let yaml_error = serde_yaml::from_str::<serde_yaml::Value>(yaml_str).unwrap_err();
        let error: Error = yaml_error.into();
        let display = format!("{}", error);
        assert!(display.contains("YAML parsing error"));
    }
}
