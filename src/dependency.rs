//! # Managed Dependencies
//!
//! The closed set of libraries `swap-deps` knows how to redirect, and the
//! `DependencyTarget` describing where a swapped dependency should point.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::refspec::RefSpec;
use crate::suggestions;

/// A library whose Gemfile (and possibly package.json) declaration can be
/// swapped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Dependency {
    Shakapacker,
    ReactOnRails,
    CypressOnRails,
}

/// The npm side of a dependency.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NpmPackage {
    /// Published on npm under this name; lives at the root of the gem checkout.
    Published(&'static str),
    /// Ruby-only; nothing to rewrite in package.json and nothing to build.
    GemOnly,
}

impl Dependency {
    pub const ALL: [Dependency; 3] = [
        Dependency::Shakapacker,
        Dependency::ReactOnRails,
        Dependency::CypressOnRails,
    ];

    /// Name as written in a Gemfile.
    pub fn gem_name(self) -> &'static str {
        match self {
            Dependency::Shakapacker => "shakapacker",
            Dependency::ReactOnRails => "react_on_rails",
            Dependency::CypressOnRails => "cypress-on-rails",
        }
    }

    pub fn npm_package(self) -> NpmPackage {
        match self {
            Dependency::Shakapacker => NpmPackage::Published("shakapacker"),
            Dependency::ReactOnRails => NpmPackage::Published("react-on-rails"),
            Dependency::CypressOnRails => NpmPackage::GemOnly,
        }
    }

    /// Upstream repository, used when a config entry gives only a branch.
    pub fn default_repository(self) -> &'static str {
        match self {
            Dependency::Shakapacker => "shakacode/shakapacker",
            Dependency::ReactOnRails => "shakacode/react_on_rails",
            Dependency::CypressOnRails => "shakacode/cypress-on-rails",
        }
    }

    /// Look a dependency up by gem name, npm name or CLI flag spelling.
    /// Underscores and hyphens are interchangeable.
    pub fn from_name(name: &str) -> Option<Dependency> {
        let wanted = normalize(name);
        Dependency::ALL
            .into_iter()
            .find(|dep| normalize(dep.gem_name()) == wanted)
    }

    /// Pick the dependency a repository provides from its name
    /// (`shakacode/react_on_rails` -> `ReactOnRails`).
    pub fn from_repository(spec: &RefSpec) -> Result<Dependency> {
        Dependency::from_name(spec.name()).ok_or_else(|| Error::Validation {
            message: format!(
                "repository '{}' does not provide a supported dependency ({})",
                spec.repository(),
                supported_names()
            ),
        })
    }
}

impl fmt::Display for Dependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.gem_name())
    }
}

impl FromStr for Dependency {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Dependency::from_name(s).ok_or_else(|| suggestions::unknown_dependency(s))
    }
}

fn normalize(name: &str) -> String {
    name.trim().to_ascii_lowercase().replace('_', "-")
}

/// Comma-separated list of supported gem names, for messages.
pub fn supported_names() -> String {
    Dependency::ALL
        .iter()
        .map(|d| d.gem_name())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Where a swapped dependency points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    /// A checkout on the local filesystem (absolute path).
    Local { path: PathBuf },
    /// A GitHub repository. `cache_path` is set once the cache has
    /// materialized the ref locally.
    Remote {
        refspec: RefSpec,
        cache_path: Option<PathBuf>,
    },
}

/// One dependency and its replacement source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyTarget {
    pub dependency: Dependency,
    pub source: Source,
}

impl DependencyTarget {
    pub fn local(dependency: Dependency, path: impl Into<PathBuf>) -> Self {
        Self {
            dependency,
            source: Source::Local { path: path.into() },
        }
    }

    pub fn remote(dependency: Dependency, refspec: RefSpec) -> Self {
        Self {
            dependency,
            source: Source::Remote {
                refspec,
                cache_path: None,
            },
        }
    }

    /// Directory holding the package on disk: the local path, or the cache
    /// checkout once materialized.
    pub fn package_dir(&self) -> Option<&Path> {
        match &self.source {
            Source::Local { path } => Some(path),
            Source::Remote { cache_path, .. } => cache_path.as_deref(),
        }
    }

    /// Short description of the source for messages.
    pub fn describe_source(&self) -> String {
        match &self.source {
            Source::Local { path } => path.display().to_string(),
            Source::Remote { refspec, .. } => format!("github:{}", refspec),
        }
    }
}
