//! Shared test utilities for integration and E2E tests.
//!
//! This module provides common fixtures and helper functions to reduce
//! duplication across test files.
//!
//! ## Usage
//!
//! Add `mod common;` to your test file, then use the helpers:
//!
//! ```rust,ignore
//! mod common;
//! use common::prelude::*;
//!
//! #[test]
//! fn test_example() {
//!     let fixture = TestFixture::new().with_demo_project("app");
//!     fixture.command().arg("--status").assert().success();
//! }
//! ```

use assert_fs::prelude::*;
use std::path::{Path, PathBuf};

/// Re-export commonly used test dependencies for convenience.
pub mod prelude {
    #[allow(unused_imports)]
    pub use assert_cmd::cargo::cargo_bin_cmd;
    pub use assert_fs::prelude::*;
    #[allow(unused_imports)]
    pub use assert_fs::TempDir;
    pub use predicates::prelude::*;

    #[allow(unused_imports)]
    pub use super::manifests;
    pub use super::TestFixture;
}

/// Manifest contents used across tests.
#[allow(dead_code)]
pub mod manifests {
    pub const GEMFILE: &str = r#"source "https://rubygems.org"

gem "rails", "~> 7.1"
gem "shakapacker", "~> 8.0"
gem "react_on_rails", "14.0.5"

group :test do
  gem "cypress-on-rails", "~> 1.0"
end
"#;

    pub const PACKAGE_JSON: &str = r#"{
  "name": "demo",
  "private": true,
  "dependencies": {
    "react": "^18.2.0",
    "react-on-rails": "14.0.5",
    "shakapacker": "^8.0.0"
  }
}
"#;

    pub const PACKAGE_JSON_GEMSPEC: &str = r#"{
  "name": "checkout",
  "version": "0.0.0",
  "scripts": {
    "build": "true",
    "watch": "true"
  }
}
"#;
}

/// A temporary workspace with `demos/` projects, local checkouts and an
/// isolated cache root.
pub struct TestFixture {
    temp_dir: assert_fs::TempDir,
}

impl TestFixture {
    /// Create a new test fixture with an empty temporary directory.
    pub fn new() -> Self {
        Self {
            temp_dir: assert_fs::TempDir::new().expect("Failed to create temp directory"),
        }
    }

    /// Add `demos/<name>` with the standard Gemfile and package.json.
    #[allow(dead_code)]
    pub fn with_demo_project(self, name: &str) -> Self {
        self.with_file(&format!("demos/{name}/Gemfile"), manifests::GEMFILE)
            .with_file(&format!("demos/{name}/package.json"), manifests::PACKAGE_JSON)
    }

    /// Add a local checkout directory named `name` at the fixture root.
    #[allow(dead_code)]
    pub fn with_checkout(self, name: &str) -> Self {
        self.with_file(&format!("{name}/package.json"), manifests::PACKAGE_JSON_GEMSPEC)
    }

    /// Add a `.swap-deps.yml` configuration file with the given content.
    #[allow(dead_code)]
    pub fn with_config(self, content: &str) -> Self {
        self.with_file(".swap-deps.yml", content)
    }

    /// Add a file with the given path and content.
    pub fn with_file(self, path: &str, content: &str) -> Self {
        self.temp_dir
            .child(path)
            .write_str(content)
            .expect("Failed to write file");
        self
    }

    /// Get the path to the temporary directory.
    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Cache root used by every command from this fixture.
    pub fn cache_root(&self) -> PathBuf {
        self.path().join("cache")
    }

    /// Path of a file below the fixture root.
    #[allow(dead_code)]
    pub fn file(&self, path: &str) -> PathBuf {
        self.path().join(path)
    }

    /// Read a file below the fixture root.
    #[allow(dead_code)]
    pub fn read(&self, path: &str) -> String {
        std::fs::read_to_string(self.file(path)).expect("Failed to read file")
    }

    /// Create a child path in the temp directory.
    #[allow(dead_code)]
    pub fn child(&self, path: &str) -> assert_fs::fixture::ChildPath {
        self.temp_dir.child(path)
    }

    /// Create a command running in this fixture's directory with an isolated
    /// cache, no colors, and `true` standing in for bundler and npm.
    pub fn command(&self) -> assert_cmd::Command {
        let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("swap-deps");
        cmd.current_dir(self.path())
            .env("SWAP_DEPS_CACHE", self.cache_root())
            .env("SWAP_DEPS_BUNDLE", "true")
            .env("SWAP_DEPS_NPM", "true")
            .env("NO_COLOR", "1")
            .env_remove("SWAP_DEPS_CONFIG")
            .env_remove("SWAP_DEPS_GIT_BASE");
        cmd
    }
}

impl Default for TestFixture {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixture_creates_temp_dir() {
        let fixture = TestFixture::new();
        assert!(fixture.path().exists());
    }

    #[test]
    fn test_fixture_with_demo_project() {
        let fixture = TestFixture::new().with_demo_project("app");
        assert!(fixture.file("demos/app/Gemfile").is_file());
        assert!(fixture.file("demos/app/package.json").is_file());
    }

    #[test]
    fn test_package_json_fixture_is_valid_json() {
        for content in [manifests::PACKAGE_JSON, manifests::PACKAGE_JSON_GEMSPEC] {
            serde_json::from_str::<serde_json::Value>(content).unwrap();
        }
    }
}
