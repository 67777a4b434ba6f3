//! # swap-deps Library
//!
//! This library provides the core functionality for temporarily pointing the
//! Gemfile and package.json of Rails demo projects at local or GitHub
//! checkouts of shakapacker, react_on_rails and cypress-on-rails, and for
//! putting the original manifests back afterwards. It is designed to be used
//! by the `swap-deps` command-line tool.
//!
//! ## Quick Example
//!
//! ```
//! use swap_deps::refspec;
//! use swap_deps::dependency::Dependency;
//!
//! let spec = refspec::parse("shakacode/react-on-rails#my-fix").unwrap();
//! assert_eq!(spec.org(), "shakacode");
//! assert_eq!(spec.ref_name(), Some("my-fix"));
//!
//! let dependency = Dependency::from_repository(&spec).unwrap();
//! assert_eq!(dependency, Dependency::ReactOnRails);
//! ```
//!
//! ## Core Concepts
//!
//! - **References (`refspec`)**: Parses `org/repo`, `org/repo#branch` and
//!   `org/repo@tag` into a validated `RefSpec`.
//! - **Dependencies (`dependency`)**: The closed set of swappable libraries
//!   and how each maps onto a gem and an npm package.
//! - **Manifests (`manifest`)**: Rewriters for Gemfile (line-oriented regex)
//!   and package.json (order-preserving JSON tree), plus detection of what is
//!   currently swapped.
//! - **Backups (`backup`)**: Byte-for-byte `<manifest>.backup` copies that
//!   make a swap reversible.
//! - **Cache (`cache`, `git`)**: Shallow clones of GitHub refs reused across
//!   runs.
//! - **Watch processes (`watch`, `process`)**: `npm run watch` children
//!   tracked in a file-locked JSON registry.
//! - **Orchestration (`orchestrator`)**: Ties the pieces together for swap,
//!   restore and status across every discovered project (`discovery`).
//!
//! ## Execution Flow
//!
//! A swap runs through these steps:
//!
//! 1.  **Validation**: Every target is checked up front and all problems are
//!     reported together.
//! 2.  **Materialization**: GitHub targets are cloned or refreshed in the cache.
//! 3.  **Rewriting**: Each project's manifests are rewritten in memory, backed
//!     up, then written.
//! 4.  **Install**: `bundle install` / `npm install` re-resolve changed projects.
//! 5.  **Build**: Swapped npm packages are built once or watched.

pub mod backup;
pub mod cache;
pub mod config;
pub mod defaults;
pub mod dependency;
pub mod discovery;
pub mod error;
pub mod git;
pub mod manifest;
pub mod orchestrator;
pub mod output;
pub mod process;
pub mod refspec;
pub mod suggestions;
pub mod toolchain;
pub mod watch;

#[cfg(test)]
mod refspec_proptest;
