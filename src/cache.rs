//! # Clone Cache
//!
//! GitHub sources are cloned once into `<cache_root>/repos/` and reused.
//! Each (repository, ref) pair gets its own directory named
//! `{org}-{repo}-{ref}` (slashes in the ref become dashes, a missing ref is
//! named `HEAD`). Re-swapping to the same pair refreshes the existing clone
//! with a shallow fetch and hard reset instead of cloning again.
//!
//! Names are not unique per ref: branch `v1` and tag `v1` share a directory,
//! as do branches `feature/x` and `feature-x`. Switching between two such
//! refs resets the shared clone to whichever was asked for last.
//!
//! Git access goes through the `GitOperations` trait so the cache logic can
//! be tested without a network or a `git` binary.
//!
//! The cache directory is shared between invocations without a lock. Fresh
//! clones land in a unique temporary directory and are renamed into place,
//! so two invocations racing on the same entry never leave a half-cloned
//! directory behind; the last fetch/reset wins.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process;

use log::{debug, info, warn};
use regex::Regex;
use walkdir::WalkDir;

use crate::error::{Error, Result};
use crate::refspec::{RefSpec, DEFAULT_GIT_BASE};

/// Trait for git operations - allows mocking in tests
pub trait GitOperations {
    /// Shallow clone of `url` at `spec`'s ref into `target_dir`.
    fn clone_shallow(&self, spec: &RefSpec, url: &str, target_dir: &Path) -> Result<()>;

    /// Update an existing clone to `spec`'s ref (fetch + hard reset).
    fn fetch_and_reset(&self, spec: &RefSpec, url: &str, repo_dir: &Path) -> Result<()>;

    /// Whether `spec`'s branch or tag exists on the remote.
    fn ref_exists(&self, spec: &RefSpec, url: &str) -> Result<bool>;
}

/// The default implementation of `GitOperations`, which uses the system's
/// `git` command.
#[derive(Debug, Default)]
pub struct DefaultGitOperations;

impl GitOperations for DefaultGitOperations {
    fn clone_shallow(&self, spec: &RefSpec, url: &str, target_dir: &Path) -> Result<()> {
        crate::git::clone_shallow(spec, url, target_dir)
    }

    fn fetch_and_reset(&self, spec: &RefSpec, url: &str, repo_dir: &Path) -> Result<()> {
        crate::git::fetch_and_reset(spec, url, repo_dir)
    }

    fn ref_exists(&self, spec: &RefSpec, url: &str) -> Result<bool> {
        crate::git::remote_ref_exists(spec, url)
    }
}

/// One cached clone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    /// Directory name, `{org}-{repo}-{ref}`.
    pub name: String,
    pub directory: PathBuf,
    pub size_bytes: u64,
}

/// Summary returned by `CacheManager::info`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheInfo {
    pub location: PathBuf,
    pub entry_count: usize,
    pub total_size: u64,
}

/// Directory name for a (repository, ref) pair.
pub fn entry_name(spec: &RefSpec) -> String {
    let reference = spec.ref_name().unwrap_or("HEAD").replace('/', "-");
    format!("{}-{}-{}", spec.org(), spec.name(), reference)
}

/// Manages the on-disk clone cache.
pub struct CacheManager {
    root: PathBuf,
    git_base: String,
    git: Box<dyn GitOperations>,
    dry_run: bool,
}

impl CacheManager {
    /// Cache rooted at `root`, cloning from GitHub with the system `git`.
    pub fn new(root: PathBuf) -> Self {
        Self::with_git(root, Box::new(DefaultGitOperations))
    }

    pub fn with_git(root: PathBuf, git: Box<dyn GitOperations>) -> Self {
        Self {
            root,
            git_base: DEFAULT_GIT_BASE.to_string(),
            git,
            dry_run: false,
        }
    }

    /// Clone from `base` instead of GitHub (mirrors, tests).
    pub fn with_git_base(mut self, base: impl Into<String>) -> Self {
        self.git_base = base.into();
        self
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Where the clone for `spec` lives (whether or not it exists yet).
    pub fn entry_path(&self, spec: &RefSpec) -> PathBuf {
        self.root.join(entry_name(spec))
    }

    /// Make `spec` available locally and return its directory.
    ///
    /// Clones on first use; afterwards fetches and hard-resets to the ref.
    /// In dry-run mode the remote ref is still checked, but nothing is
    /// cloned or fetched.
    pub fn materialize(&self, dependency_name: &str, spec: &RefSpec) -> Result<PathBuf> {
        let path = self.entry_path(spec);
        let exists = path.is_dir();

        let url = spec.clone_url(&self.git_base)?;
        let url = url.as_str();

        if !self.git.ref_exists(spec, url)? {
            return Err(Error::Fetch {
                repository: spec.repository().to_string(),
                r#ref: crate::git::ref_arg(spec).to_string(),
                message: format!("no such {} on {}", kind_label(spec), url),
            });
        }

        if self.dry_run {
            info!(
                "Would {} {} for {} at {}",
                if exists { "update" } else { "clone" },
                spec,
                dependency_name,
                path.display()
            );
            return Ok(path);
        }

        if exists {
            info!("Updating cached {} for {}", spec, dependency_name);
            self.git.fetch_and_reset(spec, url, &path)?;
            return Ok(path);
        }

        info!("Cloning {} for {} into {}", spec, dependency_name, path.display());
        fs::create_dir_all(&self.root)?;
        let staging = self
            .root
            .join(format!(".{}.tmp-{}", entry_name(spec), process::id()));
        if staging.exists() {
            fs::remove_dir_all(&staging)?;
        }

        if let Err(e) = self.git.clone_shallow(spec, url, &staging) {
            let _ = fs::remove_dir_all(&staging);
            return Err(e);
        }

        if let Err(e) = fs::rename(&staging, &path) {
            let _ = fs::remove_dir_all(&staging);
            if path.is_dir() {
                debug!(
                    "Another invocation populated {} first, using it",
                    path.display()
                );
            } else {
                return Err(e.into());
            }
        }
        Ok(path)
    }

    /// Cache entries, sorted by name. In-progress clones are skipped.
    pub fn entries(&self) -> Result<Vec<CacheEntry>> {
        if !self.root.is_dir() {
            return Ok(Vec::new());
        }

        let mut entries = Vec::new();
        for dir_entry in fs::read_dir(&self.root)? {
            let dir_entry = dir_entry?;
            let file_type = dir_entry.file_type()?;
            if !file_type.is_dir() {
                continue;
            }
            let Some(name) = dir_entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            if name.starts_with('.') {
                continue;
            }
            let directory = dir_entry.path();
            entries.push(CacheEntry {
                size_bytes: directory_size(&directory),
                name,
                directory,
            });
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    /// Location, number of entries and total size of the cache.
    pub fn info(&self) -> Result<CacheInfo> {
        let entries = self.entries()?;
        Ok(CacheInfo {
            location: self.root.clone(),
            entry_count: entries.len(),
            total_size: entries.iter().map(|e| e.size_bytes).sum(),
        })
    }

    /// Remove the entries for `dependency_name`, or every entry when `None`.
    /// Returns the entries removed (or that would be, in dry-run mode).
    pub fn clean(&self, dependency_name: Option<&str>) -> Result<Vec<CacheEntry>> {
        let matcher = dependency_name.map(dependency_matcher).transpose()?;

        let mut removed = Vec::new();
        for entry in self.entries()? {
            if let Some(matcher) = &matcher {
                if !matcher.is_match(&entry.name) {
                    continue;
                }
            }
            if self.dry_run {
                info!("Would remove {}", entry.directory.display());
            } else if let Err(e) = fs::remove_dir_all(&entry.directory) {
                warn!("Failed to remove {}: {}", entry.directory.display(), e);
                continue;
            } else {
                info!("Removed {}", entry.directory.display());
            }
            removed.push(entry);
        }
        Ok(removed)
    }
}

fn kind_label(spec: &RefSpec) -> String {
    match (spec.ref_kind(), spec.ref_name()) {
        (Some(kind), Some(name)) => format!("{kind} '{name}'"),
        _ => "ref".to_string(),
    }
}

/// Anchored `{org}-{dependency}-{ref}` matcher. The org segment cannot
/// contain `-`, so `acme-test-shakapacker-clone-main` is not an entry for
/// `shakapacker`.
fn dependency_matcher(dependency_name: &str) -> Result<Regex> {
    Ok(Regex::new(&format!(
        r"^[A-Za-z0-9_.]+-{}-.+$",
        regex::escape(dependency_name)
    ))?)
}

/// Total size of the regular files under `path`. Symlinks are not followed
/// or counted. Unreadable entries are logged and counted as zero.
fn directory_size(path: &Path) -> u64 {
    let mut total = 0u64;
    for entry in WalkDir::new(path).follow_links(false) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Skipping unreadable cache path: {}", e);
                continue;
            }
        };
        if entry.file_type().is_symlink() || !entry.file_type().is_file() {
            continue;
        }
        total += match entry.metadata() {
            Ok(metadata) => metadata.len(),
            Err(e) => {
                let path = entry.path().display();
                match classify_size_error(e.io_error().map(io::Error::kind)) {
                    SizeError::Unreadable => warn!("Cannot read size of {}: {}", path, e),
                    SizeError::Unexpected => warn!("Unexpected error sizing {}: {}", path, e),
                }
                0
            }
        };
    }
    total
}

/// Why a file's size could not be read. Either way it counts as zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SizeError {
    /// Permission denied, or the file vanished mid-walk.
    Unreadable,
    Unexpected,
}

fn classify_size_error(kind: Option<io::ErrorKind>) -> SizeError {
    match kind {
        Some(io::ErrorKind::PermissionDenied) | Some(io::ErrorKind::NotFound) => {
            SizeError::Unreadable
        }
        _ => SizeError::Unexpected,
    }
}
