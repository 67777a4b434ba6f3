//! # Manifest Backups
//!
//! Before a manifest is first rewritten, a byte-for-byte copy is saved next
//! to it as `<manifest>.backup`. A backup's presence means the live manifest
//! is swapped; a backup found next to an unswapped manifest is treated as an
//! inconsistency (manual edits or an interrupted run) and is never silently
//! overwritten.

use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use log::debug;

use crate::error::{Error, Result};
use crate::manifest::ManifestKind;
use crate::suggestions;

/// Suffix appended to a manifest's file name.
pub const BACKUP_SUFFIX: &str = ".backup";

/// What `backup` did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackupOutcome {
    /// A new backup was written (or would be, in dry-run mode).
    Created,
    /// A backup already existed and the manifest is already swapped.
    Reused,
}

/// Path of the backup for `manifest`.
pub fn backup_path(manifest: &Path) -> PathBuf {
    let mut name = OsString::from(manifest.as_os_str());
    name.push(BACKUP_SUFFIX);
    PathBuf::from(name)
}

/// Creates and restores manifest backups. In dry-run mode every decision is
/// made as usual but nothing is written.
#[derive(Debug, Clone, Copy, Default)]
pub struct BackupStore {
    dry_run: bool,
}

impl BackupStore {
    pub fn new(dry_run: bool) -> Self {
        Self { dry_run }
    }

    pub fn exists(&self, manifest: &Path) -> bool {
        backup_path(manifest).is_file()
    }

    /// Snapshot `manifest` unless a backup exists already.
    ///
    /// An existing backup is reused when the live manifest still shows
    /// swapped dependencies, and rejected with `InconsistentState` when it
    /// does not.
    pub fn backup(&self, manifest: &Path) -> Result<BackupOutcome> {
        let backup = backup_path(manifest);

        if backup.is_file() {
            let kind = ManifestKind::from_path(manifest).ok_or_else(|| Error::Validation {
                message: format!("{} is not a supported manifest", manifest.display()),
            })?;
            if kind.detect_swapped(manifest)?.is_empty() {
                return Err(Error::InconsistentState {
                    path: manifest.to_path_buf(),
                    message: suggestions::restore_first(&backup),
                });
            }
            debug!("Already swapped, reusing backup {}", backup.display());
            return Ok(BackupOutcome::Reused);
        }

        if self.dry_run {
            debug!("Would back up {} to {}", manifest.display(), backup.display());
        } else {
            fs::copy(manifest, &backup)?;
            debug!("Backed up {} to {}", manifest.display(), backup.display());
        }
        Ok(BackupOutcome::Created)
    }

    /// Put the backup back in place and remove it. Returns `false` when
    /// there is nothing to restore.
    pub fn restore(&self, manifest: &Path) -> Result<bool> {
        let backup = backup_path(manifest);
        if !backup.is_file() {
            return Ok(false);
        }

        if self.dry_run {
            debug!("Would restore {} from {}", manifest.display(), backup.display());
        } else {
            fs::copy(&backup, manifest)?;
            fs::remove_file(&backup)?;
            debug!("Restored {} from {}", manifest.display(), backup.display());
        }
        Ok(true)
    }

    /// Backup files in `directory`, sorted by path.
    pub fn list(&self, directory: &Path) -> Result<Vec<PathBuf>> {
        let escaped = glob::Pattern::escape(&directory.to_string_lossy());
        let pattern = format!("{escaped}/*{BACKUP_SUFFIX}");

        let mut backups: Vec<PathBuf> = glob::glob(&pattern)?
            .filter_map(|entry| entry.ok())
            .filter(|path| path.is_file())
            .collect();
        backups.sort();
        Ok(backups)
    }
}
