//! # Manifest Rewriting
//!
//! Rewriters for the two manifest types a project can carry:
//!
//! - **`gemfile`**: line-oriented rewriting of `gem "name", ...` declarations.
//!   Works on the raw text so unrelated formatting and comments survive.
//! - **`package_json`**: rewriting of dependency values through a parsed JSON
//!   tree, so nested structures can never be corrupted by string patching.
//!
//! Both sides expose `detect_swapped`, the inverse operation used by
//! `--status` and by the backup consistency check.

pub mod gemfile;
pub mod package_json;

use std::fmt;
use std::path::Path;

use crate::error::Result;

/// How a swapped dependency is currently sourced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwapKind {
    Local,
    Remote,
}

impl fmt::Display for SwapKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SwapKind::Local => write!(f, "local"),
            SwapKind::Remote => write!(f, "github"),
        }
    }
}

/// A managed dependency found in a swapped state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwappedDependency {
    /// Name as it appears in the manifest.
    pub name: String,
    pub kind: SwapKind,
    /// Local path, or `org/repo[#branch|@tag]` for remote references.
    pub path: String,
}

/// The manifest types a project directory may contain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ManifestKind {
    Gemfile,
    PackageJson,
}

impl ManifestKind {
    pub const ALL: [ManifestKind; 2] = [ManifestKind::Gemfile, ManifestKind::PackageJson];

    pub fn file_name(self) -> &'static str {
        match self {
            ManifestKind::Gemfile => "Gemfile",
            ManifestKind::PackageJson => "package.json",
        }
    }

    /// Classify a manifest path by its file name.
    pub fn from_path(path: &Path) -> Option<ManifestKind> {
        let name = path.file_name()?.to_str()?;
        ManifestKind::ALL
            .into_iter()
            .find(|kind| kind.file_name() == name)
    }

    /// Report managed dependencies swapped in the manifest at `path`.
    /// A missing file yields an empty list.
    pub fn detect_swapped(self, path: &Path) -> Result<Vec<SwappedDependency>> {
        match self {
            ManifestKind::Gemfile => gemfile::detect_swapped(path),
            ManifestKind::PackageJson => package_json::detect_swapped(path),
        }
    }
}

impl fmt::Display for ManifestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.file_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_from_path() {
        assert_eq!(
            ManifestKind::from_path(&PathBuf::from("/app/Gemfile")),
            Some(ManifestKind::Gemfile)
        );
        assert_eq!(
            ManifestKind::from_path(&PathBuf::from("package.json")),
            Some(ManifestKind::PackageJson)
        );
        assert_eq!(ManifestKind::from_path(&PathBuf::from("Gemfile.lock")), None);
    }

    #[test]
    fn test_detect_swapped_missing_file_is_empty() {
        let dir = tempfile::TempDir::new().unwrap();
        for kind in ManifestKind::ALL {
            let found = kind
                .detect_swapped(&dir.path().join(kind.file_name()))
                .unwrap();
            assert!(found.is_empty());
        }
    }
}
