//! Project discovery.
//!
//! A project is any directory holding a `Gemfile` or a `package.json`.
//! By default the immediate subdirectories of each project root are
//! scanned; `--path` narrows the run to one directory, and `--recursive`
//! walks everything below it.

use std::path::{Path, PathBuf};

use log::debug;
use walkdir::{DirEntry, WalkDir};

use crate::error::Result;
use crate::manifest::ManifestKind;
use crate::suggestions;

/// Directories never descended into by a recursive scan.
const SKIPPED_DIRS: &[&str] = &["node_modules", "vendor", "tmp", "log"];

/// Directories `--path` refuses to operate on.
const SYSTEM_DIRS: &[&str] = &[
    "/", "/etc", "/bin", "/sbin", "/usr", "/usr/bin", "/usr/sbin", "/System", "/proc", "/sys",
    "/dev", "/boot", "/var",
];

/// Which directories an invocation works on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProjectScope {
    /// Immediate subdirectories of each root.
    Roots(Vec<PathBuf>),
    /// One explicit directory.
    Single(PathBuf),
    /// An explicit directory and every project below it.
    Recursive(PathBuf),
}

/// Whether `dir` holds at least one manifest this tool rewrites.
pub fn is_project(dir: &Path) -> bool {
    ManifestKind::ALL
        .iter()
        .any(|kind| dir.join(kind.file_name()).is_file())
}

/// Fail when `path` is a protected system directory.
pub fn guard_system_directory(path: &Path) -> Result<()> {
    let resolved = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
    if SYSTEM_DIRS.iter().any(|dir| resolved == Path::new(dir)) {
        return Err(suggestions::system_directory(path));
    }
    Ok(())
}

fn is_skipped(entry: &DirEntry) -> bool {
    if entry.depth() == 0 || !entry.file_type().is_dir() {
        return false;
    }
    let name = entry.file_name().to_string_lossy();
    name.starts_with('.') || SKIPPED_DIRS.contains(&name.as_ref())
}

impl ProjectScope {
    /// Project directories in scope, sorted and deduplicated.
    pub fn discover(&self) -> Result<Vec<PathBuf>> {
        let mut projects = match self {
            ProjectScope::Roots(roots) => {
                let mut found = Vec::new();
                for root in roots {
                    if !root.is_dir() {
                        debug!("Project root {} does not exist, skipping", root.display());
                        continue;
                    }
                    let pattern = format!("{}/*", glob::Pattern::escape(&root.to_string_lossy()));
                    for entry in glob::glob(&pattern)? {
                        match entry {
                            Ok(path) if path.is_dir() && is_project(&path) => found.push(path),
                            Ok(_) => {}
                            Err(e) => debug!("Skipping unreadable path: {}", e),
                        }
                    }
                }
                found
            }
            ProjectScope::Single(dir) => {
                guard_system_directory(dir)?;
                if is_project(dir) {
                    vec![dir.clone()]
                } else {
                    Vec::new()
                }
            }
            ProjectScope::Recursive(dir) => {
                guard_system_directory(dir)?;
                WalkDir::new(dir)
                    .follow_links(false)
                    .into_iter()
                    .filter_entry(|entry| !is_skipped(entry))
                    .filter_map(|entry| match entry {
                        Ok(entry) => Some(entry),
                        Err(e) => {
                            debug!("Skipping unreadable path: {}", e);
                            None
                        }
                    })
                    .filter(|entry| entry.file_type().is_dir() && is_project(entry.path()))
                    .map(DirEntry::into_path)
                    .collect()
            }
        };
        projects.sort();
        projects.dedup();
        debug!("Discovered {} project(s)", projects.len());
        Ok(projects)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn project(root: &Path, name: &str, files: &[&str]) -> PathBuf {
        let dir = root.join(name);
        fs::create_dir_all(&dir).unwrap();
        for file in files {
            fs::write(dir.join(file), "").unwrap();
        }
        dir
    }

    #[test]
    fn test_roots_scan_immediate_subdirectories() {
        let temp = TempDir::new().unwrap();
        let demos = temp.path().join("demos");
        let b = project(&demos, "b-app", &["Gemfile"]);
        let a = project(&demos, "a-app", &["package.json"]);
        project(&demos, "docs", &["README.md"]);
        project(&demos.join("a-app"), "nested", &["Gemfile"]);

        let scope = ProjectScope::Roots(vec![demos, temp.path().join("missing")]);
        assert_eq!(scope.discover().unwrap(), vec![a, b]);
    }

    #[test]
    fn test_single_directory() {
        let temp = TempDir::new().unwrap();
        let app = project(temp.path(), "app", &["Gemfile", "package.json"]);
        assert_eq!(
            ProjectScope::Single(app.clone()).discover().unwrap(),
            vec![app]
        );

        let empty = project(temp.path(), "empty", &[]);
        assert!(ProjectScope::Single(empty).discover().unwrap().is_empty());
    }

    #[test]
    fn test_recursive_skips_dependencies_and_hidden_dirs() {
        let temp = TempDir::new().unwrap();
        let root = project(temp.path(), "mono", &["package.json"]);
        let inner = project(&root, "packages/web", &["package.json"]);
        project(&root, "node_modules/shakapacker", &["package.json"]);
        project(&root, "vendor/bundle", &["Gemfile"]);
        project(&root, ".git/hooks", &["Gemfile"]);

        let found = ProjectScope::Recursive(root.clone()).discover().unwrap();
        assert_eq!(found, vec![root, inner]);
    }

    #[cfg(unix)]
    #[test]
    fn test_system_directories_are_refused() {
        for dir in ["/", "/etc", "/usr/bin"] {
            let err = ProjectScope::Single(PathBuf::from(dir))
                .discover()
                .unwrap_err();
            assert!(err.to_string().contains("refusing to use system directory"));
        }
        assert!(guard_system_directory(Path::new("/tmp")).is_ok());
    }
}
