//! Default values for swap-deps configuration.
//!
//! This module provides centralized default values used across commands,
//! ensuring consistency and avoiding duplication.

use std::path::PathBuf;

/// Config file looked up in the current directory when `--config` is not given.
pub const CONFIG_FILE_NAME: &str = ".swap-deps.yml";

/// Directories scanned for projects when the config file names none.
pub const DEFAULT_PROJECT_ROOTS: &[&str] = &["demos", "demos-scratch"];

/// Returns the default cache root directory.
///
/// Uses the platform-appropriate cache directory:
/// - Linux: `~/.cache/swap-deps` (XDG Base Directory)
/// - macOS: `~/Library/Caches/swap-deps`
/// - Windows: `{FOLDERID_LocalAppData}\swap-deps`
///
/// Falls back to `.swap-deps-cache` in the current directory if the
/// platform cache directory cannot be determined.
///
/// This can be overridden by the `--cache-root` CLI flag or the
/// `SWAP_DEPS_CACHE` environment variable.
pub fn default_cache_root() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from(".swap-deps-cache"))
        .join("swap-deps")
}

/// Clones live in `<cache_root>/repos`.
pub fn repos_dir(cache_root: &std::path::Path) -> PathBuf {
    cache_root.join("repos")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_cache_root_returns_path() {
        let cache_root = default_cache_root();
        assert!(cache_root.ends_with("swap-deps"));
    }

    #[test]
    fn test_default_cache_root_is_absolute_or_fallback() {
        let cache_root = default_cache_root();
        // Either absolute (normal case) or relative fallback
        assert!(
            cache_root.is_absolute() || cache_root.starts_with(".swap-deps-cache"),
            "Expected absolute path or fallback, got: {:?}",
            cache_root
        );
    }

    #[test]
    fn test_repos_dir() {
        assert_eq!(
            repos_dir(std::path::Path::new("/c")),
            PathBuf::from("/c/repos")
        );
    }
}
