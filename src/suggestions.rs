//! # Error Suggestions
//!
//! Helpers that build validation errors which say what went wrong AND how
//! to fix it. Messages stay on one line so the CLI can print them as a
//! single `Error: ...` line.

use std::path::{Path, PathBuf};

use crate::dependency::{supported_names, Dependency};
use crate::error::Error;

/// Error for a dependency name outside the supported set, with a
/// "did you mean" hint when a supported name is close.
pub fn unknown_dependency(name: &str) -> Error {
    let candidates: Vec<&str> = Dependency::ALL.iter().map(|d| d.gem_name()).collect();
    let did_you_mean = find_similar(name, &candidates)
        .map(|s| format!(" (did you mean '{s}'?)"))
        .unwrap_or_default();

    Error::Validation {
        message: format!(
            "unknown dependency '{name}'{did_you_mean}; supported: {}",
            supported_names()
        ),
    }
}

/// Error listing every local path that does not exist, not just the first.
pub fn missing_local_paths(missing: &[(Dependency, PathBuf)]) -> Error {
    let listed = missing
        .iter()
        .map(|(dep, path)| format!("{dep} -> {}", path.display()))
        .collect::<Vec<_>>()
        .join(", ");

    Error::Validation {
        message: format!(
            "local path(s) not found or not a directory: {listed} (check the --<dependency> flags or the 'gems:' section of the config file)"
        ),
    }
}

/// Error for a path that points into a protected system directory.
pub fn system_directory(path: &Path) -> Error {
    Error::Validation {
        message: format!(
            "refusing to use system directory {} (point at a project or checkout directory instead)",
            path.display()
        ),
    }
}

/// Message for a backup found next to a manifest with no swapped entries.
pub fn restore_first(backup: &Path) -> String {
    format!(
        "backup {} exists but the manifest has no swapped dependencies; run 'swap-deps --restore' or remove the backup after checking it",
        backup.display()
    )
}

/// Hint for an invocation that names nothing to swap.
pub fn swap_usage() -> &'static str {
    "pass --shakapacker/--react-on-rails/--cypress-on-rails PATH, --github REPO, or --apply with a .swap-deps.yml"
}

/// Find a similar string from a list of candidates using edit distance.
///
/// Returns Some(candidate) if a close match is found (edit distance <= 2).
fn find_similar<'a>(input: &str, candidates: &[&'a str]) -> Option<&'a str> {
    candidates
        .iter()
        .filter_map(|&candidate| {
            let distance = edit_distance(input, candidate);
            if distance <= 2 && distance < input.len() {
                Some((candidate, distance))
            } else {
                None
            }
        })
        .min_by_key(|(_, distance)| *distance)
        .map(|(candidate, _)| candidate)
}

/// Calculate the Levenshtein edit distance between two strings.
fn edit_distance(a: &str, b: &str) -> usize {
    let a_chars: Vec<char> = a.chars().collect();
    let b_chars: Vec<char> = b.chars().collect();
    let (a_len, b_len) = (a_chars.len(), b_chars.len());

    if a_len == 0 {
        return b_len;
    }
    if b_len == 0 {
        return a_len;
    }

    let mut previous: Vec<usize> = (0..=b_len).collect();
    let mut current = vec![0usize; b_len + 1];

    for i in 1..=a_len {
        current[0] = i;
        for j in 1..=b_len {
            let cost = usize::from(a_chars[i - 1] != b_chars[j - 1]);
            current[j] = (previous[j] + 1)
                .min(current[j - 1] + 1)
                .min(previous[j - 1] + cost);
        }
        std::mem::swap(&mut previous, &mut current);
    }

    previous[b_len]
}
