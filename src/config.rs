//! # Configuration File
//!
//! Swaps that are used every day can live in `.swap-deps.yml` instead of on
//! the command line:
//!
//! ```yaml
//! gems:
//!   shakapacker: ~/src/shakapacker
//! github:
//!   react_on_rails: shakacode/react_on_rails#my-branch
//!   cypress-on-rails:
//!     repo: shakacode/cypress-on-rails
//!     branch: v1.2.0
//!     ref_type: tag
//! roots: [demos, demos-scratch]
//! ```
//!
//! ## Sections
//!
//! - **`gems`**: dependency name to local checkout. `~` expands to the home
//!   directory and relative paths are resolved against the directory holding
//!   the config file.
//! - **`github`**: dependency name to a repository reference, either in the
//!   compact `org/repo#branch` / `org/repo@tag` form or as a mapping with
//!   `repo`, `branch` and `ref_type`. A bare branch name (`my-branch`) or tag
//!   (`@v1.0.0`) refers to the dependency's upstream repository.
//! - **`roots`**: directories scanned for projects (default `demos` and
//!   `demos-scratch`).
//!
//! Dependency names accept underscores or hyphens interchangeably. Unknown
//! keys, unknown dependency names and YAML type tags are all rejected, and
//! every problem in the file is reported at once.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_yaml::Value;

use crate::defaults::DEFAULT_PROJECT_ROOTS;
use crate::dependency::{Dependency, DependencyTarget};
use crate::error::{Error, Result};
use crate::refspec::{self, GitRef, RefSpec};
use crate::suggestions;

/// Whether a `github` mapping's `branch` names a branch or a tag.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RefType {
    #[default]
    Branch,
    Tag,
}

/// Long form of a `github` entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GithubDetail {
    /// Repository; defaults to the dependency's upstream.
    #[serde(default)]
    pub repo: Option<String>,
    /// Branch or tag name, depending on `ref_type`.
    #[serde(default)]
    pub branch: Option<String>,
    #[serde(default)]
    pub ref_type: Option<RefType>,
}

/// A `github` entry in either spelling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum GithubEntry {
    Spec(String),
    Detailed(GithubDetail),
}

/// Parsed `.swap-deps.yml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SwapConfig {
    #[serde(default)]
    pub gems: BTreeMap<String, String>,
    #[serde(default)]
    pub github: BTreeMap<String, GithubEntry>,
    #[serde(default)]
    pub roots: Vec<String>,
    /// Directory relative paths are resolved against.
    #[serde(skip)]
    pub base_dir: PathBuf,
}

/// Parses a YAML string into a `SwapConfig`.
///
/// Relative paths in the result resolve against the current directory; use
/// `from_file` to resolve them against the file's location instead.
pub fn parse(yaml_content: &str) -> Result<SwapConfig> {
    let value: Value = serde_yaml::from_str(yaml_content)?;
    if value.is_null() {
        return Ok(SwapConfig::default());
    }
    reject_tags(&value, "config")?;
    Ok(serde_yaml::from_value(value)?)
}

/// Parse the config file at `path`.
pub fn from_file<P: AsRef<Path>>(path: P) -> Result<SwapConfig> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| Error::Validation {
        message: format!("cannot read config file {}: {e}", path.display()),
    })?;
    let mut config = parse(&content).map_err(|e| Error::Validation {
        message: format!("invalid config file {}: {e}", path.display()),
    })?;
    config.base_dir = std::path::absolute(path)?
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default();
    Ok(config)
}

fn reject_tags(value: &Value, location: &str) -> Result<()> {
    match value {
        Value::Tagged(tagged) => Err(Error::Validation {
            message: format!("YAML tag {} is not allowed (at {location})", tagged.tag),
        }),
        Value::Mapping(map) => {
            for (key, child) in map {
                let key = key.as_str().unwrap_or("?");
                reject_tags(child, &format!("{location}.{key}"))?;
            }
            Ok(())
        }
        Value::Sequence(items) => {
            for (index, child) in items.iter().enumerate() {
                reject_tags(child, &format!("{location}[{index}]"))?;
            }
            Ok(())
        }
        _ => Ok(()),
    }
}

/// Expand `~` and make `raw` absolute relative to `base_dir`.
pub fn expand_path(raw: &str, base_dir: &Path) -> PathBuf {
    let expanded = if raw == "~" {
        dirs::home_dir()
    } else if let Some(rest) = raw.strip_prefix("~/") {
        dirs::home_dir().map(|home| home.join(rest))
    } else {
        None
    };
    let path = expanded.unwrap_or_else(|| PathBuf::from(raw));
    if path.is_absolute() {
        path
    } else {
        base_dir.join(path)
    }
}

impl SwapConfig {
    pub fn is_empty(&self) -> bool {
        self.gems.is_empty() && self.github.is_empty()
    }

    /// Turn the `gems` and `github` sections into swap targets.
    ///
    /// Every unknown name, bad reference and duplicate is collected and
    /// returned together.
    pub fn targets(&self) -> Result<Vec<DependencyTarget>> {
        let mut targets: Vec<DependencyTarget> = Vec::new();
        let mut errors = Vec::new();

        for (name, raw_path) in &self.gems {
            match name.parse::<Dependency>() {
                Ok(dep) => {
                    targets.push(DependencyTarget::local(dep, expand_path(raw_path, &self.base_dir)))
                }
                Err(e) => errors.push(e),
            }
        }

        for (name, entry) in &self.github {
            let dep = match name.parse::<Dependency>() {
                Ok(dep) => dep,
                Err(e) => {
                    errors.push(e);
                    continue;
                }
            };
            if targets.iter().any(|t| t.dependency == dep) {
                errors.push(Error::Validation {
                    message: format!(
                        "{dep} is listed under both 'gems' and 'github'; pick one source"
                    ),
                });
                continue;
            }
            match github_refspec(dep, entry) {
                Ok(spec) => targets.push(DependencyTarget::remote(dep, spec)),
                Err(e) => errors.push(e),
            }
        }

        match Error::from_batch(errors) {
            Some(error) => Err(error),
            None => Ok(targets),
        }
    }

    /// Directories scanned for projects.
    pub fn project_roots(&self) -> Vec<PathBuf> {
        if self.roots.is_empty() {
            DEFAULT_PROJECT_ROOTS
                .iter()
                .map(|root| self.base_dir.join(root))
                .collect()
        } else {
            self.roots
                .iter()
                .map(|root| expand_path(root, &self.base_dir))
                .collect()
        }
    }
}

fn github_refspec(dep: Dependency, entry: &GithubEntry) -> Result<RefSpec> {
    match entry {
        GithubEntry::Spec(spec) if spec.contains('/') => refspec::parse(spec),
        GithubEntry::Spec(reference) => {
            let separator = if reference.starts_with('@') || reference.starts_with('#') {
                ""
            } else {
                "#"
            };
            refspec::parse(&format!(
                "{}{separator}{reference}",
                dep.default_repository()
            ))
        }
        GithubEntry::Detailed(detail) => {
            let repository = detail
                .repo
                .as_deref()
                .unwrap_or_else(|| dep.default_repository());
            let reference = detail.branch.as_ref().map(|name| {
                match detail.ref_type.unwrap_or_default() {
                    RefType::Branch => GitRef::Branch(name.clone()),
                    RefType::Tag => GitRef::Tag(name.clone()),
                }
            });
            if detail.branch.is_none() && detail.ref_type == Some(RefType::Tag) {
                return Err(Error::Validation {
                    message: format!("{dep}: ref_type 'tag' needs a 'branch' naming the tag"),
                });
            }
            RefSpec::new(repository, reference)
        }
    }
}

/// Name to clean from the cache for `--clean-cache NAME`: a known dependency
/// spelling maps to its gem name, anything else is kept as typed.
pub fn cache_name(name: &str) -> String {
    Dependency::from_name(name)
        .map(|dep| dep.gem_name().to_string())
        .unwrap_or_else(|| name.to_string())
}

/// Error for a config file that resolves to no targets.
pub fn nothing_to_swap(path: &Path) -> Error {
    Error::Validation {
        message: format!(
            "{} has no 'gems' or 'github' entries; {}",
            path.display(),
            suggestions::swap_usage()
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dependency::Source;
    use tempfile::TempDir;

    const FULL: &str = r#"
gems:
  shakapacker: /src/shakapacker
github:
  react_on_rails: shakacode/react_on_rails#my-branch
  cypress-on-rails:
    repo: shakacode/cypress-on-rails
    branch: v1.2.0
    ref_type: tag
roots: [apps]
"#;

    #[test]
    fn test_parse_full_config() {
        let config = parse(FULL).unwrap();
        assert_eq!(config.gems["shakapacker"], "/src/shakapacker");
        assert_eq!(
            config.github["react_on_rails"],
            GithubEntry::Spec("shakacode/react_on_rails#my-branch".to_string())
        );
        assert_eq!(
            config.github["cypress-on-rails"],
            GithubEntry::Detailed(GithubDetail {
                repo: Some("shakacode/cypress-on-rails".to_string()),
                branch: Some("v1.2.0".to_string()),
                ref_type: Some(RefType::Tag),
            })
        );
        assert_eq!(config.roots, vec!["apps".to_string()]);
    }

    #[test]
    fn test_parse_empty_config() {
        assert_eq!(parse("").unwrap(), SwapConfig::default());
        assert_eq!(parse("# nothing yet\n").unwrap(), SwapConfig::default());
    }

    #[test]
    fn test_parse_rejects_unknown_keys() {
        assert!(parse("gemz:\n  shakapacker: /x\n").is_err());
        assert!(parse("github:\n  shakapacker:\n    repository: a/b\n").is_err());
    }

    #[test]
    fn test_parse_rejects_tags() {
        let err = parse("gems:\n  shakapacker: !Path /x\n").unwrap_err();
        assert!(err.to_string().contains("YAML tag"));
        assert!(err.to_string().contains("config.gems.shakapacker"));
    }

    #[test]
    fn test_targets_from_full_config() {
        let config = parse(FULL).unwrap();
        let targets = config.targets().unwrap();
        assert_eq!(targets.len(), 3);

        assert_eq!(
            targets[0],
            DependencyTarget::local(Dependency::Shakapacker, "/src/shakapacker")
        );
        match &targets[1].source {
            Source::Remote { refspec, .. } => {
                assert_eq!(targets[1].dependency, Dependency::CypressOnRails);
                assert_eq!(refspec.to_string(), "shakacode/cypress-on-rails@v1.2.0");
            }
            other => panic!("expected remote, got {other:?}"),
        }
        match &targets[2].source {
            Source::Remote { refspec, .. } => {
                assert_eq!(targets[2].dependency, Dependency::ReactOnRails);
                assert_eq!(refspec.to_string(), "shakacode/react_on_rails#my-branch");
            }
            other => panic!("expected remote, got {other:?}"),
        }
    }

    #[test]
    fn test_bare_branch_uses_upstream_repository() {
        let config = parse("github:\n  shakapacker: justin/fix\n  react-on-rails: '@v14.0.0'\n")
            .unwrap();
        let specs: Vec<String> = config
            .targets()
            .unwrap()
            .iter()
            .map(|t| t.describe_source())
            .collect();
        assert_eq!(
            specs,
            vec![
                "github:shakacode/react_on_rails@v14.0.0".to_string(),
                "github:justin/fix".to_string(),
            ]
        );

        let config = parse("github:\n  shakapacker: feature-x\n").unwrap();
        assert_eq!(
            config.targets().unwrap()[0].describe_source(),
            "github:shakacode/shakapacker#feature-x"
        );
    }

    #[test]
    fn test_unknown_names_reported_together() {
        let config = parse("gems:\n  shakapaker: /a\n  webpacker: /b\n").unwrap();
        let err = config.targets().unwrap_err();
        match &err {
            Error::Aggregate { errors } => assert_eq!(errors.len(), 2),
            other => panic!("expected aggregate, got {other}"),
        }
        assert!(err.to_string().contains("did you mean 'shakapacker'"));
    }

    #[test]
    fn test_duplicate_dependency_is_rejected() {
        let config =
            parse("gems:\n  shakapacker: /a\ngithub:\n  shakapacker: shakacode/shakapacker\n")
                .unwrap();
        let err = config.targets().unwrap_err();
        assert!(err.to_string().contains("both 'gems' and 'github'"));
    }

    #[test]
    fn test_relative_paths_resolve_against_config_dir() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(".swap-deps.yml");
        std::fs::write(&path, "gems:\n  shakapacker: ../shakapacker\n").unwrap();

        let config = from_file(&path).unwrap();
        let targets = config.targets().unwrap();
        assert_eq!(
            targets[0].package_dir().unwrap(),
            temp.path().join("../shakapacker")
        );
        assert_eq!(
            config.project_roots(),
            vec![temp.path().join("demos"), temp.path().join("demos-scratch")]
        );
    }

    #[test]
    fn test_expand_home() {
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expand_path("~/src/x", Path::new("/base")), home.join("src/x"));
        }
        assert_eq!(
            expand_path("/abs", Path::new("/base")),
            PathBuf::from("/abs")
        );
        assert_eq!(
            expand_path("rel", Path::new("/base")),
            PathBuf::from("/base/rel")
        );
    }

    #[test]
    fn test_from_file_nonexistent() {
        let err = from_file("nonexistent_file.yml").unwrap_err();
        assert!(err.to_string().contains("nonexistent_file.yml"));
    }

    #[test]
    fn test_cache_name() {
        assert_eq!(cache_name("react-on-rails"), "react_on_rails");
        assert_eq!(cache_name("something-else"), "something-else");
    }
}
