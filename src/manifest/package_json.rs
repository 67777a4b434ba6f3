//! package.json rewriting.
//!
//! The manifest is parsed into a `serde_json::Value` (key order preserved)
//! and only the string values of managed packages are replaced. Unmodified
//! manifests are returned byte-for-byte, and modified ones are re-serialized
//! with the indentation the file already used.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use serde_json::{Map, Value as JsonValue};

use crate::dependency::{Dependency, NpmPackage};
use crate::error::{Error, Result};
use crate::manifest::{SwapKind, SwappedDependency};

/// Dependency groups searched for managed packages.
pub const DEPENDENCY_GROUPS: &[&str] = &[
    "dependencies",
    "devDependencies",
    "optionalDependencies",
    "peerDependencies",
];

const FILE_PREFIX: &str = "file:";

/// Result of rewriting one package in a manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageRewrite {
    pub content: String,
    /// Groups whose entry for the package was changed, in manifest order.
    pub modified_groups: Vec<String>,
}

impl PackageRewrite {
    pub fn is_modified(&self) -> bool {
        !self.modified_groups.is_empty()
    }
}

/// A parsed package.json.
#[derive(Debug, Clone)]
pub struct PackageManifest {
    path: PathBuf,
    original: String,
    root: Map<String, JsonValue>,
    indent: String,
}

impl PackageManifest {
    /// Parse `content`; `path` is only used for error messages.
    pub fn parse(path: &Path, content: &str) -> Result<Self> {
        let value: JsonValue = serde_json::from_str(content).map_err(|e| Error::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        let JsonValue::Object(root) = value else {
            return Err(Error::Parse {
                path: path.to_path_buf(),
                message: "top-level value must be an object".to_string(),
            });
        };
        Ok(Self {
            path: path.to_path_buf(),
            original: content.to_string(),
            root,
            indent: detect_indent(content),
        })
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::parse(path, &content)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Point `npm_name` at `file:<local_path>` in every group that already
    /// lists it. Entries that are already `file:` references stay as they are.
    pub fn set_local(&mut self, npm_name: &str, local_path: &Path) -> Vec<String> {
        let reference = format!("{FILE_PREFIX}{}", local_path.display());
        let mut modified = Vec::new();

        for group in DEPENDENCY_GROUPS {
            let Some(JsonValue::Object(deps)) = self.root.get_mut(*group) else {
                continue;
            };
            let Some(current) = deps.get_mut(npm_name) else {
                continue;
            };
            if current.as_str().is_some_and(|v| v.starts_with(FILE_PREFIX)) {
                continue;
            }
            *current = JsonValue::String(reference.clone());
            modified.push(group.to_string());
        }
        modified
    }

    /// Managed packages currently pointing at a `file:` or git reference.
    pub fn swapped(&self) -> Vec<SwappedDependency> {
        let mut found: Vec<SwappedDependency> = Vec::new();
        for dep in Dependency::ALL {
            let NpmPackage::Published(npm_name) = dep.npm_package() else {
                continue;
            };
            let value = DEPENDENCY_GROUPS
                .iter()
                .filter_map(|group| self.root.get(*group)?.get(npm_name)?.as_str())
                .find_map(classify_value);
            if let Some((kind, path)) = value {
                found.push(SwappedDependency {
                    name: npm_name.to_string(),
                    kind,
                    path,
                });
            }
        }
        found
    }

    /// Serialize back to text. Returns the original bytes when nothing was
    /// changed since parsing.
    pub fn render(&self) -> Result<String> {
        let unchanged = serde_json::from_str::<JsonValue>(&self.original)
            .map(|v| v == JsonValue::Object(self.root.clone()))
            .unwrap_or(false);
        if unchanged {
            return Ok(self.original.clone());
        }

        let mut buffer = Vec::new();
        let formatter = PrettyFormatter::with_indent(self.indent.as_bytes());
        let mut serializer = serde_json::Serializer::with_formatter(&mut buffer, formatter);
        self.root.serialize(&mut serializer)?;

        let mut rendered = String::from_utf8(buffer).map_err(|e| Error::Parse {
            path: self.path.clone(),
            message: e.to_string(),
        })?;
        if self.original.ends_with('\n') {
            rendered.push('\n');
        }
        Ok(rendered)
    }
}

fn classify_value(value: &str) -> Option<(SwapKind, String)> {
    if let Some(path) = value.strip_prefix(FILE_PREFIX) {
        return Some((SwapKind::Local, path.to_string()));
    }
    for prefix in ["github:", "git+", "git://"] {
        if value.starts_with(prefix) {
            return Some((SwapKind::Remote, value.to_string()));
        }
    }
    None
}

/// Indentation of the first indented line, defaulting to two spaces.
fn detect_indent(content: &str) -> String {
    content
        .lines()
        .skip(1)
        .map(|line| {
            line.chars()
                .take_while(|c| *c == ' ' || *c == '\t')
                .collect::<String>()
        })
        .find(|indent| !indent.is_empty())
        .unwrap_or_else(|| "  ".to_string())
}

/// Rewrite `npm_name` to a `file:` reference in `content`.
pub fn rewrite_to_local(content: &str, npm_name: &str, local_path: &Path) -> Result<PackageRewrite> {
    let mut manifest = PackageManifest::parse(Path::new("package.json"), content)?;
    let modified_groups = manifest.set_local(npm_name, local_path);
    Ok(PackageRewrite {
        content: manifest.render()?,
        modified_groups,
    })
}

/// Read the package.json at `path` and report swapped packages.
/// A missing file yields an empty list.
pub fn detect_swapped(path: &Path) -> Result<Vec<SwappedDependency>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    Ok(PackageManifest::load(path)?.swapped())
}
