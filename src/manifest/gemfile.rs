//! Gemfile rewriting.
//!
//! Declarations are matched line by line:
//!
//! ```text
//!   gem "react_on_rails", "~> 14.0", require: false  # pinned
//!   ^^  ^ ^^^^^^^^^^^^^^  ^^^^^^^^^  ^^^^^^^^^^^^^^^^^^^^^^^^^
//!   |   |     name        versions   trailing options / comment
//!   |   quote style
//!   indentation
//! ```
//!
//! Rewriting drops the version constraints and inserts the new source
//! right after the name, keeping indentation, quote style, and everything
//! that follows. A line that already carries `path:`, `git:` or `github:`
//! is never touched again.

use std::fs;
use std::path::Path;

use regex::{Captures, Regex};

use crate::dependency::Dependency;
use crate::error::Result;
use crate::manifest::{SwapKind, SwappedDependency};
use crate::refspec::{GitRef, RefSpec};

/// Leading version constraints: `, "~> 1.0", '>= 1.0.1'`.
const VERSIONS_PATTERN: &str = r#"^(?:\s*,\s*(?:'[^']*'|"[^"]*"))*"#;

/// Any source option that means the declaration is already swapped.
const MARKER_PATTERN: &str = r"(?:^|[\s,(])(?:path|git|github)\s*:|:(?:path|git|github)\s*=>";

/// Any `gem` declaration; used for detection.
const ANY_GEM_PATTERN: &str = r#"(?m)^[ \t]*gem[ \t]+['"](?P<name>[^'"]+)['"](?P<rest>[^\n]*)$"#;

fn declaration_regex(gem_name: &str) -> Result<Regex> {
    Ok(Regex::new(&format!(
        r#"(?m)^(?P<indent>[ \t]*)gem(?P<sep>[ \t]+)(?P<q>['"]){}['"](?P<rest>[^\n]*)$"#,
        regex::escape(gem_name)
    ))?)
}

/// Regex for a single option value, accepting both `key: "v"` and
/// `:key => "v"` spellings.
fn option_regex(key: &str) -> Result<Regex> {
    Ok(Regex::new(&format!(
        r#"(?:(?:^|[\s,(]){key}:|:{key}\s*=>)\s*['"](?P<value>[^'"]*)['"]"#
    ))?)
}

/// Shared rewrite loop: `render` receives the quote character and returns
/// the new source options (without the leading comma).
fn rewrite_declarations<F>(content: &str, gem_name: &str, render: F) -> Result<String>
where
    F: Fn(&str) -> String,
{
    let declaration = declaration_regex(gem_name)?;
    let marker = Regex::new(MARKER_PATTERN)?;
    let versions = Regex::new(VERSIONS_PATTERN)?;

    let rewritten = declaration.replace_all(content, |caps: &Captures| {
        let rest = &caps["rest"];
        if marker.is_match(rest) {
            return caps[0].to_string();
        }
        let options_start = versions.find(rest).map(|m| m.end()).unwrap_or(0);
        let quote = &caps["q"];
        format!(
            "{indent}gem{sep}{quote}{gem_name}{quote}, {source}{options}",
            indent = &caps["indent"],
            sep = &caps["sep"],
            source = render(quote),
            options = &rest[options_start..],
        )
    });

    Ok(rewritten.into_owned())
}

/// Point `gem_name` at a local checkout.
///
/// `gem "foo", "~> 1.0"` becomes `gem "foo", path: "/x/y"`. Calling this on
/// its own output returns the output unchanged.
pub fn rewrite_to_local(content: &str, gem_name: &str, local_path: &Path) -> Result<String> {
    let path = local_path.display().to_string();
    rewrite_declarations(content, gem_name, |q| format!("path: {q}{path}{q}"))
}

/// Point `gem_name` at a GitHub repository.
///
/// Branches named `main` or `master` are left out (bundler's default),
/// tags are always written.
pub fn rewrite_to_remote(content: &str, gem_name: &str, refspec: &RefSpec) -> Result<String> {
    rewrite_declarations(content, gem_name, |q| {
        let mut source = format!("github: {q}{}{q}", refspec.repository());
        match refspec.reference() {
            Some(reference) if reference.is_default_branch() => {}
            Some(GitRef::Branch(name)) => source.push_str(&format!(", branch: {q}{name}{q}")),
            Some(GitRef::Tag(name)) => source.push_str(&format!(", tag: {q}{name}{q}")),
            None => {}
        }
        source
    })
}

/// Report managed gems that point at a local path or a git source.
pub fn detect_swapped_content(content: &str) -> Result<Vec<SwappedDependency>> {
    let any_gem = Regex::new(ANY_GEM_PATTERN)?;
    let path_opt = option_regex("path")?;
    let github_opt = option_regex("github")?;
    let git_opt = option_regex("git")?;
    let branch_opt = option_regex("branch")?;
    let tag_opt = option_regex("tag")?;

    let value = |re: &Regex, rest: &str| re.captures(rest).map(|c| c["value"].to_string());

    let mut found = Vec::new();
    for caps in any_gem.captures_iter(content) {
        let name = &caps["name"];
        if Dependency::ALL.iter().all(|dep| dep.gem_name() != name) {
            continue;
        }
        let rest = &caps["rest"];

        let detected = if let Some(path) = value(&path_opt, rest) {
            Some((SwapKind::Local, path))
        } else if let Some(repo) = value(&github_opt, rest).or_else(|| value(&git_opt, rest)) {
            let described = if let Some(tag) = value(&tag_opt, rest) {
                format!("{repo}@{tag}")
            } else if let Some(branch) = value(&branch_opt, rest) {
                format!("{repo}#{branch}")
            } else {
                repo
            };
            Some((SwapKind::Remote, described))
        } else {
            None
        };

        if let Some((kind, path)) = detected {
            found.push(SwappedDependency {
                name: name.to_string(),
                kind,
                path,
            });
        }
    }
    Ok(found)
}

/// Read the Gemfile at `path` and report swapped gems; missing file -> empty.
pub fn detect_swapped(path: &Path) -> Result<Vec<SwappedDependency>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let content = fs::read_to_string(path)?;
    detect_swapped_content(&content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::refspec;
    use std::path::PathBuf;

    const GEMFILE: &str = r#"source "https://rubygems.org"

gem "rails", "~> 7.1"
gem "shakapacker", "~> 8.0"
gem 'react_on_rails', '~> 14.0', '>= 14.0.1', require: false

group :test do
  gem "cypress-on-rails", "~> 1.0" # e2e
end
"#;

    #[test]
    fn test_rewrite_to_local_basic() {
        let out = rewrite_to_local(
            "gem \"foo\", \"~> 1.0\"\n",
            "foo",
            &PathBuf::from("/x/y"),
        )
        .unwrap();
        assert_eq!(out, "gem \"foo\", path: \"/x/y\"\n");
    }

    #[test]
    fn test_rewrite_to_local_preserves_quotes_and_options() {
        let out = rewrite_to_local(GEMFILE, "react_on_rails", &PathBuf::from("/src/ror")).unwrap();
        assert!(out.contains("gem 'react_on_rails', path: '/src/ror', require: false\n"));
        assert!(out.contains("gem \"rails\", \"~> 7.1\"\n"));
        assert!(out.contains("gem \"shakapacker\", \"~> 8.0\"\n"));
    }

    #[test]
    fn test_rewrite_to_local_preserves_indentation_and_comment() {
        let out =
            rewrite_to_local(GEMFILE, "cypress-on-rails", &PathBuf::from("/src/cor")).unwrap();
        assert!(out.contains("  gem \"cypress-on-rails\", path: \"/src/cor\" # e2e\n"));
    }

    #[test]
    fn test_rewrite_to_local_without_version() {
        let out = rewrite_to_local("gem 'foo'\n", "foo", &PathBuf::from("/p")).unwrap();
        assert_eq!(out, "gem 'foo', path: '/p'\n");
    }

    #[test]
    fn test_rewrite_to_local_is_idempotent() {
        let path = PathBuf::from("/src/shakapacker");
        let once = rewrite_to_local(GEMFILE, "shakapacker", &path).unwrap();
        let twice = rewrite_to_local(&once, "shakapacker", &path).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_rewrite_leaves_swapped_declaration_alone() {
        let input = "gem \"shakapacker\", github: \"me/shakapacker\"\n";
        let out = rewrite_to_local(input, "shakapacker", &PathBuf::from("/elsewhere")).unwrap();
        assert_eq!(out, input);
    }

    #[test]
    fn test_rewrite_does_not_match_prefix_names() {
        let input = "gem \"shakapacker-extra\", \"1.0\"\n# gem \"shakapacker\"\n";
        let out = rewrite_to_local(input, "shakapacker", &PathBuf::from("/p")).unwrap();
        assert_eq!(out, input);
    }

    #[test]
    fn test_rewrite_to_remote_branch() {
        let spec = refspec::parse("shakacode/shakapacker#feature/x").unwrap();
        let out = rewrite_to_remote("gem \"shakapacker\", \"~> 8.0\"\n", "shakapacker", &spec)
            .unwrap();
        assert_eq!(
            out,
            "gem \"shakapacker\", github: \"shakacode/shakapacker\", branch: \"feature/x\"\n"
        );
    }

    #[test]
    fn test_rewrite_to_remote_omits_default_branch() {
        let spec = refspec::parse("shakacode/shakapacker#main").unwrap();
        let out = rewrite_to_remote("gem 'shakapacker'\n", "shakapacker", &spec).unwrap();
        assert_eq!(out, "gem 'shakapacker', github: 'shakacode/shakapacker'\n");
    }

    #[test]
    fn test_rewrite_to_remote_keeps_tag_named_like_default_branch() {
        let spec = refspec::parse("shakacode/shakapacker@main").unwrap();
        let out = rewrite_to_remote("gem 'shakapacker'\n", "shakapacker", &spec).unwrap();
        assert_eq!(
            out,
            "gem 'shakapacker', github: 'shakacode/shakapacker', tag: 'main'\n"
        );
    }

    #[test]
    fn test_detect_swapped_round_trip_local() {
        let path = PathBuf::from("/work/shakapacker");
        let out = rewrite_to_local(GEMFILE, "shakapacker", &path).unwrap();
        let found = detect_swapped_content(&out).unwrap();
        assert_eq!(
            found,
            vec![SwappedDependency {
                name: "shakapacker".to_string(),
                kind: SwapKind::Local,
                path: "/work/shakapacker".to_string(),
            }]
        );
    }

    #[test]
    fn test_detect_swapped_remote_variants() {
        let content = r#"gem "shakapacker", github: "me/shakapacker", branch: "dev"
gem "react_on_rails", :git => "https://example.com/ror.git", :tag => "v1"
gem "cypress-on-rails", github: "shakacode/cypress-on-rails"
gem "rails", path: "/not/managed"
"#;
        let found = detect_swapped_content(content).unwrap();
        let described: Vec<(&str, SwapKind, &str)> = found
            .iter()
            .map(|d| (d.name.as_str(), d.kind, d.path.as_str()))
            .collect();
        assert_eq!(
            described,
            vec![
                ("shakapacker", SwapKind::Remote, "me/shakapacker#dev"),
                (
                    "react_on_rails",
                    SwapKind::Remote,
                    "https://example.com/ror.git@v1"
                ),
                (
                    "cypress-on-rails",
                    SwapKind::Remote,
                    "shakacode/cypress-on-rails"
                ),
            ]
        );
    }

    #[test]
    fn test_detect_swapped_unswapped_manifest() {
        assert!(detect_swapped_content(GEMFILE).unwrap().is_empty());
    }

    #[test]
    fn test_detect_swapped_reads_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let gemfile = dir.path().join("Gemfile");
        fs::write(&gemfile, "gem 'shakapacker', path: '/a'\n").unwrap();
        let found = detect_swapped(&gemfile).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].path, "/a");
    }
}
