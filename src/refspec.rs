//! # Repository References
//!
//! Parsing and validation of the compact repository reference accepted by
//! `--github` and the config file:
//!
//! - `org/repo` - the repository's default branch
//! - `org/repo#branch` - a branch
//! - `org/repo@tag` - a tag
//!
//! `@` is checked before `#`, and only the first `@` acts as a delimiter, so a
//! tag may itself contain `@`.

use std::fmt;
use std::str::FromStr;

use url::Url;

use crate::error::{Error, Result};

/// Default base URL used to build clone URLs.
pub const DEFAULT_GIT_BASE: &str = "https://github.com/";

/// Branch names that are written out of Gemfile declarations entirely.
pub const DEFAULT_BRANCHES: &[&str] = &["main", "master"];

/// Characters (and sequences) git refuses in ref names.
const FORBIDDEN_REF_SEQUENCES: &[&str] = &["..", "~", "^", ":", "?", "*", "[", "\\", " ", "@{"];

/// Kind of git reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RefKind {
    Branch,
    Tag,
}

impl fmt::Display for RefKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RefKind::Branch => write!(f, "branch"),
            RefKind::Tag => write!(f, "tag"),
        }
    }
}

/// A named branch or tag.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum GitRef {
    Branch(String),
    Tag(String),
}

impl GitRef {
    pub fn name(&self) -> &str {
        match self {
            GitRef::Branch(name) | GitRef::Tag(name) => name,
        }
    }

    pub fn kind(&self) -> RefKind {
        match self {
            GitRef::Branch(_) => RefKind::Branch,
            GitRef::Tag(_) => RefKind::Tag,
        }
    }

    /// True for branches conventionally used as a repository's default.
    /// Tags are never considered default, whatever their name.
    pub fn is_default_branch(&self) -> bool {
        match self {
            GitRef::Branch(name) => DEFAULT_BRANCHES.contains(&name.as_str()),
            GitRef::Tag(_) => false,
        }
    }
}

/// A validated `org/repo` with an optional branch or tag.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RefSpec {
    repository: String,
    reference: Option<GitRef>,
}

impl RefSpec {
    /// Build a spec from parts, validating both.
    pub fn new(repository: &str, reference: Option<GitRef>) -> Result<Self> {
        validate_repository(repository)?;
        if let Some(reference) = &reference {
            validate_ref(reference.name())?;
        }
        Ok(Self {
            repository: repository.to_string(),
            reference,
        })
    }

    /// The `org/name` part.
    pub fn repository(&self) -> &str {
        &self.repository
    }

    pub fn reference(&self) -> Option<&GitRef> {
        self.reference.as_ref()
    }

    pub fn ref_name(&self) -> Option<&str> {
        self.reference.as_ref().map(GitRef::name)
    }

    pub fn ref_kind(&self) -> Option<RefKind> {
        self.reference.as_ref().map(GitRef::kind)
    }

    pub fn org(&self) -> &str {
        self.repository
            .split_once('/')
            .map(|(org, _)| org)
            .unwrap_or(&self.repository)
    }

    pub fn name(&self) -> &str {
        self.repository
            .split_once('/')
            .map(|(_, name)| name)
            .unwrap_or(&self.repository)
    }

    /// Clone URL for this repository relative to `base`
    /// (e.g. `https://github.com/` -> `https://github.com/org/repo.git`).
    pub fn clone_url(&self, base: &str) -> Result<Url> {
        let base = if base.ends_with('/') {
            Url::parse(base)?
        } else {
            Url::parse(&format!("{}/", base))?
        };
        Ok(base.join(&format!("{}.git", self.repository))?)
    }
}

impl fmt::Display for RefSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.reference {
            None => write!(f, "{}", self.repository),
            Some(GitRef::Branch(name)) => write!(f, "{}#{}", self.repository, name),
            Some(GitRef::Tag(name)) => write!(f, "{}@{}", self.repository, name),
        }
    }
}

impl FromStr for RefSpec {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        parse(s)
    }
}

/// Parse `org/repo`, `org/repo#branch` or `org/repo@tag`.
pub fn parse(spec: &str) -> Result<RefSpec> {
    let invalid = |message: &str| Error::InvalidSpec {
        spec: spec.to_string(),
        message: message.to_string(),
    };

    let (repository, reference) = if let Some((repo, tag)) = spec.split_once('@') {
        if tag.is_empty() {
            return Err(invalid("tag is empty after '@'"));
        }
        (repo, Some(GitRef::Tag(tag.to_string())))
    } else if let Some((repo, branch)) = spec.split_once('#') {
        if branch.is_empty() {
            return Err(invalid("branch is empty after '#'"));
        }
        (repo, Some(GitRef::Branch(branch.to_string())))
    } else {
        (spec, None)
    };

    if repository.is_empty() {
        return Err(invalid("repository is empty"));
    }

    validate_repository(repository).map_err(|e| rename_spec(e, spec))?;
    if let Some(reference) = &reference {
        validate_ref(reference.name()).map_err(|e| rename_spec(e, spec))?;
    }

    Ok(RefSpec {
        repository: repository.to_string(),
        reference,
    })
}

/// Report validation failures against the whole input rather than the part.
fn rename_spec(error: Error, spec: &str) -> Error {
    match error {
        Error::InvalidSpec { message, .. } => Error::InvalidSpec {
            spec: spec.to_string(),
            message,
        },
        other => other,
    }
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-')
}

/// Check that `repository` looks like `org/name`.
pub fn validate_repository(repository: &str) -> Result<()> {
    let invalid = |message: String| Error::InvalidSpec {
        spec: repository.to_string(),
        message,
    };

    let (org, name) = repository
        .split_once('/')
        .ok_or_else(|| invalid("repository must have the form 'org/name'".to_string()))?;

    if org.is_empty() {
        return Err(invalid("organization is empty".to_string()));
    }
    if name.is_empty() {
        return Err(invalid("repository name is empty".to_string()));
    }
    if let Some(bad) = org.chars().chain(name.chars()).find(|c| !is_name_char(*c)) {
        return Err(invalid(format!(
            "character '{}' is not allowed in a repository (use letters, digits, '_', '.', '-')",
            bad
        )));
    }
    Ok(())
}

/// Check `name` against git's ref naming rules.
pub fn validate_ref(name: &str) -> Result<()> {
    let invalid = |message: String| Error::InvalidSpec {
        spec: name.to_string(),
        message,
    };

    if name.is_empty() {
        return Err(invalid("ref is empty".to_string()));
    }
    if let Some(seq) = FORBIDDEN_REF_SEQUENCES.iter().find(|seq| name.contains(*seq)) {
        let shown = if *seq == " " { "space" } else { seq };
        return Err(invalid(format!("ref must not contain '{}'", shown)));
    }
    if let Some(c) = name.chars().find(|c| c.is_control()) {
        return Err(invalid(format!(
            "ref must not contain control character {:?}",
            c
        )));
    }
    if name.ends_with(".lock") {
        return Err(invalid("ref must not end with '.lock'".to_string()));
    }
    if name.starts_with('-') {
        return Err(invalid("ref must not start with '-'".to_string()));
    }
    if name == "@" {
        return Err(invalid("'@' alone is not a valid ref".to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bare_repository() {
        let spec = parse("shakacode/shakapacker").unwrap();
        assert_eq!(spec.repository(), "shakacode/shakapacker");
        assert_eq!(spec.reference(), None);
        assert_eq!(spec.ref_kind(), None);
        assert_eq!(spec.org(), "shakacode");
        assert_eq!(spec.name(), "shakapacker");
    }

    #[test]
    fn test_parse_branch() {
        let spec = parse("shakacode/react_on_rails#feature/ssr").unwrap();
        assert_eq!(spec.ref_name(), Some("feature/ssr"));
        assert_eq!(spec.ref_kind(), Some(RefKind::Branch));
    }

    #[test]
    fn test_parse_tag() {
        let spec = parse("shakacode/shakapacker@v8.0.0").unwrap();
        assert_eq!(spec.ref_name(), Some("v8.0.0"));
        assert_eq!(spec.ref_kind(), Some(RefKind::Tag));
    }

    #[test]
    fn test_parse_only_first_at_is_delimiter() {
        let spec = parse("org/repo@release@2024").unwrap();
        assert_eq!(spec.repository(), "org/repo");
        assert_eq!(spec.reference(), Some(&GitRef::Tag("release@2024".to_string())));
    }

    #[test]
    fn test_parse_at_takes_precedence_over_hash() {
        let spec = parse("org/repo@v1#x").unwrap();
        assert_eq!(spec.reference(), Some(&GitRef::Tag("v1#x".to_string())));
    }

    #[test]
    fn test_parse_empty_ref_rejected() {
        assert!(matches!(parse("org/repo#"), Err(Error::InvalidSpec { .. })));
        assert!(matches!(parse("org/repo@"), Err(Error::InvalidSpec { .. })));
    }

    #[test]
    fn test_parse_empty_repository_rejected() {
        let err = parse("#main").unwrap_err();
        assert!(err.to_string().contains("repository is empty"));
        assert!(parse("").is_err());
    }

    #[test]
    fn test_validate_repository_shapes() {
        assert!(validate_repository("org/name").is_ok());
        assert!(validate_repository("my-org/name.rb_2").is_ok());
        assert!(validate_repository("noslash").is_err());
        assert!(validate_repository("/name").is_err());
        assert!(validate_repository("org/").is_err());
        assert!(validate_repository("org/na/me").is_err());

        let err = validate_repository("org/na me").unwrap_err();
        assert!(err.to_string().contains("' '"));
    }

    #[test]
    fn test_validate_ref_rules() {
        assert!(validate_ref("main").is_ok());
        assert!(validate_ref("feature/new-thing").is_ok());
        assert!(validate_ref("v1.0.0").is_ok());
        assert!(validate_ref("user@host").is_ok());

        for bad in [
            "a..b", "a~1", "a^", "a:b", "a?", "a*", "a[0]", "a\\b", "a b", "x@{1}",
        ] {
            assert!(validate_ref(bad).is_err(), "expected '{}' to be rejected", bad);
        }
        assert!(validate_ref("branch.lock").is_err());
        assert!(validate_ref("-upload-pack=evil").is_err());
        assert!(validate_ref("").is_err());
    }

    #[test]
    fn test_validate_ref_names_rule() {
        let err = validate_ref("a b").unwrap_err();
        assert!(err.to_string().contains("space"));
        let err = validate_ref("topic.lock").unwrap_err();
        assert!(err.to_string().contains(".lock"));
    }

    #[test]
    fn test_parse_reports_whole_spec() {
        let err = parse("org/repo#bad..ref").unwrap_err();
        match err {
            Error::InvalidSpec { spec, message } => {
                assert_eq!(spec, "org/repo#bad..ref");
                assert!(message.contains(".."));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_display_round_trip() {
        for input in ["org/repo", "org/repo#dev", "org/repo@v1.2.3"] {
            assert_eq!(parse(input).unwrap().to_string(), input);
        }
    }

    #[test]
    fn test_default_branch_detection() {
        assert!(GitRef::Branch("main".to_string()).is_default_branch());
        assert!(GitRef::Branch("master".to_string()).is_default_branch());
        assert!(!GitRef::Branch("develop".to_string()).is_default_branch());
        assert!(!GitRef::Tag("main".to_string()).is_default_branch());
    }

    #[test]
    fn test_clone_url() {
        let spec = parse("shakacode/shakapacker#main").unwrap();
        assert_eq!(
            spec.clone_url(DEFAULT_GIT_BASE).unwrap().as_str(),
            "https://github.com/shakacode/shakapacker.git"
        );
        assert_eq!(
            spec.clone_url("file:///srv/git").unwrap().as_str(),
            "file:///srv/git/shakacode/shakapacker.git"
        );
    }

    #[test]
    fn test_from_str() {
        let spec: RefSpec = "org/repo#x".parse().unwrap();
        assert_eq!(spec.ref_name(), Some("x"));
    }
}
