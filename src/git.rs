//! Thin wrappers around the system `git` client.
//!
//! Using the `git` binary means SSH keys, credential helpers and
//! `~/.gitconfig` settings all apply without extra configuration.

use std::fs;
use std::path::Path;
use std::process::{Command, Output};

use log::debug;

use crate::error::{Error, Result};
use crate::refspec::{GitRef, RefSpec};

/// Ref passed to git for `spec`: the branch or tag name, or `HEAD`.
pub fn ref_arg(spec: &RefSpec) -> &str {
    spec.ref_name().unwrap_or("HEAD")
}

fn fetch_error(spec: &RefSpec, message: impl Into<String>) -> Error {
    Error::Fetch {
        repository: spec.repository().to_string(),
        r#ref: ref_arg(spec).to_string(),
        message: message.into(),
    }
}

fn run_git(spec: &RefSpec, args: &[&str], cwd: Option<&Path>) -> Result<Output> {
    let mut command = Command::new("git");
    command.args(args);
    if let Some(dir) = cwd {
        command.current_dir(dir);
    }
    debug!("Running git {}", args.join(" "));
    command
        .output()
        .map_err(|e| fetch_error(spec, format!("could not run git: {e}")))
}

/// Turn a failed git invocation into a `Fetch` error with a readable message.
fn check_status(spec: &RefSpec, output: &Output) -> Result<()> {
    if output.status.success() {
        return Ok(());
    }
    let stderr = String::from_utf8_lossy(&output.stderr);
    let stderr = stderr.trim();

    let message = if stderr.contains("Authentication failed")
        || stderr.contains("Permission denied")
        || stderr.contains("Could not read from remote repository")
    {
        format!("authentication failed; check your SSH key, git credentials or access token ({stderr})")
    } else if stderr.is_empty() {
        format!("git exited with {}", output.status)
    } else {
        stderr.lines().last().unwrap_or(stderr).to_string()
    };
    Err(fetch_error(spec, message))
}

/// Shallow-clone `url` at `spec`'s ref (or the default branch) into
/// `target_dir`, which must not exist yet.
pub fn clone_shallow(spec: &RefSpec, url: &str, target_dir: &Path) -> Result<()> {
    if let Some(parent) = target_dir.parent() {
        fs::create_dir_all(parent)?;
    }

    let target = target_dir.to_string_lossy().into_owned();
    let mut args = vec!["clone", "--depth=1", "--quiet"];
    if let Some(name) = spec.ref_name() {
        args.extend(["--branch", name]);
    }
    args.extend(["--", url, target.as_str()]);

    let output = run_git(spec, &args, None)?;
    check_status(spec, &output)
}

/// Bring an existing clone to the tip of `spec`'s ref: shallow fetch,
/// then hard reset. Never merges.
pub fn fetch_and_reset(spec: &RefSpec, url: &str, repo_dir: &Path) -> Result<()> {
    let refspec_arg = match spec.reference() {
        Some(GitRef::Tag(name)) => format!("refs/tags/{name}"),
        Some(GitRef::Branch(name)) => name.clone(),
        None => "HEAD".to_string(),
    };

    let output = run_git(
        spec,
        &["fetch", "--depth=1", "--quiet", url, &refspec_arg],
        Some(repo_dir),
    )?;
    check_status(spec, &output)?;

    let output = run_git(spec, &["reset", "--hard", "--quiet", "FETCH_HEAD"], Some(repo_dir))?;
    check_status(spec, &output)
}

/// Check that `spec`'s branch or tag exists on the remote.
/// Specs without a ref always exist.
pub fn remote_ref_exists(spec: &RefSpec, url: &str) -> Result<bool> {
    let full_ref = match spec.reference() {
        Some(GitRef::Branch(name)) => format!("refs/heads/{name}"),
        Some(GitRef::Tag(name)) => format!("refs/tags/{name}"),
        None => return Ok(true),
    };

    let output = run_git(spec, &["ls-remote", "--exit-code", url, &full_ref], None)?;
    match output.status.code() {
        Some(0) => Ok(true),
        // --exit-code reports "no matching refs" as 2
        Some(2) => Ok(false),
        _ => check_status(spec, &output).map(|_| false),
    }
}
