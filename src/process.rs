//! OS process inspection and signalling for watch processes.
//!
//! A pid alone is not proof that a recorded watch process is still running:
//! pids get reused. Callers combine `is_alive` with `matches_signature`,
//! which checks the live command line for the expected tokens.

use std::ffi::OsStr;
use std::fs;
use std::path::Path;
use std::process::Command;

use log::debug;

use crate::error::{Error, Result};

/// What happened when a process group was asked to terminate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// SIGTERM was delivered.
    Signalled,
    /// No such process (or group) any more.
    AlreadyGone,
    /// The process belongs to someone we may not signal.
    Denied,
}

/// Whether `pid` refers to an existing process (ours or not).
#[cfg(unix)]
pub fn is_alive(pid: u32) -> bool {
    use nix::errno::Errno;
    use nix::sys::signal::kill;
    use nix::unistd::Pid;

    let Ok(raw) = i32::try_from(pid) else {
        return false;
    };
    if raw <= 0 {
        return false;
    }
    match kill(Pid::from_raw(raw), None) {
        Ok(()) | Err(Errno::EPERM) => true,
        Err(Errno::ESRCH) => false,
        Err(err) => {
            debug!("pid {} check returned unexpected error: {}", pid, err);
            false
        }
    }
}

#[cfg(not(unix))]
pub fn is_alive(_pid: u32) -> bool {
    false
}

/// Command line of `pid`, arguments joined by spaces. `None` when the
/// process is gone, is a zombie, or cannot be inspected.
pub fn command_line(pid: u32) -> Option<String> {
    let proc_cmdline = format!("/proc/{pid}/cmdline");
    if let Ok(raw) = fs::read(&proc_cmdline) {
        let args: Vec<String> = raw
            .split(|b| *b == 0)
            .filter(|part| !part.is_empty())
            .map(|part| String::from_utf8_lossy(part).into_owned())
            .collect();
        // Zombies keep their /proc entry but report an empty command line
        return (!args.is_empty()).then(|| args.join(" "));
    }

    let output = Command::new("ps")
        .args(["-o", "args=", "-p", &pid.to_string()])
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    let line = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if line.is_empty() || line.contains("<defunct>") {
        return None;
    }
    Some(line)
}

/// Whether `pid` is alive and its command line contains every token of
/// `signature`.
pub fn matches_signature(pid: u32, signature: &[String]) -> bool {
    if !is_alive(pid) {
        return false;
    }
    command_line(pid).is_some_and(|line| line_matches(&line, signature))
}

/// Every token must equal a whole word of `line`, or the file name of a
/// word given as a path (`/usr/bin/npm` matches `npm`, `pnpm` does not).
fn line_matches(line: &str, signature: &[String]) -> bool {
    let words: Vec<&str> = line.split_whitespace().collect();
    signature.iter().all(|token| {
        words.iter().any(|word| {
            *word == token.as_str() || Path::new(word).file_name() == Some(OsStr::new(token))
        })
    })
}

/// Send SIGTERM to the process group led by `pid`, falling back to the
/// process itself when it no longer leads a group.
#[cfg(unix)]
pub fn terminate_group(pid: u32) -> Result<Termination> {
    use nix::errno::Errno;
    use nix::sys::signal::{kill, killpg, Signal};
    use nix::unistd::Pid;

    let raw = i32::try_from(pid)
        .ok()
        .filter(|raw| *raw > 0)
        .ok_or_else(|| Error::Process {
            pid,
            message: "not a valid process id".to_string(),
        })?;
    let target = Pid::from_raw(raw);

    let result = match killpg(target, Signal::SIGTERM) {
        Err(Errno::ESRCH) => kill(target, Signal::SIGTERM),
        other => other,
    };
    classify_signal_result(pid, result)
}

#[cfg(unix)]
fn classify_signal_result(pid: u32, result: nix::Result<()>) -> Result<Termination> {
    use nix::errno::Errno;

    match result {
        Ok(()) => Ok(Termination::Signalled),
        Err(Errno::ESRCH) => Ok(Termination::AlreadyGone),
        Err(Errno::EPERM) => Ok(Termination::Denied),
        Err(err) => Err(Error::Process {
            pid,
            message: format!("failed to send SIGTERM: {err}"),
        }),
    }
}

#[cfg(not(unix))]
pub fn terminate_group(pid: u32) -> Result<Termination> {
    Err(Error::Process {
        pid,
        message: "terminating watch processes is only supported on Unix".to_string(),
    })
}
