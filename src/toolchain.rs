//! External package-manager collaborators: `bundle install`, `npm install`
//! and `npm run build`.
//!
//! They sit behind the `Toolchain` trait so the orchestrator can be tested
//! with a recording fake. The system implementation runs each command to
//! completion with no timeout.

use std::path::Path;
use std::process::Command;

use log::debug;

use crate::error::{Error, Result};

pub trait Toolchain {
    /// Re-resolve Ruby dependencies in `project`.
    fn bundle_install(&self, project: &Path) -> Result<()>;

    /// Re-resolve npm dependencies in `project`.
    fn npm_install(&self, project: &Path) -> Result<()>;

    /// Build the npm package checked out at `package_dir`.
    fn build_package(&self, package_dir: &Path) -> Result<()>;
}

/// Runs the real `bundle` and `npm` executables.
#[derive(Debug, Clone)]
pub struct SystemToolchain {
    bundle: String,
    npm: String,
}

impl Default for SystemToolchain {
    fn default() -> Self {
        Self {
            bundle: "bundle".to_string(),
            npm: "npm".to_string(),
        }
    }
}

impl SystemToolchain {
    /// Use other executables for bundler and npm.
    pub fn with_programs(bundle: impl Into<String>, npm: impl Into<String>) -> Self {
        Self {
            bundle: bundle.into(),
            npm: npm.into(),
        }
    }

    fn run(&self, program: &str, args: &[&str], dir: &Path) -> Result<()> {
        let described = format!("{} {}", program, args.join(" "));
        debug!("Running '{}' in {}", described, dir.display());

        let output = Command::new(program)
            .args(args)
            .current_dir(dir)
            .output()
            .map_err(|e| Error::Build {
                target: dir.display().to_string(),
                message: format!("could not run '{described}': {e}"),
            })?;

        if output.status.success() {
            return Ok(());
        }
        let stderr = String::from_utf8_lossy(&output.stderr);
        let detail = stderr
            .lines()
            .rev()
            .find(|line| !line.trim().is_empty())
            .map(|line| format!(": {}", line.trim()))
            .unwrap_or_default();
        Err(Error::Build {
            target: dir.display().to_string(),
            message: format!("'{described}' exited with {}{detail}", output.status),
        })
    }
}

impl Toolchain for SystemToolchain {
    fn bundle_install(&self, project: &Path) -> Result<()> {
        self.run(&self.bundle, &["install"], project)
    }

    fn npm_install(&self, project: &Path) -> Result<()> {
        self.run(&self.npm, &["install"], project)
    }

    fn build_package(&self, package_dir: &Path) -> Result<()> {
        self.run(&self.npm, &["run", "build"], package_dir)
    }
}
