//! # CLI Command Implementations
//!
//! The binary has one flat flag surface; `cli::Cli::execute` picks a mode and
//! hands off to one of these modules:
//!
//! - [`swap`]: swap, restore and status across projects
//! - [`cache`]: `--show-cache` and `--clean-cache`
//! - [`watch`]: `--list-watch` and `--kill-watch`
//!
//! [`Context`] resolves everything the modes share: output styling, the cache
//! root, the config file, and the library components wired with the CLI's
//! executables.

pub mod cache;
pub mod swap;
pub mod watch;

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context as _, Result};
use log::debug;

use crate::cli::Cli;
use swap_deps::cache::CacheManager;
use swap_deps::config::{self, SwapConfig};
use swap_deps::defaults::{self, CONFIG_FILE_NAME, DEFAULT_PROJECT_ROOTS};
use swap_deps::dependency::{Dependency, DependencyTarget};
use swap_deps::discovery::ProjectScope;
use swap_deps::orchestrator::Orchestrator;
use swap_deps::output::OutputConfig;
use swap_deps::refspec;
use swap_deps::toolchain::SystemToolchain;
use swap_deps::watch::WatchManager;

/// State shared by every mode of one invocation.
pub struct Context {
    pub output: OutputConfig,
    pub cache_root: PathBuf,
    pub dry_run: bool,
    pub verbose: bool,
    cwd: PathBuf,
    bundle_command: String,
    npm_command: String,
    git_base: String,
    watch_delay: Duration,
}

impl Context {
    pub fn from_cli(cli: &Cli) -> Result<Self> {
        let cwd = std::env::current_dir().context("Failed to read the current directory")?;
        let cache_root = cli
            .cache_root
            .as_ref()
            .map(|root| config::expand_path(&root.to_string_lossy(), &cwd))
            .unwrap_or_else(defaults::default_cache_root);
        debug!("Cache root: {}", cache_root.display());

        Ok(Self {
            output: OutputConfig::from_env_and_flag(&cli.color),
            cache_root,
            dry_run: cli.dry_run,
            verbose: cli.verbose,
            cwd,
            bundle_command: cli.bundle_command.clone(),
            npm_command: cli.npm_command.clone(),
            git_base: cli.git_base.clone(),
            watch_delay: Duration::from_millis(cli.watch_delay_ms),
        })
    }

    pub fn cache_manager(&self) -> CacheManager {
        CacheManager::new(defaults::repos_dir(&self.cache_root))
            .with_git_base(self.git_base.clone())
            .dry_run(self.dry_run)
    }

    pub fn watch_manager(&self) -> WatchManager {
        WatchManager::in_cache_root(&self.cache_root).with_verify_delay(self.watch_delay)
    }

    pub fn orchestrator(&self) -> Orchestrator {
        Orchestrator::new(
            self.cache_manager(),
            self.watch_manager(),
            Box::new(SystemToolchain::with_programs(
                self.bundle_command.clone(),
                self.npm_command.clone(),
            )),
        )
        .dry_run(self.dry_run)
    }

    /// The config file named by `--config`, or `./.swap-deps.yml` when it
    /// exists. An explicit `--config` that cannot be read is an error.
    pub fn load_config(&self, cli: &Cli) -> Result<Option<(PathBuf, SwapConfig)>> {
        let (path, explicit) = match &cli.config {
            Some(path) => (config::expand_path(&path.to_string_lossy(), &self.cwd), true),
            None => (self.cwd.join(CONFIG_FILE_NAME), false),
        };
        if !explicit && !path.is_file() {
            debug!("No config file at {}", path.display());
            return Ok(None);
        }
        let loaded = config::from_file(&path)?;
        debug!("Loaded config from {}", path.display());
        Ok(Some((path, loaded)))
    }

    /// Projects this invocation works on.
    pub fn projects(&self, cli: &Cli, swap_config: Option<&SwapConfig>) -> Result<Vec<PathBuf>> {
        let scope = match &cli.path {
            Some(path) => {
                let dir = config::expand_path(&path.to_string_lossy(), &self.cwd);
                if !dir.is_dir() {
                    anyhow::bail!("--path {} is not a directory", dir.display());
                }
                if cli.recursive {
                    ProjectScope::Recursive(dir)
                } else {
                    ProjectScope::Single(dir)
                }
            }
            None => ProjectScope::Roots(match swap_config {
                Some(swap_config) => swap_config.project_roots(),
                None => DEFAULT_PROJECT_ROOTS
                    .iter()
                    .map(|root| self.cwd.join(root))
                    .collect(),
            }),
        };
        Ok(scope.discover()?)
    }

    /// Swap targets from the dependency flags, `--github`, and (with
    /// `--apply`) the config file. Flags win over config entries for the
    /// same dependency.
    pub fn targets(
        &self,
        cli: &Cli,
        loaded: Option<&(PathBuf, SwapConfig)>,
    ) -> Result<Vec<DependencyTarget>> {
        let mut targets = Vec::new();
        let local_flags = [
            (Dependency::Shakapacker, &cli.shakapacker),
            (Dependency::ReactOnRails, &cli.react_on_rails),
            (Dependency::CypressOnRails, &cli.cypress_on_rails),
        ];
        for (dependency, path) in local_flags {
            if let Some(path) = path {
                targets.push(DependencyTarget::local(
                    dependency,
                    local_path(path, &self.cwd),
                ));
            }
        }

        for spec in &cli.github {
            let spec = refspec::parse(spec)?;
            let dependency = Dependency::from_repository(&spec)?;
            targets.push(DependencyTarget::remote(dependency, spec));
        }

        if cli.apply {
            let Some((config_path, swap_config)) = loaded else {
                anyhow::bail!(
                    "--apply needs a config file; create {} or pass --config FILE",
                    CONFIG_FILE_NAME
                );
            };
            if swap_config.is_empty() {
                return Err(config::nothing_to_swap(config_path).into());
            }
            for target in swap_config.targets()? {
                if targets.iter().any(|t: &DependencyTarget| t.dependency == target.dependency) {
                    debug!(
                        "{} given on the command line, ignoring config entry",
                        target.dependency
                    );
                    continue;
                }
                targets.push(target);
            }
        }
        Ok(targets)
    }
}

fn local_path(path: &Path, cwd: &Path) -> PathBuf {
    config::expand_path(&path.to_string_lossy(), cwd)
}
