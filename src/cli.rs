//! CLI argument parsing and command dispatch

use std::path::PathBuf;

use anyhow::Result;
use clap::{ArgGroup, Parser};

use crate::commands::{self, Context};
use swap_deps::orchestrator::BuildMode;
use swap_deps::refspec::DEFAULT_GIT_BASE;

/// Swap Gemfile and package.json dependencies to local or GitHub checkouts
#[derive(Parser, Debug)]
#[command(name = "swap-deps")]
#[command(version, about, long_about = None)]
#[command(group(
    ArgGroup::new("mode")
        .args(["restore", "status", "list_watch", "kill_watch", "show_cache", "clean_cache"])
        .multiple(false)
))]
pub struct Cli {
    /// Use a local shakapacker checkout
    #[arg(long, value_name = "PATH")]
    pub shakapacker: Option<PathBuf>,

    /// Use a local react_on_rails checkout
    #[arg(long, value_name = "PATH")]
    pub react_on_rails: Option<PathBuf>,

    /// Use a local cypress-on-rails checkout
    #[arg(long, value_name = "PATH")]
    pub cypress_on_rails: Option<PathBuf>,

    /// Use a GitHub repository (repeatable); the dependency is picked from the repository name
    #[arg(long, value_name = "REPO[#BRANCH|@TAG]")]
    pub github: Vec<String>,

    /// Swap the dependencies listed in the config file
    #[arg(long)]
    pub apply: bool,

    /// Path to config file (defaults to ./.swap-deps.yml)
    #[arg(long, value_name = "FILE", env = "SWAP_DEPS_CONFIG")]
    pub config: Option<PathBuf>,

    /// Restore every swapped manifest from its backup
    #[arg(long)]
    pub restore: bool,

    /// Show swapped dependencies per project
    #[arg(long)]
    pub status: bool,

    /// Work on this project directory instead of the configured roots
    #[arg(long, value_name = "DIR")]
    pub path: Option<PathBuf>,

    /// With --path, also process every project below DIR
    #[arg(long, requires = "path")]
    pub recursive: bool,

    /// Build swapped npm packages after swapping (the default)
    #[arg(long, conflicts_with_all = ["skip_build", "watch"])]
    pub build: bool,

    /// Do not build swapped npm packages
    #[arg(long, conflicts_with = "watch")]
    pub skip_build: bool,

    /// Start a watch process for each swapped npm package
    #[arg(long)]
    pub watch: bool,

    /// List running watch processes
    #[arg(long)]
    pub list_watch: bool,

    /// Stop every tracked watch process
    #[arg(long)]
    pub kill_watch: bool,

    /// Show cached GitHub checkouts
    #[arg(long)]
    pub show_cache: bool,

    /// Remove cached checkouts, for one dependency or all of them
    #[arg(long, value_name = "DEPENDENCY", num_args = 0..=1)]
    pub clean_cache: Option<Option<String>>,

    /// Show what would be done without making changes
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// Show detailed progress information
    #[arg(short, long)]
    pub verbose: bool,

    /// Cache root directory
    #[arg(long, value_name = "DIR", env = "SWAP_DEPS_CACHE")]
    pub cache_root: Option<PathBuf>,

    /// Colorize output (always, never, auto)
    #[arg(long, value_name = "WHEN", default_value = "auto")]
    pub color: String,

    /// Set log level (error, warn, info, debug, trace)
    #[arg(long, value_name = "LEVEL", default_value = "warn")]
    pub log_level: String,

    /// Bundler executable
    #[arg(long, hide = true, env = "SWAP_DEPS_BUNDLE", default_value = "bundle")]
    pub bundle_command: String,

    /// npm executable
    #[arg(long, hide = true, env = "SWAP_DEPS_NPM", default_value = "npm")]
    pub npm_command: String,

    /// Base URL repositories are cloned from
    #[arg(long, hide = true, env = "SWAP_DEPS_GIT_BASE", default_value = DEFAULT_GIT_BASE)]
    pub git_base: String,

    /// How long a new watch process must stay up before it is recorded
    #[arg(long, hide = true, env = "SWAP_DEPS_WATCH_DELAY_MS", default_value_t = 2000)]
    pub watch_delay_ms: u64,
}

impl Cli {
    fn build_mode(&self) -> BuildMode {
        if self.watch {
            BuildMode::Watch
        } else if self.build || !self.skip_build {
            BuildMode::Build
        } else {
            BuildMode::Skip
        }
    }

    fn init_logging(&self) {
        let level = if self.verbose {
            "debug"
        } else {
            self.log_level.as_str()
        };
        let _ = env_logger::Builder::new()
            .parse_filters(level)
            .format_timestamp(None)
            .try_init();
    }

    /// Execute the CLI command
    pub fn execute(self) -> Result<()> {
        self.init_logging();
        let context = Context::from_cli(&self)?;

        if self.kill_watch {
            return commands::watch::kill(&context);
        }
        if self.list_watch {
            return commands::watch::list(&context);
        }
        if self.show_cache {
            return commands::cache::show(&context);
        }
        if let Some(name) = &self.clean_cache {
            return commands::cache::clean(&context, name.as_deref());
        }
        if self.status {
            return commands::swap::status(&context, &self);
        }
        if self.restore {
            return commands::swap::restore(&context, &self);
        }
        commands::swap::swap(&context, &self, self.build_mode())
    }
}
