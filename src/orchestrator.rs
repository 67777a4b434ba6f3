//! # Swap Orchestrator
//!
//! Coordinates the other components for the three user-facing operations.
//!
//! ## Swap
//!
//! 1. **Validating** - every local path must be an existing directory outside
//!    the protected system directories; all problems are reported together.
//!    Remote targets are then materialized through the cache, again
//!    gathering every fetch failure before giving up.
//! 2. **Swapping** - for each project, both manifests are rewritten in
//!    memory first. Only when both succeed are they backed up and written, so
//!    a malformed `package.json` leaves the project's `Gemfile` untouched as
//!    well. A failing project is recorded and the next one is processed.
//! 3. **Building** - `bundle install` / `npm install` for changed manifests,
//!    then `npm run build` or a watch process for every swapped package with
//!    an npm side. Install and build failures are warnings; a watch process
//!    that fails to start stops the ones started earlier in the same run and
//!    aborts.
//!
//! ## Restore
//!
//! Warns about live watch processes, puts every backed-up manifest back and
//! re-runs the installers for the projects that changed so lock files are
//! re-resolved against the published versions.
//!
//! ## Status
//!
//! Read-only: reports swapped dependencies and backups per project.
//!
//! In dry-run mode every decision is made the same way but nothing is
//! written and no external command is run.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, warn};

use crate::backup::{BackupOutcome, BackupStore};
use crate::cache::CacheManager;
use crate::dependency::{DependencyTarget, NpmPackage, Source};
use crate::discovery;
use crate::error::{Error, Result};
use crate::manifest::gemfile;
use crate::manifest::package_json::PackageManifest;
use crate::manifest::{ManifestKind, SwappedDependency};
use crate::suggestions;
use crate::toolchain::Toolchain;
use crate::watch::{WatchManager, WatchProcessRecord};

/// Where the orchestrator is in the current invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Validating,
    Swapping,
    Building,
    Restoring,
    Querying,
    Done,
}

/// What happens to swapped packages after the manifests are rewritten.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BuildMode {
    /// Leave packages as they are.
    #[default]
    Skip,
    /// Run each package's build script once.
    Build,
    /// Start a watch process per package.
    Watch,
}

/// One manifest written (or that would be) for a project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestChange {
    pub kind: ManifestKind,
    pub path: PathBuf,
    /// Dependencies whose declaration changed; empty for restores.
    pub dependencies: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProjectOutcome {
    Changed(Vec<ManifestChange>),
    Unchanged,
    Skipped(String),
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectReport {
    pub project: PathBuf,
    pub outcome: ProjectOutcome,
}

impl ProjectReport {
    fn changed_kinds(&self) -> Vec<ManifestKind> {
        match &self.outcome {
            ProjectOutcome::Changed(changes) => changes.iter().map(|c| c.kind).collect(),
            _ => Vec::new(),
        }
    }
}

/// Per-outcome counts for the final summary line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Summary {
    pub changed: usize,
    pub unchanged: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl Summary {
    fn of(projects: &[ProjectReport]) -> Self {
        let mut summary = Summary::default();
        for report in projects {
            match report.outcome {
                ProjectOutcome::Changed(_) => summary.changed += 1,
                ProjectOutcome::Unchanged => summary.unchanged += 1,
                ProjectOutcome::Skipped(_) => summary.skipped += 1,
                ProjectOutcome::Failed(_) => summary.failed += 1,
            }
        }
        summary
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} changed, {} unchanged, {} skipped, {} failed",
            self.changed, self.unchanged, self.skipped, self.failed
        )
    }
}

/// Result of `swap`.
#[derive(Debug, Clone, Default)]
pub struct SwapReport {
    pub dry_run: bool,
    /// Targets with remote checkouts resolved to cache paths.
    pub targets: Vec<DependencyTarget>,
    pub projects: Vec<ProjectReport>,
    /// Commands run (or that would run) after rewriting, in order.
    pub actions: Vec<String>,
    pub watched: Vec<WatchProcessRecord>,
    pub warnings: Vec<String>,
}

impl SwapReport {
    pub fn summary(&self) -> Summary {
        Summary::of(&self.projects)
    }
}

/// Result of `restore`.
#[derive(Debug, Clone, Default)]
pub struct RestoreReport {
    pub dry_run: bool,
    pub projects: Vec<ProjectReport>,
    pub actions: Vec<String>,
    pub warnings: Vec<String>,
}

impl RestoreReport {
    pub fn summary(&self) -> Summary {
        Summary::of(&self.projects)
    }
}

/// One manifest in a status report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestStatus {
    pub kind: ManifestKind,
    pub swapped: Vec<SwappedDependency>,
    pub has_backup: bool,
    /// Set when the manifest could not be inspected.
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectStatus {
    pub project: PathBuf,
    pub manifests: Vec<ManifestStatus>,
}

impl ProjectStatus {
    pub fn is_swapped(&self) -> bool {
        self.manifests
            .iter()
            .any(|m| !m.swapped.is_empty() || m.has_backup)
    }
}

/// Result of `status`.
#[derive(Debug, Clone, Default)]
pub struct StatusReport {
    pub projects: Vec<ProjectStatus>,
}

/// Manifests computed in memory for one project, not yet written.
struct PlannedWrite {
    change: ManifestChange,
    content: String,
}

pub struct Orchestrator {
    cache: CacheManager,
    watch: WatchManager,
    toolchain: Box<dyn Toolchain>,
    backups: BackupStore,
    dry_run: bool,
    phase: Phase,
}

impl Orchestrator {
    pub fn new(cache: CacheManager, watch: WatchManager, toolchain: Box<dyn Toolchain>) -> Self {
        Self {
            cache,
            watch,
            toolchain,
            backups: BackupStore::new(false),
            dry_run: false,
            phase: Phase::Idle,
        }
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self.backups = BackupStore::new(dry_run);
        self.cache = self.cache.dry_run(dry_run);
        self
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn cache(&self) -> &CacheManager {
        &self.cache
    }

    pub fn watch(&self) -> &WatchManager {
        &self.watch
    }

    fn enter(&mut self, phase: Phase) {
        debug!("Phase {:?} -> {:?}", self.phase, phase);
        self.phase = phase;
    }

    fn verb<'a>(&self, done: &'a str, planned: &'a str) -> &'a str {
        if self.dry_run {
            planned
        } else {
            done
        }
    }

    /// Point `targets` at their new sources in every project.
    pub fn swap(
        &mut self,
        projects: &[PathBuf],
        targets: Vec<DependencyTarget>,
        mode: BuildMode,
    ) -> Result<SwapReport> {
        self.enter(Phase::Validating);
        validate_targets(&targets)?;
        let targets = self.materialize(targets)?;

        let mut report = SwapReport {
            dry_run: self.dry_run,
            ..SwapReport::default()
        };
        if projects.is_empty() {
            report
                .warnings
                .push("no projects found; nothing was changed".to_string());
        }

        self.enter(Phase::Swapping);
        for project in projects {
            let outcome = self.swap_project(project, &targets);
            if let ProjectOutcome::Failed(message) = &outcome {
                warn!("{}: {}", project.display(), message);
            }
            report.projects.push(ProjectReport {
                project: project.clone(),
                outcome,
            });
        }

        self.enter(Phase::Building);
        for project in &report.projects {
            let kinds = project.changed_kinds();
            let (actions, warnings) = self.install(&project.project, &kinds);
            report.actions.extend(actions);
            report.warnings.extend(warnings);
        }
        self.build(&targets, mode, &mut report)?;

        report.targets = targets;
        self.enter(Phase::Done);
        Ok(report)
    }

    fn materialize(&self, mut targets: Vec<DependencyTarget>) -> Result<Vec<DependencyTarget>> {
        let mut errors = Vec::new();
        for target in &mut targets {
            let gem_name = target.dependency.gem_name();
            if let Source::Remote {
                refspec,
                cache_path,
            } = &mut target.source
            {
                match self.cache.materialize(gem_name, refspec) {
                    Ok(path) => *cache_path = Some(path),
                    Err(e) => errors.push(e),
                }
            }
        }
        match Error::from_batch(errors) {
            Some(error) => Err(error),
            None => Ok(targets),
        }
    }

    fn swap_project(&self, project: &Path, targets: &[DependencyTarget]) -> ProjectOutcome {
        let planned = match plan_project(project, targets) {
            Ok(planned) => planned,
            Err(e) => return ProjectOutcome::Failed(e.to_string()),
        };
        let Some(planned) = planned else {
            return ProjectOutcome::Skipped("no Gemfile or package.json".to_string());
        };
        if planned.is_empty() {
            return ProjectOutcome::Unchanged;
        }

        // Back up everything first so a refused backup leaves no file written
        let mut created = Vec::new();
        for write in &planned {
            match self.backups.backup(&write.change.path) {
                Ok(BackupOutcome::Created) => created.push(write.change.path.clone()),
                Ok(BackupOutcome::Reused) => {}
                Err(e) => {
                    self.discard_backups(&created);
                    return ProjectOutcome::Failed(e.to_string());
                }
            }
        }

        let mut changes = Vec::new();
        for write in planned {
            if !self.dry_run {
                if let Err(e) = fs::write(&write.change.path, &write.content) {
                    return ProjectOutcome::Failed(format!(
                        "failed to write {}: {e}",
                        write.change.path.display()
                    ));
                }
            }
            debug!(
                "{} {}",
                self.verb("Rewrote", "Would rewrite"),
                write.change.path.display()
            );
            changes.push(write.change);
        }
        ProjectOutcome::Changed(changes)
    }

    fn discard_backups(&self, created: &[PathBuf]) {
        if self.dry_run {
            return;
        }
        for manifest in created {
            let backup = crate::backup::backup_path(manifest);
            if let Err(e) = fs::remove_file(&backup) {
                warn!("Could not remove {}: {}", backup.display(), e);
            }
        }
    }

    /// Run the installers for the manifests in `kinds`. Returns the actions
    /// taken and any warnings.
    fn install(&self, project: &Path, kinds: &[ManifestKind]) -> (Vec<String>, Vec<String>) {
        let mut actions = Vec::new();
        let mut warnings = Vec::new();
        for kind in kinds {
            let (command, result) = match kind {
                ManifestKind::Gemfile => (
                    "bundle install",
                    (!self.dry_run).then(|| self.toolchain.bundle_install(project)),
                ),
                ManifestKind::PackageJson => (
                    "npm install",
                    (!self.dry_run).then(|| self.toolchain.npm_install(project)),
                ),
            };
            actions.push(format!(
                "{} {command} in {}",
                self.verb("Ran", "Would run"),
                project.display()
            ));
            if let Some(Err(e)) = result {
                warnings.push(format!("{command} failed in {}: {e}", project.display()));
            }
        }
        (actions, warnings)
    }

    fn build(
        &self,
        targets: &[DependencyTarget],
        mode: BuildMode,
        report: &mut SwapReport,
    ) -> Result<()> {
        if mode == BuildMode::Skip {
            return Ok(());
        }

        let mut spawned: Vec<String> = Vec::new();
        for target in targets {
            if target.dependency.npm_package() == NpmPackage::GemOnly {
                continue;
            }
            let gem_name = target.dependency.gem_name();
            let Some(package_dir) = target.package_dir() else {
                continue;
            };
            // A dry run never clones, so a remote checkout cannot be inspected
            let unfetched = self.dry_run && matches!(target.source, Source::Remote { .. });
            if !unfetched && !package_dir.join("package.json").is_file() {
                report.warnings.push(format!(
                    "no package.json in {}; not building {gem_name}",
                    package_dir.display()
                ));
                continue;
            }

            match mode {
                BuildMode::Skip => {}
                BuildMode::Build => {
                    report.actions.push(format!(
                        "{} npm run build in {}",
                        self.verb("Ran", "Would run"),
                        package_dir.display()
                    ));
                    if !self.dry_run {
                        if let Err(e) = self.toolchain.build_package(package_dir) {
                            report.warnings.push(e.to_string());
                        }
                    }
                }
                BuildMode::Watch => {
                    let running = match self.watch.running(gem_name) {
                        Ok(running) => running,
                        Err(e) => {
                            report.warnings.push(e.to_string());
                            None
                        }
                    };
                    if let Some(existing) = running {
                        report.warnings.push(format!(
                            "watch for {gem_name} already running (pid {}); not starting another",
                            existing.pid
                        ));
                        continue;
                    }
                    report.actions.push(format!(
                        "{} watch for {gem_name} in {}",
                        self.verb("Started", "Would start"),
                        package_dir.display()
                    ));
                    if self.dry_run {
                        continue;
                    }
                    match self.watch.spawn(gem_name, package_dir) {
                        Ok(record) => {
                            spawned.push(gem_name.to_string());
                            report.watched.push(record);
                        }
                        Err(e) => {
                            if !spawned.is_empty() {
                                match self.watch.stop(&spawned) {
                                    Ok(stopped) => debug!(
                                        "Stopped {} watch process(es) after failure",
                                        stopped.killed.len()
                                    ),
                                    Err(stop_error) => warn!(
                                        "Could not stop watch processes started by this run: {}",
                                        stop_error
                                    ),
                                }
                            }
                            return Err(e);
                        }
                    }
                }
            }
        }
        Ok(())
    }

    /// Put every backed-up manifest back in place.
    pub fn restore(&mut self, projects: &[PathBuf]) -> Result<RestoreReport> {
        self.enter(Phase::Restoring);
        let mut report = RestoreReport {
            dry_run: self.dry_run,
            ..RestoreReport::default()
        };

        match self.watch.list() {
            Ok(live) if !live.is_empty() => {
                let listed = live
                    .iter()
                    .map(|r| format!("{} (pid {})", r.gem_name, r.pid))
                    .collect::<Vec<_>>()
                    .join(", ");
                report.warnings.push(format!(
                    "watch processes still running: {listed}; they keep rebuilding local packages, stop them with 'swap-deps --kill-watch'"
                ));
            }
            Ok(_) => {}
            Err(e) => report.warnings.push(e.to_string()),
        }

        for project in projects {
            let outcome = self.restore_project(project);
            report.projects.push(ProjectReport {
                project: project.clone(),
                outcome,
            });
        }

        for project in &report.projects {
            let kinds = project.changed_kinds();
            let (actions, warnings) = self.install(&project.project, &kinds);
            report.actions.extend(actions);
            report.warnings.extend(warnings);
        }

        self.enter(Phase::Done);
        Ok(report)
    }

    fn restore_project(&self, project: &Path) -> ProjectOutcome {
        let mut changes = Vec::new();
        let mut failures = Vec::new();
        for kind in ManifestKind::ALL {
            let path = project.join(kind.file_name());
            match self.backups.restore(&path) {
                Ok(true) => changes.push(ManifestChange {
                    kind,
                    path,
                    dependencies: Vec::new(),
                }),
                Ok(false) => {}
                Err(e) => failures.push(format!("{}: {e}", path.display())),
            }
        }
        if !failures.is_empty() {
            ProjectOutcome::Failed(failures.join("; "))
        } else if changes.is_empty() {
            ProjectOutcome::Unchanged
        } else {
            ProjectOutcome::Changed(changes)
        }
    }

    /// Swapped dependencies and backups per project. Writes nothing.
    pub fn status(&mut self, projects: &[PathBuf]) -> StatusReport {
        self.enter(Phase::Querying);
        let projects = projects
            .iter()
            .map(|project| ProjectStatus {
                project: project.clone(),
                manifests: ManifestKind::ALL
                    .into_iter()
                    .filter_map(|kind| {
                        let path = project.join(kind.file_name());
                        let has_backup = self.backups.exists(&path);
                        if !path.is_file() && !has_backup {
                            return None;
                        }
                        let (swapped, error) = match kind.detect_swapped(&path) {
                            Ok(swapped) => (swapped, None),
                            Err(e) => (Vec::new(), Some(e.to_string())),
                        };
                        Some(ManifestStatus {
                            kind,
                            swapped,
                            has_backup,
                            error,
                        })
                    })
                    .collect(),
            })
            .collect();
        self.enter(Phase::Done);
        StatusReport { projects }
    }
}

/// Reject duplicate dependencies, missing local paths and system
/// directories, all at once.
fn validate_targets(targets: &[DependencyTarget]) -> Result<()> {
    if targets.is_empty() {
        return Err(Error::Validation {
            message: format!("nothing to swap; {}", suggestions::swap_usage()),
        });
    }

    let mut errors = Vec::new();
    let mut missing = Vec::new();
    for (index, target) in targets.iter().enumerate() {
        if targets[..index]
            .iter()
            .any(|earlier| earlier.dependency == target.dependency)
        {
            errors.push(Error::Validation {
                message: format!("{} is given more than one source", target.dependency),
            });
        }
        if let Source::Local { path } = &target.source {
            if !path.is_dir() {
                missing.push((target.dependency, path.clone()));
            } else if let Err(e) = discovery::guard_system_directory(path) {
                errors.push(e);
            }
        }
    }
    if !missing.is_empty() {
        errors.insert(0, suggestions::missing_local_paths(&missing));
    }
    match Error::from_batch(errors) {
        Some(error) => Err(error),
        None => Ok(()),
    }
}

/// Compute the new manifests of `project`. `None` when the project has
/// neither manifest; an empty list when nothing would change.
fn plan_project(project: &Path, targets: &[DependencyTarget]) -> Result<Option<Vec<PlannedWrite>>> {
    let gemfile_path = project.join(ManifestKind::Gemfile.file_name());
    let package_path = project.join(ManifestKind::PackageJson.file_name());
    if !gemfile_path.is_file() && !package_path.is_file() {
        return Ok(None);
    }

    let mut planned = Vec::new();

    if gemfile_path.is_file() {
        let original = fs::read_to_string(&gemfile_path)?;
        let mut content = original.clone();
        let mut dependencies = Vec::new();
        for target in targets {
            let gem = target.dependency.gem_name();
            let rewritten = match &target.source {
                Source::Local { path } => gemfile::rewrite_to_local(&content, gem, path)?,
                Source::Remote { refspec, .. } => {
                    gemfile::rewrite_to_remote(&content, gem, refspec)?
                }
            };
            if rewritten != content {
                dependencies.push(gem.to_string());
                content = rewritten;
            }
        }
        if content != original {
            planned.push(PlannedWrite {
                change: ManifestChange {
                    kind: ManifestKind::Gemfile,
                    path: gemfile_path,
                    dependencies,
                },
                content,
            });
        }
    }

    if package_path.is_file() {
        let mut manifest = PackageManifest::load(&package_path)?;
        let mut dependencies = Vec::new();
        for target in targets {
            let NpmPackage::Published(npm_name) = target.dependency.npm_package() else {
                continue;
            };
            let Some(package_dir) = target.package_dir() else {
                continue;
            };
            if !manifest.set_local(npm_name, package_dir).is_empty() {
                dependencies.push(npm_name.to_string());
            }
        }
        if !dependencies.is_empty() {
            planned.push(PlannedWrite {
                change: ManifestChange {
                    kind: ManifestKind::PackageJson,
                    path: package_path,
                    dependencies,
                },
                content: manifest.render()?,
            });
        }
    }

    Ok(Some(planned))
}
