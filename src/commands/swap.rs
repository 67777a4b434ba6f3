//! # Swap, Restore and Status
//!
//! The default mode rewrites manifests to point at local or GitHub
//! checkouts; `--restore` puts the backups back; `--status` reports what is
//! currently swapped.

use std::path::Path;

use anyhow::Result;

use super::Context;
use crate::cli::Cli;
use swap_deps::orchestrator::{BuildMode, ProjectOutcome, ProjectReport, Summary};
use swap_deps::output::{emoji, OutputConfig};

/// Swap the requested dependencies in every project in scope.
pub fn swap(context: &Context, cli: &Cli, mode: BuildMode) -> Result<()> {
    let config = context.load_config(cli)?;
    let targets = context.targets(cli, config.as_ref())?;
    let projects = context.projects(cli, config.as_ref().map(|(_, c)| c))?;

    let out = &context.output;
    if context.dry_run {
        println!("{} Dry run, no files will be changed", emoji(out, "🔍", "[DRY RUN]"));
    }

    let mut orchestrator = context.orchestrator();
    let report = orchestrator.swap(&projects, targets, mode)?;

    println!(
        "{} Swapping {} dependenc{}",
        emoji(out, "🔄", "[SWAP]"),
        report.targets.len(),
        if report.targets.len() == 1 { "y" } else { "ies" }
    );
    for target in &report.targets {
        println!("  {} -> {}", target.dependency, target.describe_source());
        if let Some(dir) = target.package_dir() {
            if context.verbose && dir.display().to_string() != target.describe_source() {
                println!("    checkout: {}", dir.display());
            }
        }
    }
    println!();

    print_projects(out, &report.projects);
    print_lines(out, &report.actions, &report.warnings);
    for record in &report.watched {
        println!(
            "{} Watching {} (pid {}), log: {}",
            emoji(out, "👀", "[WATCH]"),
            record.gem_name,
            record.pid,
            orchestrator.watch().log_path(&record.gem_name).display()
        );
    }

    finish(out, report.summary(), report.dry_run)
}

/// Restore every backed-up manifest in scope.
pub fn restore(context: &Context, cli: &Cli) -> Result<()> {
    let config = context.load_config(cli)?;
    let projects = context.projects(cli, config.as_ref().map(|(_, c)| c))?;
    let out = &context.output;

    if context.dry_run {
        println!("{} Dry run, no files will be changed", emoji(out, "🔍", "[DRY RUN]"));
    }
    println!("{} Restoring original manifests", emoji(out, "↩️", "[RESTORE]"));

    let mut orchestrator = context.orchestrator();
    let report = orchestrator.restore(&projects)?;

    print_projects(out, &report.projects);
    print_lines(out, &report.actions, &report.warnings);
    finish(out, report.summary(), report.dry_run)
}

/// Show what is swapped in every project in scope.
pub fn status(context: &Context, cli: &Cli) -> Result<()> {
    let config = context.load_config(cli)?;
    let projects = context.projects(cli, config.as_ref().map(|(_, c)| c))?;
    let out = &context.output;

    let mut orchestrator = context.orchestrator();
    let report = orchestrator.status(&projects);

    if report.projects.is_empty() {
        println!("No projects found.");
        return Ok(());
    }

    for project in &report.projects {
        let marker = if project.is_swapped() {
            emoji(out, "🔄", "[SWAPPED]")
        } else {
            emoji(out, "✅", "[CLEAN]")
        };
        println!("{} {}", marker, project.project.display());
        for manifest in &project.manifests {
            if let Some(error) = &manifest.error {
                println!("  {}: {} {}", manifest.kind, emoji(out, "❌", "[ERROR]"), error);
                continue;
            }
            let backup = if manifest.has_backup { " (backup present)" } else { "" };
            if manifest.swapped.is_empty() {
                println!("  {}: not swapped{}", manifest.kind, backup);
            }
            for swapped in &manifest.swapped {
                println!(
                    "  {}: {} -> {} ({}){}",
                    manifest.kind, swapped.name, swapped.path, swapped.kind, backup
                );
            }
        }
    }

    match orchestrator.watch().list() {
        Ok(records) if !records.is_empty() => {
            println!();
            for record in records {
                println!(
                    "{} {} watch running (pid {})",
                    emoji(out, "👀", "[WATCH]"),
                    record.gem_name,
                    record.pid
                );
            }
        }
        Ok(_) => {}
        Err(e) => log::warn!("Could not read watch registry: {}", e),
    }
    Ok(())
}

fn print_projects(out: &OutputConfig, projects: &[ProjectReport]) {
    for report in projects {
        let name = display_project(&report.project);
        match &report.outcome {
            ProjectOutcome::Changed(changes) => {
                println!("{} {}", emoji(out, "✅", "[OK]"), name);
                for change in changes {
                    if change.dependencies.is_empty() {
                        println!("  {}", change.kind);
                    } else {
                        println!("  {}: {}", change.kind, change.dependencies.join(", "));
                    }
                }
            }
            ProjectOutcome::Unchanged => {
                println!("{} {} (nothing to change)", emoji(out, "➖", "[SKIP]"), name)
            }
            ProjectOutcome::Skipped(reason) => {
                println!("{} {} ({})", emoji(out, "➖", "[SKIP]"), name, reason)
            }
            ProjectOutcome::Failed(message) => {
                println!("{} {}: {}", emoji(out, "❌", "[FAIL]"), name, message)
            }
        }
    }
}

fn print_lines(out: &OutputConfig, actions: &[String], warnings: &[String]) {
    for action in actions {
        println!("{} {}", emoji(out, "📦", "[RUN]"), action);
    }
    for warning in warnings {
        eprintln!("{} {}", emoji(out, "⚠️", "[WARN]"), warning);
    }
}

fn display_project(project: &Path) -> String {
    std::env::current_dir()
        .ok()
        .and_then(|cwd| project.strip_prefix(cwd).ok().map(Path::to_path_buf))
        .unwrap_or_else(|| project.to_path_buf())
        .display()
        .to_string()
}

fn finish(out: &OutputConfig, summary: Summary, dry_run: bool) -> Result<()> {
    println!();
    let prefix = if dry_run { "Would have: " } else { "" };
    println!("{} {}{}", emoji(out, "📋", "[SUMMARY]"), prefix, summary);
    if summary.failed > 0 {
        anyhow::bail!("{} project(s) failed", summary.failed);
    }
    Ok(())
}
