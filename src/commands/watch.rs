//! # Watch Process Commands
//!
//! `--list-watch` shows the tracked `npm run watch` processes that are still
//! alive; `--kill-watch` stops all of them and clears the registry.

use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::Result;

use super::Context;
use swap_deps::output::emoji;
use swap_deps::watch::WatchProcessRecord;

/// Execute `--list-watch`.
pub fn list(context: &Context) -> Result<()> {
    let manager = context.watch_manager();
    let records = manager.list()?;
    if records.is_empty() {
        println!("No watch processes running.");
        return Ok(());
    }

    let out = &context.output;
    for record in &records {
        println!(
            "{} {:<20} pid {:<8} {} (running {})",
            emoji(out, "👀", "[WATCH]"),
            record.gem_name,
            record.pid,
            record.command,
            format_uptime(record)
        );
        if context.verbose {
            println!("    log: {}", manager.log_path(&record.gem_name).display());
        }
    }
    Ok(())
}

/// Execute `--kill-watch`.
pub fn kill(context: &Context) -> Result<()> {
    let out = &context.output;
    let manager = context.watch_manager();

    if context.dry_run {
        let records = manager.list()?;
        if records.is_empty() {
            println!("No watch processes running.");
        }
        for record in records {
            println!("Would stop {} (pid {})", record.gem_name, record.pid);
        }
        return Ok(());
    }

    let report = manager.kill_all()?;
    if report.is_empty() {
        println!("No watch processes running.");
        return Ok(());
    }

    for record in &report.killed {
        println!(
            "{} Stopped {} (pid {})",
            emoji(out, "🛑", "[STOP]"),
            record.gem_name,
            record.pid
        );
    }
    for record in &report.already_gone {
        println!(
            "{} {} (pid {}) was no longer running",
            emoji(out, "➖", "[GONE]"),
            record.gem_name,
            record.pid
        );
    }
    for record in &report.denied {
        eprintln!(
            "{} Permission denied stopping {} (pid {})",
            emoji(out, "⚠️", "[WARN]"),
            record.gem_name,
            record.pid
        );
    }
    if !report.denied.is_empty() {
        anyhow::bail!(
            "could not stop {} watch process(es); they belong to another user",
            report.denied.len()
        );
    }
    Ok(())
}

fn format_uptime(record: &WatchProcessRecord) -> String {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(record.started_at);
    let secs = now.saturating_sub(record.started_at);
    if secs < 60 {
        format!("{}s", secs)
    } else if secs < 3600 {
        format!("{}m", secs / 60)
    } else {
        format!("{}h{}m", secs / 3600, (secs % 3600) / 60)
    }
}
