//! # Cache Command Implementation
//!
//! `--show-cache` lists cloned GitHub checkouts with their sizes;
//! `--clean-cache [DEPENDENCY]` removes all of them or those of one
//! dependency.

use anyhow::Result;

use super::Context;
use swap_deps::config;
use swap_deps::output::{emoji, format_size};

/// Execute `--show-cache`.
pub fn show(context: &Context) -> Result<()> {
    let cache = context.cache_manager();
    let info = cache.info()?;

    println!("Cache location: {}", info.location.display());
    if info.entry_count == 0 {
        println!("No cached repositories found.");
        return Ok(());
    }

    for entry in cache.entries()? {
        println!("  {:<50} {:>10}", entry.name, format_size(entry.size_bytes));
    }
    println!(
        "\n{} repositor{}, {} total",
        info.entry_count,
        if info.entry_count == 1 { "y" } else { "ies" },
        format_size(info.total_size)
    );
    Ok(())
}

/// Execute `--clean-cache`.
pub fn clean(context: &Context, dependency: Option<&str>) -> Result<()> {
    let out = &context.output;
    let cache = context.cache_manager();
    let name = dependency.map(config::cache_name);
    let removed = cache.clean(name.as_deref())?;

    if removed.is_empty() {
        match &name {
            Some(name) => println!("No cached repositories for {}.", name),
            None => println!("No cached repositories to clean."),
        }
        return Ok(());
    }

    let verb = if context.dry_run { "Would remove" } else { "Removed" };
    for entry in &removed {
        println!("  {} ({})", entry.name, format_size(entry.size_bytes));
    }
    let total: u64 = removed.iter().map(|e| e.size_bytes).sum();
    println!(
        "{} {} {} cache entr{}, {} freed",
        emoji(out, "🧹", "[CLEAN]"),
        verb,
        removed.len(),
        if removed.len() == 1 { "y" } else { "ies" },
        format_size(total)
    );
    Ok(())
}
