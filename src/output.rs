//! Terminal styling for swap-deps reports.
//!
//! `--color=always|never` wins outright. Under `auto`, `NO_COLOR` (even
//! empty) and `CLICOLOR=0` turn styling off, `CLICOLOR_FORCE` turns it on
//! for pipes, and `TERM=dumb` turns it off. Otherwise the console crate
//! decides from the stdout terminal.
//!
//! Without styling, status markers fall back to bracketed words such as
//! `[OK]` so logs and tests stay greppable.

use std::env;

/// Whether reports may use colors and emoji.
#[derive(Debug, Clone)]
pub struct OutputConfig {
    pub use_color: bool,
}

impl OutputConfig {
    /// Resolve the `--color` flag value against the environment.
    pub fn from_env_and_flag(color_flag: &str) -> Self {
        let use_color = match color_flag.to_ascii_lowercase().as_str() {
            "always" => true,
            "never" => false,
            _ => styling_wanted(|name| env::var_os(name).map(|v| v.to_string_lossy().into_owned())),
        };
        Self { use_color }
    }

    #[cfg(test)]
    pub fn with_color() -> Self {
        Self { use_color: true }
    }

    #[cfg(test)]
    pub fn without_color() -> Self {
        Self { use_color: false }
    }
}

fn styling_wanted(var: impl Fn(&str) -> Option<String>) -> bool {
    if var("NO_COLOR").is_some() || var("CLICOLOR").as_deref() == Some("0") {
        return false;
    }
    if var("CLICOLOR_FORCE").is_some_and(|v| !v.is_empty() && v != "0") {
        return true;
    }
    if var("TERM").as_deref() == Some("dumb") {
        return false;
    }
    console::Term::stdout().features().colors_supported()
}

/// `styled` when colors are on, otherwise the `plain` marker.
pub fn emoji<'a>(config: &OutputConfig, styled: &'a str, plain: &'a str) -> &'a str {
    if config.use_color {
        styled
    } else {
        plain
    }
}

/// Byte count for cache listings: `512 B`, `1.50 KB`, `3.20 MB`.
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    if bytes < 1024 {
        return format!("{bytes} B");
    }
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    format!("{size:.2} {}", UNITS[unit])
}
