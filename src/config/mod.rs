//! Runtime options
//!
//! Options come from built-in defaults, then an optional `vinput.cfg`
//! property file, then the command line (see `cli.rs`).

pub mod propfile;

use std::path::Path;

use anyhow::{Context, Result};

use crate::logging::LogLevel;

/// Which instances are torn down when a device type unregisters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TeardownScope {
    /// Every live instance of every type
    All,
    /// Only instances of the unregistering type
    Owned,
}

/// What to do when a type name overlaps an already registered one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuplicatePolicy {
    /// Accept it; resolution favours the earlier registration
    Allow,
    /// Refuse names that equal, shadow, or are shadowed by a registered name
    Reject,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Options {
    pub log_level: LogLevel,
    pub teardown: TeardownScope,
    pub duplicates: DuplicatePolicy,
    /// Prefix of per-instance node names (`vinput` gives `vinput0`, ...)
    pub node_prefix: String,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Info,
            teardown: TeardownScope::All,
            duplicates: DuplicatePolicy::Allow,
            node_prefix: "vinput".to_string(),
        }
    }
}

/// Load options from a `vinput.cfg` file, or defaults when `path` is `None`.
pub fn load_config(path: Option<&Path>) -> Result<Options> {
    let mut options = Options::default();
    if let Some(path) = path {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        apply_properties(&mut options, &text)
            .with_context(|| format!("Invalid config file {}", path.display()))?;
    }
    Ok(options)
}

/// Apply `key = value` settings on top of `options`.
pub fn apply_properties(options: &mut Options, text: &str) -> Result<()> {
    for (key, value) in propfile::collect_properties(text) {
        match key.to_ascii_lowercase().as_str() {
            "teardown" => options.teardown = parse_teardown(&value)?,
            "duplicates" => options.duplicates = parse_duplicates(&value)?,
            "loglevel" => options.log_level = parse_log_level(&value)?,
            "node_prefix" => options.node_prefix = parse_node_prefix(&value)?,
            other => log::warn!("Ignoring unknown config key '{}'", other),
        }
    }
    Ok(())
}

pub fn parse_teardown(s: &str) -> Result<TeardownScope> {
    match s.trim().to_ascii_lowercase().as_str() {
        "all" => Ok(TeardownScope::All),
        "owned" | "type" => Ok(TeardownScope::Owned),
        other => anyhow::bail!("Unknown teardown scope '{}' (expected all or owned)", other),
    }
}

pub fn parse_duplicates(s: &str) -> Result<DuplicatePolicy> {
    match s.trim().to_ascii_lowercase().as_str() {
        "allow" => Ok(DuplicatePolicy::Allow),
        "reject" => Ok(DuplicatePolicy::Reject),
        other => anyhow::bail!("Unknown duplicate policy '{}' (expected allow or reject)", other),
    }
}

/// Parse a log level given as a number (0-6) or a name.
pub fn parse_log_level(s: &str) -> Result<LogLevel> {
    let s = s.trim();
    if let Ok(n) = s.parse::<i32>() {
        if !(0..=6).contains(&n) {
            anyhow::bail!("Log level {} out of range (0 to 6)", n);
        }
        return Ok(LogLevel::from_i32(n));
    }
    LogLevel::from_name(s).with_context(|| format!("Unknown log level '{}'", s))
}

pub fn parse_node_prefix(s: &str) -> Result<String> {
    let s = s.trim();
    if s.is_empty() {
        anyhow::bail!("Node prefix must not be empty");
    }
    if !s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-') {
        anyhow::bail!("Node prefix '{}' contains invalid characters", s);
    }
    Ok(s.to_string())
}
