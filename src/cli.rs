use std::path::PathBuf;

use crate::config::{parse_duplicates, parse_log_level, parse_teardown, Options};
use anyhow::{Context, Result};
use clap::Parser;

/// vinputctl - drive the virtual input subsystem from a shell
#[derive(Parser, Debug, Default)]
#[command(name = "vinputctl")]
#[command(version)]
#[command(about = "Create, feed and inspect virtual input devices", long_about = None)]
pub struct Cli {
    /// Configuration file (key = value lines)
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Log level, 0-6 or a name (nothing, user, error, warning, info, debug, all)
    #[arg(short, long, value_name = "LEVEL")]
    pub loglevel: Option<String>,

    /// Instances torn down when a type unregisters (all, owned)
    #[arg(short, long, value_name = "SCOPE")]
    pub teardown: Option<String>,

    /// Handling of overlapping type names (allow, reject)
    #[arg(short, long, value_name = "POLICY")]
    pub duplicates: Option<String>,

    /// Run commands from a file instead of standard input
    #[arg(short, long, value_name = "FILE")]
    pub script: Option<PathBuf>,
}

impl Cli {
    /// Merge CLI arguments into the options struct
    pub fn merge_into_options(&self, mut opts: Options) -> Result<Options> {
        if let Some(ref level) = self.loglevel {
            opts.log_level = parse_log_level(level).context("Invalid --loglevel")?;
        }

        if let Some(ref scope) = self.teardown {
            opts.teardown = parse_teardown(scope).context("Invalid --teardown")?;
        }

        if let Some(ref policy) = self.duplicates {
            opts.duplicates = parse_duplicates(policy).context("Invalid --duplicates")?;
        }

        Ok(opts)
    }
}
