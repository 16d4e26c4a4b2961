use std::fs::File;
use std::io::{self, BufReader};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;

use vinput::host::memory::{MemoryInput, NodeTable};
use vinput::{config, logging, providers, Cli, Host, Shell, VInput};

fn main() -> Result<()> {
    let cli = Cli::parse();

    let options = config::load_config(cli.config.as_deref())?;
    let options = cli.merge_into_options(options)?;

    logging::init(options.log_level);
    log::debug!("vinputctl starting with {:?}", options);

    let input = Arc::new(MemoryInput::new());
    let nodes = Arc::new(NodeTable::new());
    let vinput = VInput::with_options(Host::new(input.clone(), nodes), options);

    for kind in providers::builtin() {
        let name = kind.name().to_string();
        vinput
            .register_type(kind)
            .with_context(|| format!("Failed to register device type '{}'", name))?;
    }

    let shell = Shell::new(&vinput, &input);
    let stdout = io::stdout();
    match &cli.script {
        Some(path) => {
            let file = File::open(path)
                .with_context(|| format!("Failed to open script {}", path.display()))?;
            shell.run(BufReader::new(file), stdout.lock())?;
        }
        None => shell.run(io::stdin().lock(), stdout.lock())?,
    }

    vinput.shutdown();
    Ok(())
}
