//! DataCode native module tool
//!
//! Loads native modules the way the VM does and lets you inspect them or
//! call their functions from the command line.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "datacode")]
#[command(about = "Inspect and call DataCode native modules", long_about = None)]
#[command(version)]
struct Cli {
    /// VM configuration file (TOML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load a module and show its name, ABI version and functions
    Inspect {
        /// Module name (searched on the module path) or library path
        module: String,
    },

    /// Load a module and call one of its functions
    Call {
        /// Module name (searched on the module path) or library path
        module: String,
        /// Function to call
        function: String,
        /// Arguments: null, true/false, integers, floats, otherwise strings
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
}

/// Initialize logging. `RUST_LOG` overrides the default filter.
fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let mut vm = commands::create_vm(cli.config.as_deref())?;

    match cli.command {
        Commands::Inspect { module } => commands::inspect::execute(&mut vm, &module),

        Commands::Call {
            module,
            function,
            args,
        } => match commands::call::execute(&mut vm, &module, &function, &args) {
            Ok(()) => Ok(()),
            Err(e) => {
                eprintln!("Error: {}", e);
                std::process::exit(1);
            }
        },
    }
}
