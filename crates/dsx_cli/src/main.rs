//! DSX CLI
//!
//! Command-line tools for DSX.
//!
//! # Commands
//!
//! - `self-check` - Check that the extension client can attach to a native client
//! - `demo parent-child` - Lock a group while updating one of its tasks
//! - `demo external-version` - Carry entity versions through an external caller
//! - `version` - Show version information

mod commands;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

/// DSX command-line tools.
#[derive(Parser)]
#[command(name = "dsx")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check adapter compatibility
    SelfCheck {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Run a demo against an in-process emulator
    Demo {
        #[command(subcommand)]
        demo: DemoCommand,
    },

    /// Show version information
    Version,
}

impl Commands {
    /// `self-check` reports the adapter state itself, compatible or not.
    fn needs_startup_check(&self) -> bool {
        !matches!(self, Commands::SelfCheck { .. })
    }
}

#[derive(Subcommand)]
enum DemoCommand {
    /// Update a task while locking its group
    ParentChild {
        /// Modify the group after it is read
        #[arg(short, long)]
        conflict: bool,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Update a task with a caller-supplied base version
    ExternalVersion {
        /// Send an outdated version
        #[arg(short, long)]
        stale: bool,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    if cli.command.needs_startup_check() {
        dsx_core::self_check()?;
    }

    match cli.command {
        Commands::SelfCheck { format } => {
            commands::self_check::run(&format)?;
        }
        Commands::Demo { demo } => match demo {
            DemoCommand::ParentChild { conflict, format } => {
                commands::demo::parent_child(conflict, &format)?;
            }
            DemoCommand::ExternalVersion { stale } => {
                commands::demo::external_version(stale)?;
            }
        },
        Commands::Version => {
            println!("DSX CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("DSX Core v{}", dsx_core::VERSION);
            println!("Adapter v{}", dsx_core::ADAPTER_VERSION);
            println!("Protocol v{}", dsx_protocol::PROTOCOL_VERSION);
        }
    }

    Ok(())
}
