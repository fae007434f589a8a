//! opsgraph CLI - run DevOps workflows across build, infrastructure, security and testing executors
//!
//! Main entry point for the opsgraph command-line tool.

use clap::{Parser, Subcommand};
use colored::Colorize;
use opsgraph::{cli, ShutdownCoordinator, VersionInfo};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "opsgraph")]
#[command(about = "opsgraph - multi-executor DevOps workflow orchestrator", long_about = None)]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// Extra configuration file, merged over user and project config
    #[arg(short, long, global = true, env = "OPSGRAPH_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a workflow
    Run {
        /// Workflow type: deployment, security, testing, infrastructure, or any tag
        #[arg(short = 't', long = "type", default_value = "generic")]
        workflow_type: String,

        /// The operator request, e.g. "deploy the app"
        request: String,

        /// Context entries as key=value (repeatable)
        #[arg(short = 'C', long = "context")]
        context: Vec<String>,

        /// Use side-effect-free echo executors
        #[arg(long)]
        dry_run: bool,

        /// Output format: text (default), json
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Show how a request would be routed
    Route {
        #[arg(short = 't', long = "type", default_value = "generic")]
        workflow_type: String,

        request: String,

        /// Output format: text (default), json
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Print the effective configuration
    Config {
        /// Output format: toml (default), json
        #[arg(short, long, default_value = "toml")]
        format: String,
    },

    /// Show version information
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Cli::parse();

    if let Commands::Version = args.command {
        println!("{}", VersionInfo::current());
        return Ok(());
    }

    let config = cli::load_config(args.config).await?;
    cli::init_logging(&config.logging)?;

    match args.command {
        Commands::Run {
            workflow_type,
            request,
            context,
            dry_run,
            format,
        } => {
            let context = cli::parse_context(&context)?;

            let shutdown = ShutdownCoordinator::new();
            let _signal_handler = shutdown.install_signal_handlers();

            let success =
                cli::handle_run(&config, &workflow_type, &request, context, dry_run, &format, &shutdown).await?;
            if !success {
                if shutdown.is_shutdown_requested() {
                    eprintln!("{}", "✗ Workflow cancelled".red());
                }
                std::process::exit(1);
            }
            Ok(())
        }
        Commands::Route {
            workflow_type,
            request,
            format,
        } => {
            cli::handle_route(&config, &workflow_type, &request, &format)?;
            Ok(())
        }
        Commands::Config { format } => {
            cli::handle_config_show(&config, &format)?;
            Ok(())
        }
        Commands::Version => Ok(()),
    }
}
