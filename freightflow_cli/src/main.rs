mod commands;
mod config;
mod documents;

use anyhow::Result;
use clap::{Parser, Subcommand};
use freightflow_core::ResolvePolicy;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use crate::commands::run::RunArgs;
use crate::config::Config;

#[derive(Parser)]
#[command(name = "freightflow")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// data directory (default: ~/.freightflow)
    #[arg(short, long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    Init {
        /// delay before a system step settles
        #[arg(long)]
        settlement_delay_ms: Option<u64>,

        /// strict or lenient
        #[arg(long, value_parser = parse_policy)]
        policy: Option<ResolvePolicy>,
    },

    #[command(subcommand)]
    Workflow(WorkflowCommands),

    /// Replay a scripted approval session
    Run {
        /// workflow file, or the id of a loaded workflow
        #[arg(short, long)]
        workflow: String,

        #[arg(short, long)]
        invoices: PathBuf,

        #[arg(short, long)]
        script: PathBuf,

        /// role definitions; decisions are authorized when given
        #[arg(short, long)]
        roles: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum WorkflowCommands {
    Load { file: PathBuf },

    List,
}

fn parse_policy(value: &str) -> Result<ResolvePolicy, String> {
    match value.to_ascii_lowercase().as_str() {
        "strict" => Ok(ResolvePolicy::Strict),
        "lenient" => Ok(ResolvePolicy::Lenient),
        other => Err(format!("unknown policy '{}', use strict or lenient", other)),
    }
}

fn init_tracing(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let root = match cli.data_dir {
        Some(dir) => dir,
        None => Config::default_dir()?,
    };
    let config = Config::load_or_default(&root)?;
    init_tracing(&config.log_filter);

    match cli.command {
        Commands::Init {
            settlement_delay_ms,
            policy,
        } => {
            commands::init::run(&root, settlement_delay_ms, policy)?;
        }

        Commands::Workflow(command) => match command {
            WorkflowCommands::Load { file } => {
                commands::workflow::load(&root, file)?;
            }
            WorkflowCommands::List => {
                commands::workflow::list(&root)?;
            }
        },

        Commands::Run {
            workflow,
            invoices,
            script,
            roles,
        } => {
            commands::run::run(
                &root,
                &config,
                RunArgs {
                    workflow,
                    invoices,
                    script,
                    roles,
                },
            )?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn policy_parses_case_insensitively() {
        assert_eq!(parse_policy("Lenient").unwrap(), ResolvePolicy::Lenient);
        assert_eq!(parse_policy("strict").unwrap(), ResolvePolicy::Strict);
        assert!(parse_policy("loose").is_err());
    }

    #[test]
    fn run_command_parses() {
        let cli = Cli::parse_from([
            "freightflow",
            "--data-dir",
            "/tmp/ff",
            "run",
            "--workflow",
            "fba_standard",
            "--invoices",
            "invoices.json",
            "--script",
            "script.yaml",
        ]);

        assert_eq!(cli.data_dir, Some(PathBuf::from("/tmp/ff")));
        assert!(matches!(
            cli.command,
            Commands::Run { roles: None, ref workflow, .. } if workflow == "fba_standard"
        ));
    }
}
