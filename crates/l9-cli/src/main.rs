//! L9 CLI - operator tooling for the governed agent runtime.
//!
//! Inspects and prepares workspaces, manages the kernel integrity
//! manifest, runs governance scans, and drives the GMP/Git worker.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;
mod theme;

use commands::{config, init, kernels, queue, scan, worker};

/// L9 - Governed Agent Runtime
#[derive(Parser)]
#[command(name = "l9")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Only print errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Workspace root (defaults to the current directory)
    #[arg(short, long, global = true)]
    workspace: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check workspace readiness and create `.l9/` if missing
    InitWorkspace,

    /// Inspect kernels and manage the integrity manifest
    Kernels {
        #[command(subcommand)]
        command: KernelCommands,
    },

    /// Run governance rules and credential detection over text
    Scan {
        /// File to scan (reads stdin when omitted)
        file: Option<PathBuf>,
    },

    /// Inspect the task queue
    Queue {
        #[command(subcommand)]
        command: QueueCommands,
    },

    /// Run the GMP/Git worker
    Worker {
        #[command(subcommand)]
        command: WorkerCommands,
    },

    /// View configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
enum KernelCommands {
    /// List kernels in load order with their status and digest
    List,
    /// Print the value at a dotted path inside one kernel
    Rule {
        /// Kernel id (e.g. `safety`)
        kernel: String,
        /// Dotted path (e.g. `limits.max_files`)
        path: String,
    },
    /// Record current kernel digests in the manifest
    Lock,
    /// Compare kernel files against the manifest
    Verify,
}

#[derive(Subcommand)]
enum QueueCommands {
    /// Show backend health and queue length
    Status,
    /// List queued tasks in dequeue order without removing them
    Peek {
        /// Maximum number of tasks to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },
}

#[derive(Subcommand)]
enum WorkerCommands {
    /// Poll the queue and execute approved tasks
    Run {
        /// Process at most one task and exit
        #[arg(long)]
        once: bool,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Show resolved configuration with source annotations
    Show {
        /// Output format (toml or json)
        #[arg(short, long, default_value = "toml")]
        format: String,
    },
    /// Show config file paths and environment overrides
    Paths,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let workspace = match cli.workspace {
        Some(path) => path,
        None => std::env::current_dir()?,
    };

    // Config errors are reported by the command that needs the config.
    let loaded = l9_config::Config::load(Some(&workspace));

    let mut log_config = match &loaded {
        Ok(resolved) => l9_runtime::config_bridge::to_log_config(&resolved.config, &workspace),
        Err(_) => l9_telemetry::LogConfig::new("info"),
    };
    if cli.verbose {
        "debug".clone_into(&mut log_config.level);
    } else if cli.quiet {
        "error".clone_into(&mut log_config.level);
    }
    if let Err(e) = l9_telemetry::setup_logging(&log_config) {
        eprintln!("Failed to initialize logging: {e}");
    }

    let code = match cli.command {
        Commands::InitWorkspace => init::run_init_workspace(&workspace, loaded, cli.quiet).await?,
        Commands::Kernels { command } => {
            let cfg = loaded?.config;
            match command {
                KernelCommands::List => kernels::list_kernels(&cfg, &workspace),
                KernelCommands::Rule { kernel, path } => {
                    kernels::show_rule(&cfg, &workspace, &kernel, &path)?
                },
                KernelCommands::Lock => kernels::lock_kernels(&cfg, &workspace)?,
                KernelCommands::Verify => kernels::verify_kernels(&cfg, &workspace)?,
            }
        },
        Commands::Scan { file } => scan::run_scan(&loaded?.config, &workspace, file.as_deref())?,
        Commands::Queue { command } => {
            let cfg = loaded?.config;
            match command {
                QueueCommands::Status => queue::show_status(&cfg).await?,
                QueueCommands::Peek { limit } => queue::peek_tasks(&cfg, limit).await?,
            }
        },
        Commands::Worker { command } => match command {
            WorkerCommands::Run { once } => {
                worker::run_worker(loaded?.config, &workspace, once).await?
            },
        },
        Commands::Config { command } => match command {
            ConfigCommands::Show { format } => config::show_config(&loaded?, &format)?,
            ConfigCommands::Paths => config::show_paths(&workspace)?,
        },
    };

    Ok(ExitCode::from(u8::try_from(code).unwrap_or(1)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_init_workspace_flags_parse_after_subcommand() {
        let cli = Cli::try_parse_from(["l9", "init-workspace", "--workspace", "/tmp/ws", "--quiet"])
            .unwrap();
        assert!(cli.quiet);
        assert_eq!(cli.workspace, Some(PathBuf::from("/tmp/ws")));
        assert!(matches!(cli.command, Commands::InitWorkspace));
    }

    #[test]
    fn test_verbose_and_quiet_conflict() {
        assert!(Cli::try_parse_from(["l9", "-v", "-q", "init-workspace"]).is_err());
    }

    #[test]
    fn test_kernel_rule_arguments() {
        let cli = Cli::try_parse_from(["l9", "kernels", "rule", "safety", "limits.max_files"])
            .unwrap();
        let Commands::Kernels {
            command: KernelCommands::Rule { kernel, path },
        } = cli.command
        else {
            panic!("expected kernels rule");
        };
        assert_eq!(kernel, "safety");
        assert_eq!(path, "limits.max_files");
    }
}
