//! sift CLI binary entry point.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use sift::cli::{run_diagnose, run_prepare, PrepareOptions, RunOptions};

/// Feedback-driven search for a minimal set of safe source annotations.
///
/// Sift applies candidate annotation edits one at a time, re-runs the
/// external analyzer, and keeps only the edits that do not regress the
/// reported error count. All output is JSON for easy parsing.
#[derive(Parser)]
#[command(name = "sift")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Workspace root the build command runs in (default: current directory)
    #[arg(long, global = true)]
    workspace: Option<PathBuf>,

    /// Working directory for analyzer artifacts (default: .sift in workspace)
    #[arg(long, global = true)]
    out_dir: Option<PathBuf>,

    /// Log level for tracing output
    #[arg(long, global = true, value_enum, default_value = "warn")]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Commands,
}

/// Log level for tracing output.
#[derive(Clone, Copy, Debug, ValueEnum)]
enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    fn as_directive(self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Prepare the work list, evaluate every candidate fix, write reports.
    Run {
        /// Command that triggers a full re-analysis of the project
        #[arg(long)]
        build_command: String,

        /// Command implementing the annotation mutator exchange
        #[arg(long)]
        inject_command: String,

        /// Subtract fixes recorded in diagnosed.json from the work list
        #[arg(long)]
        optimized: bool,

        /// Measure only: roll back every fix, including kept ones
        #[arg(long)]
        revert_all: bool,

        /// Mirror fixes across the method inheritance tree
        #[arg(long)]
        propagate_inheritance: bool,

        /// Ceiling for one re-analysis run, in seconds
        #[arg(long, default_value_t = 600)]
        timeout_secs: u64,
    },

    /// Run only the preparation step (candidate conversion, work list).
    Prepare {
        /// Command that triggers a full re-analysis of the project
        #[arg(long)]
        build_command: String,

        /// Subtract fixes recorded in diagnosed.json from the work list
        #[arg(long)]
        optimized: bool,

        /// Ceiling for one re-analysis run, in seconds
        #[arg(long, default_value_t = 600)]
        timeout_secs: u64,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(cli.log_level.as_directive()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let workspace = cli
        .workspace
        .unwrap_or_else(|| std::env::current_dir().expect("Failed to get current directory"));
    let out_dir = cli.out_dir.unwrap_or_else(|| workspace.join(".sift"));

    let result = match cli.command {
        Commands::Run {
            build_command,
            inject_command,
            optimized,
            revert_all,
            propagate_inheritance,
            timeout_secs,
        } => run_diagnose(&RunOptions {
            workspace,
            out_dir,
            build_command,
            inject_command,
            optimized,
            revert_all,
            propagate_inheritance,
            timeout: Duration::from_secs(timeout_secs),
        }),
        Commands::Prepare {
            build_command,
            optimized,
            timeout_secs,
        } => run_prepare(&PrepareOptions {
            workspace,
            out_dir,
            build_command,
            optimized,
            timeout: Duration::from_secs(timeout_secs),
        }),
    };

    match result {
        Ok(json) => {
            println!("{json}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            let payload = serde_json::json!({
                "status": "error",
                "error": { "code": e.error_code().code(), "message": e.to_string() },
            });
            eprintln!("{payload}");
            ExitCode::from(e.error_code().code())
        }
    }
}
