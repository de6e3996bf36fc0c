mod commands;
mod infra;
mod obs;

use clap::{Parser, Subcommand};
use commands::Command;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "tplus")]
#[command(about = "T+1 bar-by-bar backtester", version, arg_required_else_help = true)]
#[command(
    after_help = "Examples:\n  tplus backtest --config configs/sample.toml --out runs/\n  tplus batch --config configs/sample.toml\n  tplus compare --config configs/compare.toml\n  tplus validate --config configs/sample.toml --strict\n  tplus report --input runs/<run_id>/\n"
)]
struct Cli {
    /// Log filter (overridden by env TPLUS_LOG).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Log output format: text | json
    #[arg(long, global = true, default_value = "text")]
    log_format: String,

    /// Expose Prometheus metrics on host:port.
    #[arg(long, global = true)]
    metrics_addr: Option<String>,

    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Subcommand)]
enum CliCommand {
    /// Run a single-symbol backtest and write its artifacts.
    Backtest {
        #[arg(long)]
        config: PathBuf,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Backtest every symbol listed under [batch].
    Batch {
        #[arg(long)]
        config: PathBuf,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Run every [[variants]] entry over the same bars and tabulate them.
    Compare {
        #[arg(long)]
        config: PathBuf,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Check config and market data without running the engine.
    Validate {
        #[arg(long)]
        config: PathBuf,
        #[arg(long, default_value_t = false)]
        strict: bool,
    },
    /// Recompute metrics for an existing run directory.
    Report {
        #[arg(long)]
        input: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();

    if let Err(err) = obs::init_tracing(&cli.log_level, &cli.log_format) {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
    if let Err(err) = obs::init_metrics(cli.metrics_addr.as_deref()) {
        eprintln!("error: {err}");
        std::process::exit(1);
    }

    let command = match cli.command {
        CliCommand::Backtest { config, out } => Command::Backtest { config, out },
        CliCommand::Batch { config, out } => Command::Batch { config, out },
        CliCommand::Compare { config, out } => Command::Compare { config, out },
        CliCommand::Validate { config, strict } => Command::Validate { config, strict },
        CliCommand::Report { input } => Command::Report { input },
    };

    if let Err(err) = commands::run(command) {
        eprintln!("error: {}", err);
        std::process::exit(1);
    }
}
