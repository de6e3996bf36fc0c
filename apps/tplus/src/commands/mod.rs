use std::path::PathBuf;

mod backtest;
mod batch;
mod common;
mod compare;
mod report;
mod validate;

pub enum Command {
    Backtest { config: PathBuf, out: Option<PathBuf> },
    Batch { config: PathBuf, out: Option<PathBuf> },
    Compare { config: PathBuf, out: Option<PathBuf> },
    Validate { config: PathBuf, strict: bool },
    Report { input: PathBuf },
}

pub fn run(command: Command) -> Result<(), String> {
    match command {
        Command::Backtest { config, out } => backtest::run_backtest(config, out),
        Command::Batch { config, out } => batch::run_batch(config, out),
        Command::Compare { config, out } => compare::run_compare(config, out),
        Command::Validate { config, strict } => validate::run_validate(config, strict),
        Command::Report { input } => report::run_report(input),
    }
}
