use std::path::PathBuf;
use tplus_application::config::{Config, SizingMethodName, StrategyName};
use tplus_application::meta::engine_name;
use tplus_domain::entities::metrics::{format_pct, format_ratio};
use tplus_domain::repositories::artifacts::{BatchSummaryRow, ComparisonRow};

pub(super) fn print_config_summary(command: &str, config: &Config, out: Option<&PathBuf>) {
    println!(
        "{} cli: {} (run_id={}, symbol={}, initial_capital={})",
        engine_name(),
        command,
        config.run.run_id,
        config.run.symbol,
        config.run.initial_capital
    );
    println!(
        "data: csv_path={}, data_dir={}, start={}, end={}, out_dir={}",
        config
            .data
            .as_ref()
            .and_then(|data| data.csv_path.as_deref())
            .unwrap_or("none"),
        config.data_dir().display(),
        config.run.start.as_deref().unwrap_or("none"),
        config.run.end.as_deref().unwrap_or("none"),
        config.paths.out_dir
    );
    if let Some(costs) = config.costs.as_ref() {
        println!(
            "costs: commission_rate={}, stamp_duty={}, slippage={}",
            opt_f64(costs.commission_rate),
            opt_f64(costs.stamp_duty),
            opt_f64(costs.slippage)
        );
    }
    if let Some(sizing) = config.sizing.as_ref() {
        println!(
            "sizing: method={}, fraction={}, fixed_cash={}, lot_size={}",
            match sizing.method {
                Some(SizingMethodName::AllIn) | None => "all_in",
                Some(SizingMethodName::FixedFraction) => "fixed_fraction",
                Some(SizingMethodName::FixedCash) => "fixed_cash",
            },
            opt_f64(sizing.fraction),
            opt_f64(sizing.fixed_cash),
            sizing
                .lot_size
                .map(|lot| lot.to_string())
                .unwrap_or_else(|| "default".to_string())
        );
    }
    println!(
        "strategy: {}",
        match config.strategy.as_ref().map(|strategy| strategy.kind) {
            Some(StrategyName::MaCrossover) | None => "ma_crossover",
            Some(StrategyName::Rsi) => "rsi",
            Some(StrategyName::Dca) => "dca",
            Some(StrategyName::BuyAndHold) => "buy_and_hold",
            Some(StrategyName::Hold) => "hold",
        }
    );
    if let Some(variants) = config.variants.as_deref() {
        let names: Vec<&str> = variants.iter().map(|v| v.name.as_str()).collect();
        println!("variants: {}", names.join(", "));
    }
    if let Some(out_dir) = out {
        println!("output dir: {}", out_dir.display());
    }
}

fn opt_f64(value: Option<f64>) -> String {
    value
        .map(|v| v.to_string())
        .unwrap_or_else(|| "default".to_string())
}

pub(super) fn print_metrics_table(rows: &[(&'static str, String)]) {
    if rows.is_empty() {
        println!("no metrics (empty history)");
        return;
    }
    let width = rows.iter().map(|(label, _)| label.len()).max().unwrap_or(0);
    for (label, value) in rows {
        println!("  {label:<width$}  {value}");
    }
}

pub(super) fn print_batch_table(rows: &[BatchSummaryRow]) {
    println!(
        "{:<12} {:<8} {:>10} {:>10} {:>8} {:>10} {:>7} {:>9}",
        "symbol", "status", "return", "annual", "sharpe", "max_dd", "trades", "win_rate"
    );
    for row in rows {
        println!(
            "{:<12} {:<8} {:>10} {:>10} {:>8} {:>10} {:>7} {:>9}",
            row.symbol,
            row.status,
            cell(row.total_return, format_pct),
            cell(row.annualized_return, format_pct),
            cell(row.sharpe_ratio, format_ratio),
            cell(row.max_drawdown, format_pct),
            row.number_of_trades
                .map(|n| n.to_string())
                .unwrap_or_else(|| "-".to_string()),
            cell(row.win_rate, format_pct)
        );
    }
}

pub(super) fn print_comparison_table(rows: &[ComparisonRow]) {
    println!(
        "{:<16} {:<13} {:<15} {:<7} {:>10} {:>10} {:>8} {:>10} {:>7} {:>9} {:>14}",
        "variant",
        "strategy",
        "sizing",
        "status",
        "return",
        "annual",
        "sharpe",
        "max_dd",
        "trades",
        "win_rate",
        "final_equity"
    );
    for row in rows {
        println!(
            "{:<16} {:<13} {:<15} {:<7} {:>10} {:>10} {:>8} {:>10} {:>7} {:>9} {:>14}",
            row.variant,
            row.strategy,
            row.sizing,
            row.status,
            cell(row.total_return, format_pct),
            cell(row.annualized_return, format_pct),
            cell(row.sharpe_ratio, format_ratio),
            cell(row.max_drawdown, format_pct),
            row.number_of_trades
                .map(|n| n.to_string())
                .unwrap_or_else(|| "-".to_string()),
            cell(row.win_rate, format_pct),
            cell(row.final_capital, |v| format!("{v:.2}"))
        );
    }
}

fn cell(value: Option<f64>, format: fn(f64) -> String) -> String {
    value.map(format).unwrap_or_else(|| "-".to_string())
}

#[cfg(test)]
mod tests {
    use super::cell;
    use tplus_domain::entities::metrics::{format_pct, format_ratio};

    #[test]
    fn cell_formats_present_values_and_dashes_missing_ones() {
        assert_eq!(cell(Some(0.1234), format_pct), "12.34%");
        assert_eq!(cell(Some(f64::INFINITY), format_ratio), "inf");
        assert_eq!(cell(None, format_pct), "-");
    }
}
