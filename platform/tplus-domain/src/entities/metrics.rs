use crate::value_objects::closed_trade::ClosedTrade;
use serde::{Serialize, Serializer};

pub const TRADING_DAYS_PER_YEAR: f64 = 252.0;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PerformanceMetrics {
    pub initial_capital: f64,
    pub final_capital: f64,
    pub total_return: f64,
    pub annualized_return: f64,
    pub annualized_volatility: f64,
    pub sharpe_ratio: f64,
    /// Worst peak-to-trough decline, as a non-positive fraction.
    pub max_drawdown: f64,
    pub number_of_trades: usize,
    pub win_rate: f64,
    pub avg_win: f64,
    pub avg_loss: f64,
    /// `+inf` when there are winners and no losers.
    #[serde(serialize_with = "serialize_ratio")]
    pub profit_factor: f64,
}

impl PerformanceMetrics {
    /// Human-readable rows in report order.
    pub fn report_rows(&self) -> Vec<(&'static str, String)> {
        vec![
            ("Initial Capital", format!("{:.2}", self.initial_capital)),
            ("Final Capital", format!("{:.2}", self.final_capital)),
            ("Total Return", format_pct(self.total_return)),
            ("Annualized Return", format_pct(self.annualized_return)),
            ("Annualized Volatility", format_pct(self.annualized_volatility)),
            ("Max Drawdown", format_pct(self.max_drawdown)),
            ("Sharpe Ratio", format!("{:.2}", self.sharpe_ratio)),
            ("Number of Trades", self.number_of_trades.to_string()),
            ("Win Rate", format_pct(self.win_rate)),
            ("Avg Win", format!("{:.2}", self.avg_win)),
            ("Avg Loss", format!("{:.2}", self.avg_loss)),
            ("Profit Factor", format_ratio(self.profit_factor)),
        ]
    }
}

pub fn format_pct(value: f64) -> String {
    format!("{:.2}%", value * 100.0)
}

pub fn format_ratio(value: f64) -> String {
    if value.is_infinite() && value > 0.0 {
        "inf".to_string()
    } else {
        format!("{:.2}", value)
    }
}

fn serialize_ratio<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    if value.is_finite() {
        serializer.serialize_f64(*value)
    } else if value.is_nan() {
        serializer.serialize_str("nan")
    } else if *value > 0.0 {
        serializer.serialize_str("inf")
    } else {
        serializer.serialize_str("-inf")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
struct TradeStats {
    count: usize,
    win_rate: f64,
    avg_win: f64,
    avg_loss: f64,
    profit_factor: f64,
}

/// Summarizes an equity curve and the closed trades of one run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PerformanceAnalyzer {
    risk_free_rate: f64,
}

impl Default for PerformanceAnalyzer {
    fn default() -> Self {
        Self::new(0.0)
    }
}

impl PerformanceAnalyzer {
    pub fn new(risk_free_rate: f64) -> Self {
        Self { risk_free_rate }
    }

    /// Returns `None` for an empty curve.
    pub fn calculate_metrics(
        &self,
        equity_curve: &[f64],
        trades: &[ClosedTrade],
    ) -> Option<PerformanceMetrics> {
        let initial = *equity_curve.first()?;
        let last = *equity_curve.last()?;

        let total_return = if initial != 0.0 {
            (last - initial) / initial
        } else {
            0.0
        };

        let periods = equity_curve.len() as f64;
        let growth = 1.0 + total_return;
        let annualized_return = if growth > 0.0 {
            growth.powf(TRADING_DAYS_PER_YEAR / periods) - 1.0
        } else {
            -1.0
        };

        let returns = pct_change(equity_curve);
        let annualized_volatility = sample_std(&returns) * TRADING_DAYS_PER_YEAR.sqrt();
        let sharpe_ratio = if annualized_volatility != 0.0 && annualized_volatility.is_finite() {
            (annualized_return - self.risk_free_rate) / annualized_volatility
        } else {
            0.0
        };
        // Short, explosive curves can overflow the annualization.
        let sharpe_ratio = if sharpe_ratio.is_finite() {
            sharpe_ratio
        } else {
            0.0
        };

        let stats = trade_stats(trades);

        Some(PerformanceMetrics {
            initial_capital: initial,
            final_capital: last,
            total_return,
            annualized_return,
            annualized_volatility,
            sharpe_ratio,
            max_drawdown: max_drawdown(equity_curve),
            number_of_trades: stats.count,
            win_rate: stats.win_rate,
            avg_win: stats.avg_win,
            avg_loss: stats.avg_loss,
            profit_factor: stats.profit_factor,
        })
    }
}

/// Period-over-period returns; steps from a non-positive value are skipped.
fn pct_change(values: &[f64]) -> Vec<f64> {
    values
        .windows(2)
        .filter(|pair| pair[0] > 0.0)
        .map(|pair| pair[1] / pair[0] - 1.0)
        .collect()
}

/// Sample standard deviation (n - 1). Fewer than two observations give 0.
fn sample_std(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values
        .iter()
        .map(|v| {
            let diff = v - mean;
            diff * diff
        })
        .sum::<f64>()
        / (n - 1.0);
    var.sqrt()
}

fn max_drawdown(equity_curve: &[f64]) -> f64 {
    let mut running_max = f64::NEG_INFINITY;
    let mut worst = 0.0f64;
    for &equity in equity_curve {
        if equity > running_max {
            running_max = equity;
        }
        if running_max > 0.0 {
            let drawdown = (equity - running_max) / running_max;
            if drawdown < worst {
                worst = drawdown;
            }
        }
    }
    worst
}

fn trade_stats(trades: &[ClosedTrade]) -> TradeStats {
    if trades.is_empty() {
        return TradeStats::default();
    }

    let (wins, losses): (Vec<f64>, Vec<f64>) = trades
        .iter()
        .map(|trade| trade.pnl)
        .partition(|pnl| *pnl > 0.0);

    let mean = |values: &[f64]| {
        if values.is_empty() {
            0.0
        } else {
            values.iter().sum::<f64>() / values.len() as f64
        }
    };

    let gross_win: f64 = wins.iter().sum();
    let gross_loss = losses.iter().sum::<f64>().abs();
    let profit_factor = if gross_loss > 0.0 {
        gross_win / gross_loss
    } else if gross_win > 0.0 {
        f64::INFINITY
    } else {
        0.0
    };

    TradeStats {
        count: trades.len(),
        win_rate: wins.len() as f64 / trades.len() as f64,
        avg_win: mean(&wins),
        avg_loss: mean(&losses),
        profit_factor,
    }
}
