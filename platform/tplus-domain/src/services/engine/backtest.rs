use crate::entities::metrics::{PerformanceAnalyzer, PerformanceMetrics};
use crate::entities::portfolio::PortfolioState;
use crate::entities::sizing::{affordable_shares, round_to_lot, PositionSizer, ALL_IN_CASH_BUFFER};
use crate::errors::BacktestError;
use crate::services::audit::AuditEvent;
use crate::services::engine::config::EngineConfig;
use crate::services::strategy::Strategy;
use crate::value_objects::bar::Bar;
use crate::value_objects::closed_trade::ClosedTrade;
use crate::value_objects::execution::ExecutionRecord;
use crate::value_objects::history_point::HistoryPoint;
use crate::value_objects::side::Side;
use crate::value_objects::signal::Signal;
use chrono::NaiveDateTime;
use serde_json::json;
use tracing::{debug, info, warn};

pub const REJECT_NON_POSITIVE_QTY: &str = "non_positive_qty";
pub const REJECT_INSUFFICIENT_CASH: &str = "insufficient_cash";
pub const REJECT_T1_LOCKED: &str = "t1_locked";
pub const REJECT_NO_POSITION: &str = "no_position";
pub const REJECT_MISSING_OPEN: &str = "missing_open";

/// A buy/sell emitted on one bar, waiting for the next bar's open.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PendingSignal {
    pub emitted_at: NaiveDateTime,
    pub signal: Signal,
}

/// Everything one run mutates. Rebuilt from scratch at the start of `run`.
#[derive(Debug, Clone)]
pub struct EngineState {
    pub portfolio: PortfolioState,
    pub pending: Option<PendingSignal>,
    pub history: Vec<HistoryPoint>,
    pub executions: Vec<ExecutionRecord>,
    pub closed_trades: Vec<ClosedTrade>,
    pub audit_events: Vec<AuditEvent>,
    last_valid_close: Option<f64>,
}

impl EngineState {
    fn new(initial_capital: f64) -> Self {
        Self {
            portfolio: PortfolioState::new_with_cash(initial_capital),
            pending: None,
            history: Vec::new(),
            executions: Vec::new(),
            closed_trades: Vec::new(),
            audit_events: Vec::new(),
            last_valid_close: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestResults {
    /// `None` when no bar was processed.
    pub metrics: Option<PerformanceMetrics>,
    pub history: Vec<HistoryPoint>,
    /// Closed (sell-side) trades.
    pub trades: Vec<ClosedTrade>,
    /// Every fill, buys and sells.
    pub all_trades: Vec<ExecutionRecord>,
    pub audit_events: Vec<AuditEvent>,
}

/// Single-instrument bar-by-bar simulator.
///
/// A signal emitted on bar N fills at bar N+1's open; the strategy never sees
/// a price it could not have traded on. Shares bought on a date become
/// sellable on the first bar of a later date.
pub struct Backtester<S: Strategy> {
    run_id: String,
    symbol: Option<String>,
    strategy: S,
    config: EngineConfig,
    sizer: PositionSizer,
    analyzer: PerformanceAnalyzer,
    state: EngineState,
}

impl<S: Strategy> Backtester<S> {
    pub fn new(run_id: String, strategy: S, config: EngineConfig) -> Result<Self, BacktestError> {
        config.validate()?;
        Ok(Self {
            run_id,
            symbol: None,
            strategy,
            sizer: PositionSizer::new(config.sizing, config.initial_capital),
            analyzer: PerformanceAnalyzer::new(config.risk_free_rate),
            state: EngineState::new(config.initial_capital),
            config,
        })
    }

    pub fn with_symbol(mut self, symbol: impl Into<String>) -> Self {
        self.symbol = Some(symbol.into());
        self
    }

    pub fn portfolio(&self) -> &PortfolioState {
        &self.state.portfolio
    }

    pub fn pending(&self) -> Option<&PendingSignal> {
        self.state.pending.as_ref()
    }

    pub fn run(&mut self, bars: Vec<Bar>) -> Result<(), BacktestError> {
        let bars = prepare_bars(bars)?;
        self.state = EngineState::new(self.config.initial_capital);

        let first = bars[0].datetime;
        let last = bars[bars.len() - 1].datetime;
        info!(
            run_id = %self.run_id,
            strategy = self.strategy.name(),
            bars = bars.len(),
            start = %first,
            end = %last,
            "backtest started"
        );
        self.push_event(
            None,
            "engine",
            "start",
            None,
            json!({
                "strategy": self.strategy.name(),
                "bars": bars.len(),
                "start": first.to_string(),
                "end": last.to_string(),
                "initial_capital": self.config.initial_capital,
            }),
        );

        self.strategy.on_init();
        for bar in &bars {
            self.step(bar);
        }
        self.strategy.on_stop();

        if let Some(pending) = self.state.pending.take() {
            debug!(
                emitted_at = %pending.emitted_at,
                action = ?pending.signal.action,
                "signal on last bar dropped"
            );
            self.push_event(
                Some(pending.emitted_at),
                "order",
                "drop",
                Some("no_next_bar"),
                json!({ "action": pending.signal.action }),
            );
        }

        let portfolio = &self.state.portfolio;
        let final_assets = self
            .state
            .history
            .last()
            .map(|point| point.total_assets)
            .unwrap_or(self.config.initial_capital);
        info!(
            run_id = %self.run_id,
            executions = self.state.executions.len(),
            closed_trades = self.state.closed_trades.len(),
            cash = portfolio.cash(),
            position = portfolio.position(),
            final_assets,
            "backtest completed"
        );
        let details = json!({
            "bars_processed": self.state.history.len(),
            "executions": self.state.executions.len(),
            "closed_trades": self.state.closed_trades.len(),
            "final_cash": portfolio.cash(),
            "final_position": portfolio.position(),
            "final_assets": final_assets,
        });
        self.push_event(None, "engine", "complete", None, details);
        Ok(())
    }

    /// Snapshot of the last run. Calling it repeatedly yields identical output.
    pub fn get_results(&self) -> BacktestResults {
        let equity: Vec<f64> = self
            .state
            .history
            .iter()
            .map(|point| point.total_assets)
            .collect();
        BacktestResults {
            metrics: self
                .analyzer
                .calculate_metrics(&equity, &self.state.closed_trades),
            history: self.state.history.clone(),
            trades: self.state.closed_trades.clone(),
            all_trades: self.state.executions.clone(),
            audit_events: self.state.audit_events.clone(),
        }
    }

    fn step(&mut self, bar: &Bar) {
        if self.state.portfolio.roll_date(bar.date()) {
            debug!(date = %bar.date(), "new trading day, frozen shares released");
        }

        self.execute_pending(bar);

        let signal = self.strategy.on_bar(bar);
        self.schedule(bar, signal);

        self.record_history(bar);
    }

    fn execute_pending(&mut self, bar: &Bar) {
        let Some(pending) = self.state.pending.take() else {
            return;
        };
        let Some(side) = pending.signal.side() else {
            return;
        };

        if !bar.open.is_finite() || bar.open <= 0.0 {
            warn!(
                datetime = %bar.datetime,
                open = bar.open,
                side = %side,
                "no usable open price, pending signal skipped"
            );
            self.reject(bar.datetime, side, REJECT_MISSING_OPEN, json!({ "open": bar.open }));
            return;
        }

        match side {
            Side::Buy => self.buy(
                bar.open,
                bar.datetime,
                pending.signal.quantity,
                pending.signal.cash_amount,
            ),
            Side::Sell => self.sell(bar.open, bar.datetime, pending.signal.quantity),
        }
    }

    fn schedule(&mut self, bar: &Bar, signal: Signal) {
        if signal.side().is_none() {
            self.state.pending = None;
            return;
        }
        self.push_event(
            Some(bar.datetime),
            "order",
            "schedule",
            None,
            json!({
                "action": signal.action,
                "quantity": signal.quantity,
                "cash_amount": signal.cash_amount,
                "strategy_id": self.strategy.name(),
            }),
        );
        self.state.pending = Some(PendingSignal {
            emitted_at: bar.datetime,
            signal,
        });
    }

    fn buy(
        &mut self,
        price: f64,
        datetime: NaiveDateTime,
        quantity: Option<u64>,
        cash_amount: Option<f64>,
    ) {
        let exec_price = price * (1.0 + self.config.slippage);
        let cash = self.state.portfolio.cash();

        let quantity = match (cash_amount, quantity) {
            (Some(amount), _) => {
                if cash <= 0.0 {
                    self.reject(datetime, Side::Buy, REJECT_INSUFFICIENT_CASH, json!({ "cash": cash }));
                    return;
                }
                let budget = amount.min(cash * ALL_IN_CASH_BUFFER);
                round_to_lot(
                    affordable_shares(budget, exec_price),
                    self.config.sizing.lot_size,
                )
            }
            (None, Some(quantity)) => quantity,
            (None, None) => {
                if cash <= 0.0 {
                    self.reject(datetime, Side::Buy, REJECT_INSUFFICIENT_CASH, json!({ "cash": cash }));
                    return;
                }
                self.sizer
                    .size(exec_price, cash, self.state.portfolio.position())
            }
        };

        if quantity == 0 {
            self.reject(
                datetime,
                Side::Buy,
                REJECT_NON_POSITIVE_QTY,
                json!({ "price": exec_price, "cash": cash, "cash_amount": cash_amount }),
            );
            return;
        }

        let cost = quantity as f64 * exec_price;
        let commission = cost * self.config.commission_rate;
        if cash < cost + commission {
            self.reject(
                datetime,
                Side::Buy,
                REJECT_INSUFFICIENT_CASH,
                json!({ "quantity": quantity, "required": cost + commission, "cash": cash }),
            );
            return;
        }

        self.state
            .portfolio
            .apply_buy(quantity, exec_price, commission);
        self.record_fill(ExecutionRecord {
            datetime,
            side: Side::Buy,
            price: exec_price,
            quantity,
            commission,
        });
    }

    fn sell(&mut self, price: f64, datetime: NaiveDateTime, quantity: Option<u64>) {
        let tradable = self.state.portfolio.tradable();
        if tradable == 0 {
            let position = self.state.portfolio.position();
            let reason = if position == 0 {
                REJECT_NO_POSITION
            } else {
                REJECT_T1_LOCKED
            };
            self.reject(
                datetime,
                Side::Sell,
                reason,
                json!({
                    "position": position,
                    "frozen": self.state.portfolio.frozen_position(),
                }),
            );
            return;
        }

        let quantity = quantity.unwrap_or(tradable).min(tradable);
        if quantity == 0 {
            self.reject(datetime, Side::Sell, REJECT_NON_POSITIVE_QTY, json!({ "tradable": tradable }));
            return;
        }

        let exec_price = price * (1.0 - self.config.slippage);
        let revenue = quantity as f64 * exec_price;
        let commission = revenue * self.config.commission_rate;
        let tax = revenue * self.config.stamp_duty;
        let net = revenue - commission - tax;

        let entry_price = self.state.portfolio.apply_sell(quantity, net);
        let pnl = (exec_price - entry_price) * quantity as f64 - commission - tax;
        let return_pct = if entry_price > 0.0 {
            pnl / (entry_price * quantity as f64)
        } else {
            0.0
        };

        self.record_fill(ExecutionRecord {
            datetime,
            side: Side::Sell,
            price: exec_price,
            quantity,
            commission: commission + tax,
        });
        self.state.closed_trades.push(ClosedTrade {
            datetime,
            entry_price,
            exit_price: exec_price,
            quantity,
            pnl,
            return_pct,
        });
    }

    fn record_fill(&mut self, fill: ExecutionRecord) {
        debug!(
            datetime = %fill.datetime,
            side = %fill.side,
            price = fill.price,
            quantity = fill.quantity,
            commission = fill.commission,
            cash = self.state.portfolio.cash(),
            position = self.state.portfolio.position(),
            "fill"
        );
        self.push_event(
            Some(fill.datetime),
            "trade",
            fill.side.as_str(),
            None,
            json!({
                "price": fill.price,
                "quantity": fill.quantity,
                "commission": fill.commission,
                "cash_after": self.state.portfolio.cash(),
                "position_after": self.state.portfolio.position(),
            }),
        );
        self.state.executions.push(fill);
    }

    fn record_history(&mut self, bar: &Bar) {
        let close = if bar.close.is_finite() {
            self.state.last_valid_close = Some(bar.close);
            bar.close
        } else {
            self.state
                .last_valid_close
                .unwrap_or(self.state.portfolio.average_cost())
        };
        let portfolio = &self.state.portfolio;
        self.state.history.push(HistoryPoint {
            datetime: bar.datetime,
            cash: portfolio.cash(),
            position: portfolio.position(),
            close,
            total_assets: portfolio.total_assets(close),
        });
    }

    fn reject(&mut self, datetime: NaiveDateTime, side: Side, reason: &str, details: serde_json::Value) {
        debug!(datetime = %datetime, side = %side, reason, "order rejected");
        let details = json!({
            "side": side,
            "strategy_id": self.strategy.name(),
            "context": details,
        });
        self.push_event(Some(datetime), "order", "reject", Some(reason), details);
    }

    fn push_event(
        &mut self,
        datetime: Option<NaiveDateTime>,
        stage: &str,
        action: &str,
        error: Option<&str>,
        details: serde_json::Value,
    ) {
        self.state.audit_events.push(AuditEvent {
            run_id: self.run_id.clone(),
            datetime,
            stage: stage.to_string(),
            symbol: self.symbol.clone(),
            action: action.to_string(),
            error: error.map(|e| e.to_string()),
            details,
        });
    }
}

/// Sorts bars by datetime (stable) and enforces a non-empty, strictly
/// increasing index. A duplicate is reported at its position in sorted order.
pub fn prepare_bars(mut bars: Vec<Bar>) -> Result<Vec<Bar>, BacktestError> {
    if bars.is_empty() {
        return Err(BacktestError::EmptyBars);
    }
    bars.sort_by_key(|bar| bar.datetime);
    if let Some(index) = bars
        .windows(2)
        .position(|pair| pair[0].datetime == pair[1].datetime)
    {
        return Err(BacktestError::DuplicateTimestamp {
            index: index + 1,
            datetime: bars[index].datetime,
        });
    }
    Ok(bars)
}
