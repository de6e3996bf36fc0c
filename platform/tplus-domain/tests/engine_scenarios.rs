use chrono::{Duration, NaiveDate, NaiveDateTime};
use tplus_domain::entities::sizing::{PositionSizingConfig, SizingMethod};
use tplus_domain::services::engine::backtest::{
    BacktestResults, Backtester, REJECT_INSUFFICIENT_CASH, REJECT_NON_POSITIVE_QTY,
    REJECT_NO_POSITION, REJECT_T1_LOCKED,
};
use tplus_domain::services::engine::config::EngineConfig;
use tplus_domain::services::strategy::{
    BuyAndHold, HoldStrategy, MaCrossover, Strategy, WeeklyDca,
};
use tplus_domain::value_objects::bar::Bar;
use tplus_domain::value_objects::side::Side;
use tplus_domain::value_objects::signal::Signal;

/// Replays a fixed list of signals, one per bar, then holds.
struct Scripted {
    script: Vec<Signal>,
    index: usize,
}

impl Scripted {
    fn new(script: Vec<Signal>) -> Self {
        Self { script, index: 0 }
    }
}

impl Strategy for Scripted {
    fn name(&self) -> &str {
        "scripted"
    }

    fn on_init(&mut self) {
        self.index = 0;
    }

    fn on_bar(&mut self, _bar: &Bar) -> Signal {
        let signal = self.script.get(self.index).copied().unwrap_or_default();
        self.index += 1;
        signal
    }
}

fn at(date: (i32, u32, u32), hour: u32, minute: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(date.0, date.1, date.2)
        .and_then(|d| d.and_hms_opt(hour, minute, 0))
        .expect("valid datetime")
}

fn daily(i: i64, open: f64, close: f64) -> Bar {
    Bar {
        datetime: at((2024, 1, 2), 15, 0) + Duration::days(i),
        open,
        high: open.max(close),
        low: open.min(close),
        close,
        volume: 1_000.0,
    }
}

fn frictionless(initial_capital: f64) -> EngineConfig {
    EngineConfig {
        initial_capital,
        commission_rate: 0.0,
        stamp_duty: 0.0,
        slippage: 0.0,
        ..EngineConfig::default()
    }
}

fn run<S: Strategy>(strategy: S, config: EngineConfig, bars: Vec<Bar>) -> BacktestResults {
    let mut engine = Backtester::new("scenario".to_string(), strategy, config).expect("engine");
    engine.run(bars).expect("run");
    engine.get_results()
}

fn rejections(results: &BacktestResults) -> Vec<&str> {
    results
        .audit_events
        .iter()
        .filter(|event| event.action == "reject")
        .filter_map(|event| event.error.as_deref())
        .collect()
}

#[test]
fn fills_happen_at_the_next_bar_open() {
    let bars: Vec<Bar> = [100.0, 102.0, 104.0, 106.0, 108.0]
        .iter()
        .enumerate()
        .map(|(i, open)| daily(i as i64, *open, open + 1.0))
        .collect();
    let script = vec![
        Signal::buy(),
        Signal::hold(),
        Signal::hold(),
        Signal::sell(),
        Signal::hold(),
    ];

    let results = run(Scripted::new(script), frictionless(100_000.0), bars);

    assert_eq!(results.all_trades.len(), 2);
    let buy = &results.all_trades[0];
    assert_eq!(buy.side, Side::Buy);
    assert_eq!(buy.price, 102.0);
    assert_eq!(buy.datetime, at((2024, 1, 3), 15, 0));
    // floor(99_000 / 102) = 970, rounded down to 900.
    assert_eq!(buy.quantity, 900);

    let sell = &results.all_trades[1];
    assert_eq!(sell.side, Side::Sell);
    assert_eq!(sell.price, 108.0);
    assert_eq!(sell.quantity, 900);

    assert_eq!(results.trades.len(), 1);
    assert_eq!(results.trades[0].entry_price, 102.0);
    assert_eq!(results.trades[0].pnl, 5_400.0);

    // Valuation uses the close of the fill bar, not the open.
    let after_buy = &results.history[1];
    assert_eq!(after_buy.cash, 8_200.0);
    assert_eq!(after_buy.position, 900);
    assert_eq!(after_buy.total_assets, 8_200.0 + 900.0 * 103.0);
    assert_eq!(results.history[4].cash, 105_400.0);
}

#[test]
fn cash_moves_by_cost_plus_fees() {
    let bars = vec![
        daily(0, 10.0, 10.0),
        daily(1, 10.0, 11.0),
        daily(2, 12.0, 12.0),
    ];
    let script = vec![Signal::buy_quantity(1_000), Signal::sell()];
    let config = EngineConfig {
        commission_rate: 0.0003,
        stamp_duty: 0.001,
        ..frictionless(100_000.0)
    };

    let results = run(Scripted::new(script), config, bars);

    // 100_000 - 1_000 * 10 * 1.0003
    assert!((results.history[1].cash - 89_997.0).abs() < 1e-6);
    assert_eq!(results.history[1].position, 1_000);
    // + 1_000 * 12 * (1 - 0.0003 - 0.001)
    assert!((results.history[2].cash - 101_981.4).abs() < 1e-6);
    assert_eq!(results.history[2].position, 0);

    let sell = &results.all_trades[1];
    assert!((sell.commission - 15.6).abs() < 1e-9);

    let trade = &results.trades[0];
    assert!((trade.pnl - 1_984.4).abs() < 1e-6);
    assert!((trade.return_pct - 0.19844).abs() < 1e-9);
}

#[test]
fn same_day_shares_cannot_be_sold() {
    let bars = vec![
        Bar {
            datetime: at((2024, 1, 2), 9, 30),
            ..daily(0, 10.0, 10.0)
        },
        Bar {
            datetime: at((2024, 1, 2), 10, 30),
            ..daily(0, 10.0, 10.0)
        },
        Bar {
            datetime: at((2024, 1, 2), 11, 30),
            ..daily(0, 10.0, 10.0)
        },
        Bar {
            datetime: at((2024, 1, 3), 9, 30),
            ..daily(0, 11.0, 11.0)
        },
    ];
    let script = vec![
        Signal::buy_quantity(100),
        Signal::sell(),
        Signal::sell(),
        Signal::hold(),
    ];

    let results = run(Scripted::new(script), frictionless(10_000.0), bars);

    assert_eq!(rejections(&results), vec![REJECT_T1_LOCKED]);
    assert_eq!(results.history[2].position, 100);
    assert_eq!(results.all_trades.len(), 2);
    let sell = &results.all_trades[1];
    assert_eq!(sell.side, Side::Sell);
    assert_eq!(sell.datetime, at((2024, 1, 3), 9, 30));
    assert_eq!(sell.price, 11.0);
}

#[test]
fn signal_on_last_bar_is_dropped() {
    let results = run(
        BuyAndHold::new(),
        frictionless(100_000.0),
        vec![daily(0, 10.0, 10.0)],
    );
    assert!(results.all_trades.is_empty());
    assert!(results
        .audit_events
        .iter()
        .any(|event| event.action == "drop"));
    assert_eq!(results.history.len(), 1);
}

#[test]
fn results_are_stable_across_calls_and_reruns() {
    let bars: Vec<Bar> = (0..60)
        .map(|i| {
            let close = 100.0 + 10.0 * ((i as f64) / 6.0).sin();
            daily(i, close, close)
        })
        .collect();
    let mut engine = Backtester::new(
        "repeat".to_string(),
        MaCrossover::new(3, 8),
        EngineConfig::default(),
    )
    .expect("engine");

    engine.run(bars.clone()).expect("first run");
    let first = engine.get_results();
    assert_eq!(first, engine.get_results());
    assert!(!first.all_trades.is_empty());

    engine.run(bars).expect("second run");
    assert_eq!(first, engine.get_results());
}

#[test]
fn flat_prices_score_zero() {
    let bars: Vec<Bar> = (0..30).map(|i| daily(i, 10.0, 10.0)).collect();
    let results = run(HoldStrategy, EngineConfig::default(), bars);
    let metrics = results.metrics.expect("metrics");
    assert_eq!(metrics.sharpe_ratio, 0.0);
    assert_eq!(metrics.max_drawdown, 0.0);
    assert_eq!(metrics.profit_factor, 0.0);
    assert_eq!(metrics.total_return, 0.0);
    assert_eq!(metrics.final_capital, 100_000.0);
}

#[test]
fn cash_amount_buys_round_to_lots() {
    // 2024-01-01 and 2024-01-08 are Mondays.
    let bars = vec![
        Bar {
            datetime: at((2024, 1, 1), 15, 0),
            ..daily(0, 13.0, 13.0)
        },
        Bar {
            datetime: at((2024, 1, 2), 15, 0),
            ..daily(0, 13.0, 13.0)
        },
        Bar {
            datetime: at((2024, 1, 8), 15, 0),
            ..daily(0, 13.0, 13.0)
        },
        Bar {
            datetime: at((2024, 1, 9), 15, 0),
            ..daily(0, 13.0, 13.0)
        },
    ];
    let results = run(WeeklyDca::new(5_000.0), frictionless(100_000.0), bars);

    // floor(5_000 / 13) = 384 -> 300 per week.
    let quantities: Vec<u64> = results.all_trades.iter().map(|t| t.quantity).collect();
    assert_eq!(quantities, vec![300, 300]);
    assert_eq!(results.history[3].position, 600);
    assert_eq!(results.history[3].cash, 100_000.0 - 600.0 * 13.0);
}

#[test]
fn unaffordable_orders_leave_the_book_untouched() {
    let bars = vec![daily(0, 10.0, 10.0), daily(1, 10.0, 10.0)];
    let config = EngineConfig {
        commission_rate: 0.0003,
        ..frictionless(1_000.0)
    };
    let results = run(Scripted::new(vec![Signal::buy_quantity(100)]), config, bars);

    assert!(results.all_trades.is_empty());
    assert_eq!(rejections(&results), vec![REJECT_INSUFFICIENT_CASH]);
    assert_eq!(results.history[1].cash, 1_000.0);
}

#[test]
fn sell_is_clamped_to_tradable_shares() {
    let bars = vec![
        daily(0, 10.0, 10.0),
        daily(1, 10.0, 10.0),
        daily(2, 10.0, 10.0),
    ];
    let script = vec![Signal::buy_quantity(500), Signal::sell_quantity(800)];
    let results = run(Scripted::new(script), frictionless(100_000.0), bars);

    assert_eq!(results.all_trades[1].quantity, 500);
    assert_eq!(results.history[2].position, 0);
}

#[test]
fn sell_without_position_and_zero_quantity_are_rejected() {
    let bars = vec![
        daily(0, 10.0, 10.0),
        daily(1, 10.0, 10.0),
        daily(2, 10.0, 10.0),
    ];
    let script = vec![
        Signal::sell(),
        Signal::buy_quantity(0),
    ];
    let results = run(Scripted::new(script), frictionless(100_000.0), bars);

    assert!(results.all_trades.is_empty());
    assert_eq!(
        rejections(&results),
        vec![REJECT_NO_POSITION, REJECT_NON_POSITIVE_QTY]
    );
}

#[test]
fn sizer_sees_the_slipped_price() {
    let bars = vec![daily(0, 50.0, 50.0), daily(1, 50.0, 50.0)];
    let config = EngineConfig {
        slippage: 0.01,
        sizing: PositionSizingConfig {
            method: SizingMethod::FixedFraction { fraction: 1.0 },
            lot_size: 100,
            min_cash_fraction: 0.4,
            ..PositionSizingConfig::default()
        },
        ..frictionless(100_000.0)
    };
    let results = run(BuyAndHold::new(), config, bars);

    let buy = &results.all_trades[0];
    assert!((buy.price - 50.5).abs() < 1e-9);
    // 60_000 / 50.5 = 1188.1 -> 1100.
    assert_eq!(buy.quantity, 1_100);
}
