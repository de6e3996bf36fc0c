use chrono::{Duration, NaiveDate};
use proptest::prelude::*;
use tplus_domain::entities::metrics::PerformanceAnalyzer;
use tplus_domain::entities::sizing::{PositionSizer, PositionSizingConfig, SizingMethod};
use tplus_domain::services::engine::backtest::Backtester;
use tplus_domain::services::engine::config::EngineConfig;
use tplus_domain::services::strategy::Strategy as TradingStrategy;
use tplus_domain::value_objects::bar::Bar;
use tplus_domain::value_objects::side::Side;
use tplus_domain::value_objects::signal::Signal;

struct Replay {
    signals: Vec<Signal>,
    index: usize,
}

impl TradingStrategy for Replay {
    fn name(&self) -> &str {
        "replay"
    }

    fn on_init(&mut self) {
        self.index = 0;
    }

    fn on_bar(&mut self, _bar: &Bar) -> Signal {
        let signal = self.signals.get(self.index).copied().unwrap_or_default();
        self.index += 1;
        signal
    }
}

fn signal_from_code(code: u8) -> Signal {
    match code % 6 {
        0 => Signal::buy(),
        1 => Signal::sell(),
        2 => Signal::buy_cash(5_000.0),
        3 => Signal::sell_quantity(100),
        _ => Signal::hold(),
    }
}

fn bars_from(prices: &[(f64, f64)], bars_per_day: usize) -> Vec<Bar> {
    let start = NaiveDate::from_ymd_opt(2023, 1, 2)
        .and_then(|d| d.and_hms_opt(9, 30, 0))
        .expect("valid datetime");
    prices
        .iter()
        .enumerate()
        .map(|(i, (open, close))| {
            let day = (i / bars_per_day) as i64;
            let slot = (i % bars_per_day) as i64;
            Bar {
                datetime: start + Duration::days(day) + Duration::minutes(30 * slot),
                open: *open,
                high: open.max(*close),
                low: open.min(*close),
                close: *close,
                volume: 1.0,
            }
        })
        .collect()
}

fn sizing_strategy() -> impl Strategy<Value = SizingMethod> {
    prop_oneof![
        Just(SizingMethod::AllIn),
        (0.05f64..=1.0).prop_map(|fraction| SizingMethod::FixedFraction { fraction }),
        (100.0f64..50_000.0).prop_map(|amount| SizingMethod::FixedCash { amount }),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 64,
        .. ProptestConfig::default()
    })]

    #[test]
    fn engine_book_stays_consistent(
        prices in prop::collection::vec((0.5f64..500.0, 0.5f64..500.0), 2..120),
        codes in prop::collection::vec(any::<u8>(), 120),
        bars_per_day in 1usize..4,
        method in sizing_strategy(),
    ) {
        let signals: Vec<Signal> = codes.into_iter().map(signal_from_code).collect();
        let config = EngineConfig {
            sizing: PositionSizingConfig {
                method,
                ..PositionSizingConfig::default()
            },
            ..EngineConfig::default()
        };
        let mut engine = Backtester::new(
            "prop_book".to_string(),
            Replay { signals, index: 0 },
            config,
        )
        .expect("engine");
        engine.run(bars_from(&prices, bars_per_day)).expect("run");

        let portfolio = engine.portfolio();
        prop_assert!(portfolio.frozen_position() <= portfolio.position());

        let results = engine.get_results();
        for point in &results.history {
            prop_assert!(point.cash >= 0.0);
            let expected = point.cash + point.position as f64 * point.close;
            prop_assert!((point.total_assets - expected).abs() < 1e-6);
        }
        for fill in results.all_trades.iter().filter(|f| f.side == Side::Buy) {
            prop_assert!(fill.quantity > 0);
            prop_assert_eq!(fill.quantity % 100, 0);
        }
        let sold: u64 = results.trades.iter().map(|t| t.quantity).sum();
        let bought: u64 = results
            .all_trades
            .iter()
            .filter(|f| f.side == Side::Buy)
            .map(|f| f.quantity)
            .sum();
        prop_assert_eq!(bought - sold, portfolio.position());

        let metrics = results.metrics.expect("metrics");
        prop_assert!(metrics.sharpe_ratio.is_finite());
        prop_assert!((-1.0..=0.0).contains(&metrics.max_drawdown));
    }

    #[test]
    fn sizer_output_is_whole_lots_within_budget(
        price in 0.01f64..1_000.0,
        cash in 0.0f64..1_000_000.0,
        lot_size in 1u64..500,
        method in sizing_strategy(),
    ) {
        let config = PositionSizingConfig {
            method,
            lot_size,
            ..PositionSizingConfig::default()
        };
        let qty = PositionSizer::new(config, 100_000.0).size(price, cash, 0);
        prop_assert_eq!(qty % lot_size, 0);
        prop_assert!(qty as f64 * price <= cash + 1e-6);
    }

    #[test]
    fn drawdown_is_bounded_for_positive_equity(
        equity in prop::collection::vec(0.01f64..100_000.0, 2..200),
    ) {
        let metrics = PerformanceAnalyzer::default()
            .calculate_metrics(&equity, &[])
            .expect("metrics");
        prop_assert!(metrics.sharpe_ratio.is_finite());
        prop_assert!((-1.0..=0.0).contains(&metrics.max_drawdown));
    }
}
