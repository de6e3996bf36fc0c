use crate::config::{Config, SizingMethodName, StrategyName};
use chrono::NaiveDate;
use sha2::{Digest, Sha256};
use std::path::PathBuf;
use tplus_domain::entities::sizing::{
    PositionSizingConfig, SizingMethod, DEFAULT_FIXED_CASH, DEFAULT_FRACTION,
};
use tplus_domain::repositories::market_data::BarQuery;
use tplus_domain::services::audit::AuditEvent;
use tplus_domain::services::engine::config::{
    EngineConfig, DEFAULT_COMMISSION_RATE, DEFAULT_STAMP_DUTY,
};
use tplus_domain::services::strategy::{dca, ma_crossover, rsi};
use tplus_domain::services::strategy::{
    BuyAndHold, HoldStrategy, MaCrossover, RsiThreshold, StrategyKind, WeeklyDca,
};
use tplus_domain::value_objects::history_point::HistoryPoint;

pub const DEFAULT_DATA_DIR: &str = "data";
const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub fn parse_date(field: &str, value: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|err| format!("{field} must be YYYY-MM-DD, got '{value}': {err}"))
}

pub fn resolve_date_range(
    config: &Config,
) -> Result<(Option<NaiveDate>, Option<NaiveDate>), String> {
    let start = config
        .run
        .start
        .as_deref()
        .map(|value| parse_date("run.start", value))
        .transpose()?;
    let end = config
        .run
        .end
        .as_deref()
        .map(|value| parse_date("run.end", value))
        .transpose()?;
    if let (Some(start), Some(end)) = (start, end) {
        if start > end {
            return Err(format!("run.start ({start}) is after run.end ({end})"));
        }
    }
    Ok((start, end))
}

pub fn resolve_data_dir(config: &Config) -> PathBuf {
    PathBuf::from(
        config
            .data
            .as_ref()
            .and_then(|data| data.data_dir.as_deref())
            .unwrap_or(DEFAULT_DATA_DIR),
    )
}

/// The explicit `data.csv_path` only belongs to `run.symbol`; any other symbol
/// is resolved by the repository from its data directory.
pub fn bar_query(config: &Config, symbol: &str) -> Result<BarQuery, String> {
    let (start, end) = resolve_date_range(config)?;
    let csv_path = if symbol == config.run.symbol {
        config
            .data
            .as_ref()
            .and_then(|data| data.csv_path.as_ref())
            .map(PathBuf::from)
    } else {
        None
    };
    Ok(BarQuery {
        symbol: symbol.to_string(),
        csv_path,
        start,
        end,
    })
}

pub fn resolve_sizing(config: &Config) -> PositionSizingConfig {
    let defaults = PositionSizingConfig::default();
    let Some(sizing) = config.sizing.as_ref() else {
        return defaults;
    };
    let method = match sizing.method.unwrap_or(SizingMethodName::AllIn) {
        SizingMethodName::AllIn => SizingMethod::AllIn,
        SizingMethodName::FixedFraction => SizingMethod::FixedFraction {
            fraction: sizing.fraction.unwrap_or(DEFAULT_FRACTION),
        },
        SizingMethodName::FixedCash => SizingMethod::FixedCash {
            amount: sizing.fixed_cash.unwrap_or(DEFAULT_FIXED_CASH),
        },
    };
    PositionSizingConfig {
        method,
        lot_size: sizing.lot_size.unwrap_or(defaults.lot_size),
        min_cash_fraction: sizing
            .min_cash_fraction
            .unwrap_or(defaults.min_cash_fraction),
        max_risk_fraction: sizing
            .max_risk_fraction
            .unwrap_or(defaults.max_risk_fraction),
        use_stop_loss: sizing.use_stop_loss.unwrap_or(defaults.use_stop_loss),
    }
}

pub fn resolve_risk_free_rate(config: &Config) -> f64 {
    config
        .metrics
        .as_ref()
        .and_then(|metrics| metrics.risk_free_rate)
        .unwrap_or(0.0)
}

pub fn build_engine_config(config: &Config) -> Result<EngineConfig, String> {
    let costs = config.costs.as_ref();
    let engine = EngineConfig {
        initial_capital: config.run.initial_capital,
        commission_rate: costs
            .and_then(|costs| costs.commission_rate)
            .unwrap_or(DEFAULT_COMMISSION_RATE),
        stamp_duty: costs
            .and_then(|costs| costs.stamp_duty)
            .unwrap_or(DEFAULT_STAMP_DUTY),
        slippage: costs.and_then(|costs| costs.slippage).unwrap_or(0.0),
        sizing: resolve_sizing(config),
        risk_free_rate: resolve_risk_free_rate(config),
    };
    engine.validate().map_err(|err| err.to_string())?;
    Ok(engine)
}

pub fn resolve_strategy_name(config: &Config) -> StrategyName {
    config
        .strategy
        .as_ref()
        .map(|strategy| strategy.kind)
        .unwrap_or(StrategyName::MaCrossover)
}

/// A fresh strategy instance per call; batch runs never share state between
/// symbols.
pub fn build_strategy(config: &Config) -> Result<StrategyKind, String> {
    let params = config.strategy.as_ref();
    match resolve_strategy_name(config) {
        StrategyName::MaCrossover => {
            let short = params
                .and_then(|p| p.short_window)
                .unwrap_or(ma_crossover::DEFAULT_SHORT_WINDOW);
            let long = params
                .and_then(|p| p.long_window)
                .unwrap_or(ma_crossover::DEFAULT_LONG_WINDOW);
            if short == 0 || long == 0 {
                return Err("strategy.short_window and long_window must be >= 1".to_string());
            }
            if short >= long {
                return Err(format!(
                    "strategy.short_window ({short}) must be < strategy.long_window ({long})"
                ));
            }
            Ok(StrategyKind::MaCrossover(MaCrossover::new(short, long)))
        }
        StrategyName::Rsi => {
            let period = params
                .and_then(|p| p.rsi_period)
                .unwrap_or(rsi::DEFAULT_PERIOD);
            let overbought = params
                .and_then(|p| p.overbought)
                .unwrap_or(rsi::DEFAULT_OVERBOUGHT);
            let oversold = params
                .and_then(|p| p.oversold)
                .unwrap_or(rsi::DEFAULT_OVERSOLD);
            if period == 0 {
                return Err("strategy.rsi_period must be >= 1".to_string());
            }
            if !(0.0..=100.0).contains(&oversold)
                || !(0.0..=100.0).contains(&overbought)
                || oversold >= overbought
            {
                return Err(
                    "strategy.oversold and overbought must satisfy 0 <= oversold < overbought <= 100"
                        .to_string(),
                );
            }
            Ok(StrategyKind::Rsi(RsiThreshold::new(
                period, overbought, oversold,
            )))
        }
        StrategyName::Dca => {
            let amount = params
                .and_then(|p| p.weekly_amount)
                .unwrap_or(dca::DEFAULT_WEEKLY_AMOUNT);
            if !amount.is_finite() || amount <= 0.0 {
                return Err("strategy.weekly_amount must be finite and > 0".to_string());
            }
            Ok(StrategyKind::Dca(WeeklyDca::new(amount)))
        }
        StrategyName::BuyAndHold => Ok(StrategyKind::BuyAndHold(BuyAndHold::new())),
        StrategyName::Hold => Ok(StrategyKind::Hold(HoldStrategy)),
    }
}

pub fn strategy_params_json(config: &Config) -> serde_json::Value {
    match build_strategy(config) {
        Ok(StrategyKind::MaCrossover(s)) => {
            let (short, long) = s.windows();
            serde_json::json!({ "kind": "ma_crossover", "short_window": short, "long_window": long })
        }
        Ok(StrategyKind::Rsi(_)) => {
            let params = config.strategy.as_ref();
            serde_json::json!({
                "kind": "rsi",
                "rsi_period": params.and_then(|p| p.rsi_period).unwrap_or(rsi::DEFAULT_PERIOD),
                "overbought": params.and_then(|p| p.overbought).unwrap_or(rsi::DEFAULT_OVERBOUGHT),
                "oversold": params.and_then(|p| p.oversold).unwrap_or(rsi::DEFAULT_OVERSOLD),
            })
        }
        Ok(StrategyKind::Dca(s)) => {
            serde_json::json!({ "kind": "dca", "weekly_amount": s.weekly_amount() })
        }
        Ok(StrategyKind::BuyAndHold(_)) => serde_json::json!({ "kind": "buy_and_hold" }),
        Ok(StrategyKind::Hold(_)) => serde_json::json!({ "kind": "hold" }),
        Err(err) => serde_json::json!({ "error": err }),
    }
}

pub fn config_sha256(config_toml: &str) -> String {
    let digest = Sha256::digest(config_toml.as_bytes());
    to_hex(&digest[..])
}

fn to_hex(bytes: &[u8]) -> String {
    const HEX: &[u8; 16] = b"0123456789abcdef";
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        out.push(HEX[(b >> 4) as usize] as char);
        out.push(HEX[(b & 0x0f) as usize] as char);
    }
    out
}

pub fn config_snapshot_json(
    config: &Config,
    engine: &EngineConfig,
    config_toml: &str,
) -> serde_json::Value {
    serde_json::json!({
        "run": {
            "run_id": config.run.run_id,
            "symbol": config.run.symbol,
            "initial_capital": engine.initial_capital,
            "start": config.run.start,
            "end": config.run.end,
        },
        "costs": {
            "commission_rate": engine.commission_rate,
            "stamp_duty": engine.stamp_duty,
            "slippage": engine.slippage,
        },
        "sizing": engine.sizing,
        "strategy": strategy_params_json(config),
        "metrics": {
            "risk_free_rate": engine.risk_free_rate,
        },
        "config_sha256": config_sha256(config_toml),
    })
}

pub fn summary_meta_json(
    run_id: &str,
    symbol: &str,
    strategy: &str,
    history: &[HistoryPoint],
) -> Option<serde_json::Value> {
    let start = history.first()?.datetime;
    let end = history.last()?.datetime;
    Some(serde_json::json!({
        "run_id": run_id,
        "symbol": symbol,
        "strategy": strategy,
        "start": start.format(DATETIME_FORMAT).to_string(),
        "end": end.format(DATETIME_FORMAT).to_string(),
    }))
}

pub fn timing_event(
    run_id: &str,
    symbol: Option<&str>,
    action: &str,
    duration_ms: u64,
    details: serde_json::Value,
) -> AuditEvent {
    AuditEvent {
        run_id: run_id.to_string(),
        datetime: None,
        stage: "timing".to_string(),
        symbol: symbol.map(|s| s.to_string()),
        action: action.to_string(),
        error: None,
        details: serde_json::json!({
            "duration_ms": duration_ms,
            "details": details,
        }),
    }
}

/// `510300.SH` -> `510300_SH`, safe as a directory name.
pub fn symbol_slug(symbol: &str) -> String {
    symbol
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{
        bar_query, build_engine_config, build_strategy, config_sha256, resolve_sizing,
        symbol_slug,
    };
    use crate::config::load_config_from_str;
    use tplus_domain::entities::sizing::SizingMethod;
    use tplus_domain::services::strategy::{Strategy, StrategyKind};

    const BASE: &str = r#"
[run]
run_id = "x"
symbol = "510300.SH"
initial_capital = 50000.0

[data]
csv_path = "data/explicit.csv"

[paths]
out_dir = "runs/"
"#;

    #[test]
    fn defaults_fill_missing_sections() {
        let config = load_config_from_str(BASE).expect("config");
        let engine = build_engine_config(&config).expect("engine");
        assert_eq!(engine.initial_capital, 50_000.0);
        assert_eq!(engine.commission_rate, 0.0003);
        assert_eq!(engine.stamp_duty, 0.001);
        assert_eq!(engine.slippage, 0.0);
        assert_eq!(engine.sizing.method, SizingMethod::AllIn);
        assert_eq!(engine.sizing.lot_size, 100);

        let strategy = build_strategy(&config).expect("strategy");
        assert_eq!(strategy.name(), "ma_crossover");
        match strategy {
            StrategyKind::MaCrossover(s) => assert_eq!(s.windows(), (10, 30)),
            _ => panic!("expected ma crossover"),
        }
    }

    #[test]
    fn sizing_method_carries_its_parameter() {
        let config = load_config_from_str(&format!(
            "{BASE}\n[sizing]\nmethod = \"fixed_cash\"\nfixed_cash = 5000.0\nlot_size = 10\n"
        ))
        .expect("config");
        let sizing = resolve_sizing(&config);
        assert_eq!(sizing.method, SizingMethod::FixedCash { amount: 5_000.0 });
        assert_eq!(sizing.lot_size, 10);

        let config = load_config_from_str(&format!("{BASE}\n[sizing]\nmethod = \"fixed_fraction\"\n"))
            .expect("config");
        assert_eq!(
            resolve_sizing(&config).method,
            SizingMethod::FixedFraction { fraction: 0.6 }
        );
    }

    #[test]
    fn explicit_csv_path_only_applies_to_the_run_symbol() {
        let config = load_config_from_str(BASE).expect("config");
        let own = bar_query(&config, "510300.SH").expect("query");
        assert!(own.csv_path.is_some());
        let other = bar_query(&config, "510050.SH").expect("query");
        assert!(other.csv_path.is_none());
    }

    #[test]
    fn config_hash_is_stable_hex() {
        let a = config_sha256("abc");
        assert_eq!(
            a,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_eq!(a, config_sha256("abc"));
        assert_ne!(a, config_sha256("abd"));
    }

    #[test]
    fn slug_replaces_separators() {
        assert_eq!(symbol_slug("510300.SH"), "510300_SH");
        assert_eq!(symbol_slug("BTC/USDT"), "BTC_USDT");
    }
}
