use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SizingMethodName {
    AllIn,
    FixedFraction,
    FixedCash,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StrategyName {
    MaCrossover,
    Rsi,
    Dca,
    BuyAndHold,
    Hold,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub run: RunConfig,
    pub data: Option<DataConfig>,
    pub paths: PathsConfig,
    pub costs: Option<CostsConfig>,
    pub sizing: Option<SizingConfig>,
    pub strategy: Option<StrategyConfig>,
    pub metrics: Option<MetricsConfig>,
    pub batch: Option<BatchConfig>,
    pub report: Option<ReportConfig>,
    /// `[[variants]]` entries for `compare`; each overrides strategy and/or
    /// sizing of the base config.
    pub variants: Option<Vec<VariantConfig>>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct RunConfig {
    pub run_id: String,
    pub symbol: String,
    pub initial_capital: f64,
    /// Inclusive `YYYY-MM-DD` lower bound on bar dates.
    pub start: Option<String>,
    /// Inclusive `YYYY-MM-DD` upper bound on bar dates.
    pub end: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct DataConfig {
    pub csv_path: Option<String>,
    pub data_dir: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct PathsConfig {
    pub out_dir: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct CostsConfig {
    pub commission_rate: Option<f64>,
    pub stamp_duty: Option<f64>,
    pub slippage: Option<f64>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct SizingConfig {
    pub method: Option<SizingMethodName>,
    pub fraction: Option<f64>,
    pub fixed_cash: Option<f64>,
    pub lot_size: Option<u64>,
    pub min_cash_fraction: Option<f64>,
    pub max_risk_fraction: Option<f64>,
    pub use_stop_loss: Option<bool>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct StrategyConfig {
    pub kind: StrategyName,
    pub short_window: Option<usize>,
    pub long_window: Option<usize>,
    pub rsi_period: Option<usize>,
    pub overbought: Option<f64>,
    pub oversold: Option<f64>,
    pub weekly_amount: Option<f64>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct MetricsConfig {
    pub risk_free_rate: Option<f64>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct BatchConfig {
    pub symbols: Vec<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct ReportConfig {
    pub html: Option<bool>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct VariantConfig {
    pub name: String,
    pub strategy: Option<StrategyConfig>,
    pub sizing: Option<SizingConfig>,
}

impl Config {
    /// Checks everything a run would otherwise reject half-way through: engine
    /// parameters, strategy parameters and the date window.
    pub fn validate(&self) -> Result<(), String> {
        if self.run.run_id.trim().is_empty() {
            return Err("run.run_id must not be empty".to_string());
        }
        if self.run.symbol.trim().is_empty() {
            return Err("run.symbol must not be empty".to_string());
        }
        crate::shared::build_engine_config(self)?;
        crate::shared::build_strategy(self)?;
        crate::shared::resolve_date_range(self)?;
        self.validate_variants()
    }

    fn validate_variants(&self) -> Result<(), String> {
        let mut seen = HashSet::new();
        for variant in self.variants.as_deref().unwrap_or_default() {
            if variant.name.trim().is_empty() {
                return Err("variants.name must not be empty".to_string());
            }
            if !seen.insert(crate::shared::symbol_slug(&variant.name)) {
                return Err(format!("duplicate variant name '{}'", variant.name));
            }
            let config = self.with_variant(variant);
            crate::shared::build_engine_config(&config)
                .and_then(|_| crate::shared::build_strategy(&config).map(|_| ()))
                .map_err(|err| format!("variant '{}': {err}", variant.name))?;
        }
        Ok(())
    }

    /// The base config with one variant's overrides applied, as a standalone
    /// single-run config.
    pub fn with_variant(&self, variant: &VariantConfig) -> Config {
        let mut config = self.clone();
        config.run.run_id = format!(
            "{}_{}",
            self.run.run_id,
            crate::shared::symbol_slug(&variant.name)
        );
        if let Some(strategy) = variant.strategy.as_ref() {
            config.strategy = Some(strategy.clone());
        }
        if let Some(sizing) = variant.sizing.as_ref() {
            config.sizing = Some(sizing.clone());
        }
        config.batch = None;
        config.variants = None;
        config
    }

    /// Directory holding `<symbol>.csv` files; `data` when unset.
    pub fn data_dir(&self) -> PathBuf {
        crate::shared::resolve_data_dir(self)
    }

    pub fn html_report(&self) -> bool {
        self.report
            .as_ref()
            .and_then(|report| report.html)
            .unwrap_or(false)
    }
}

pub fn load_config(path: &Path) -> Result<Config, String> {
    let (config, _source) = load_config_with_source(path)?;
    Ok(config)
}

pub fn load_config_with_source(path: &Path) -> Result<(Config, String), String> {
    let contents = fs::read_to_string(path)
        .map_err(|err| format!("failed to read config {}: {}", path.display(), err))?;
    let config = load_config_from_str(&contents)
        .map_err(|err| format!("failed to parse TOML {}: {}", path.display(), err))?;
    Ok((config, contents))
}

pub fn load_config_from_str(raw: &str) -> Result<Config, String> {
    toml::from_str(raw).map_err(|err| err.to_string())
}

pub fn to_toml_pretty(config: &Config) -> Result<String, String> {
    toml::to_string_pretty(config)
        .map_err(|err| format!("failed to serialize config as TOML: {err}"))
}

#[cfg(test)]
mod tests {
    use super::{load_config, load_config_from_str, to_toml_pretty, Config, StrategyName};
    use std::path::Path;

    const FULL: &str = r#"
[run]
run_id = "510300_ma"
symbol = "510300.SH"
initial_capital = 100000.0
start = "2020-01-01"
end = "2023-12-31"

[data]
csv_path = "data/510300_SH_1d.csv"
data_dir = "storage/data"

[paths]
out_dir = "runs/"

[costs]
commission_rate = 0.0003
stamp_duty = 0.001
slippage = 0.0

[sizing]
method = "fixed_fraction"
fraction = 0.6
lot_size = 100
min_cash_fraction = 0.4

[strategy]
kind = "ma_crossover"
short_window = 10
long_window = 30

[metrics]
risk_free_rate = 0.0

[batch]
symbols = ["510300.SH", "510050.SH"]

[report]
html = false
"#;

    const MINIMAL: &str = r#"
[run]
run_id = "x"
symbol = "510300.SH"
initial_capital = 100000.0

[paths]
out_dir = "runs/"
"#;

    fn parse_config(toml_str: &str) -> Config {
        load_config_from_str(toml_str).expect("config should parse")
    }

    #[test]
    fn parse_full_config() {
        let config = parse_config(FULL);
        assert_eq!(config.run.symbol, "510300.SH");
        let strategy = config.strategy.as_ref().expect("strategy");
        assert_eq!(strategy.kind, StrategyName::MaCrossover);
        assert_eq!(strategy.long_window, Some(30));
        assert_eq!(
            config.batch.as_ref().map(|b| b.symbols.len()),
            Some(2)
        );
        assert!(!config.html_report());
        config.validate().expect("valid");
    }

    #[test]
    fn minimal_config_is_valid() {
        let config = parse_config(MINIMAL);
        assert!(config.costs.is_none());
        assert!(config.strategy.is_none());
        config.validate().expect("valid");
    }

    #[test]
    fn parse_config_rejects_unknown_fields() {
        let toml_str = format!("{MINIMAL}\n[costs]\nfee_bps = 10.0\n");
        let err = load_config_from_str(&toml_str).expect_err("unknown field");
        assert!(err.contains("fee_bps"), "{err}");
    }

    #[test]
    fn parse_config_rejects_unknown_sizing_method() {
        let toml_str = format!("{MINIMAL}\n[sizing]\nmethod = \"kelly\"\n");
        assert!(load_config_from_str(&toml_str).is_err());
    }

    #[test]
    fn validate_rejects_bad_parameters() {
        let cases = [
            ("[costs]\ncommission_rate = -0.1\n", "commission_rate"),
            ("[sizing]\nlot_size = 0\n", "lot_size"),
            ("[sizing]\nmethod = \"fixed_fraction\"\nfraction = 1.5\n", "fraction"),
            ("[sizing]\nmin_cash_fraction = 1.0\n", "min_cash_fraction"),
            (
                "[strategy]\nkind = \"ma_crossover\"\nshort_window = 30\nlong_window = 10\n",
                "short_window",
            ),
            ("[strategy]\nkind = \"rsi\"\nrsi_period = 0\n", "rsi_period"),
        ];
        for (section, needle) in cases {
            let config = parse_config(&format!("{MINIMAL}\n{section}"));
            let err = config.validate().expect_err(section);
            assert!(err.contains(needle), "{section}: {err}");
        }

        let mut config = parse_config(MINIMAL);
        config.run.initial_capital = 0.0;
        assert!(config.validate().is_err());

        let mut config = parse_config(MINIMAL);
        config.run.start = Some("2024-02-01".to_string());
        config.run.end = Some("2024-01-01".to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    fn pretty_toml_round_trips() {
        let config = parse_config(FULL);
        let rendered = to_toml_pretty(&config).expect("render");
        let again = parse_config(&rendered);
        assert_eq!(again.run.run_id, config.run.run_id);
        assert_eq!(
            again.sizing.as_ref().and_then(|s| s.fraction),
            Some(0.6)
        );
    }

    const VARIANTS: &str = r#"
[[variants]]
name = "rsi-base"

[variants.strategy]
kind = "rsi"

[[variants]]
name = "rsi fixed"

[variants.strategy]
kind = "rsi"

[variants.sizing]
method = "fixed_fraction"
fraction = 1.0
min_cash_fraction = 0.4

[[variants]]
name = "dca"

[variants.strategy]
kind = "dca"
weekly_amount = 2000.0
"#;

    #[test]
    fn variants_override_strategy_and_sizing() {
        let config = parse_config(&format!("{FULL}
{VARIANTS}"));
        config.validate().expect("valid");
        let variants = config.variants.as_deref().expect("variants");
        assert_eq!(variants.len(), 3);

        let fixed = config.with_variant(&variants[1]);
        assert_eq!(fixed.run.run_id, "510300_ma_rsi_fixed");
        assert_eq!(
            fixed.strategy.as_ref().map(|s| s.kind),
            Some(StrategyName::Rsi)
        );
        assert_eq!(
            fixed.sizing.as_ref().and_then(|s| s.min_cash_fraction),
            Some(0.4)
        );
        assert!(fixed.variants.is_none());
        assert!(fixed.batch.is_none());

        // Without a sizing override the base sizing is kept.
        let base = config.with_variant(&variants[0]);
        assert_eq!(base.run.run_id, "510300_ma_rsi-base");
        assert_eq!(base.sizing.as_ref().and_then(|s| s.fraction), Some(0.6));

        let rendered = to_toml_pretty(&base).expect("render");
        assert!(!rendered.contains("variants"));
    }

    #[test]
    fn validate_rejects_bad_variants() {
        let duplicate = "[[variants]]\nname = \"a\"\n\n[[variants]]\nname = \"a\"\n";
        let err = parse_config(&format!("{MINIMAL}\n{duplicate}"))
            .validate()
            .expect_err("duplicate");
        assert!(err.contains("duplicate variant"), "{err}");

        let blank = "[[variants]]\nname = \" \"\n";
        assert!(parse_config(&format!("{MINIMAL}\n{blank}")).validate().is_err());

        let broken = "[[variants]]\nname = \"slow\"\n\n[variants.strategy]\nkind = \"rsi\"\nrsi_period = 0\n";
        let err = parse_config(&format!("{MINIMAL}\n{broken}"))
            .validate()
            .expect_err("bad params");
        assert!(err.contains("variant 'slow'"), "{err}");
        assert!(err.contains("rsi_period"), "{err}");
    }

    #[test]
    fn load_config_missing_file_returns_error() {
        let path = Path::new("/tmp/tplus-missing-config.toml");
        let err = load_config(path).expect_err("expected load to fail");
        assert!(err.contains("failed to read config"));
    }
}
