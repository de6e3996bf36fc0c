use crate::entities::sizing::PositionSizingConfig;
use crate::errors::BacktestError;

pub const DEFAULT_INITIAL_CAPITAL: f64 = 100_000.0;
pub const DEFAULT_COMMISSION_RATE: f64 = 0.0003;
pub const DEFAULT_STAMP_DUTY: f64 = 0.001;

/// Immutable per-run engine parameters. Rates are fractions, not basis points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineConfig {
    pub initial_capital: f64,
    /// Charged on both sides.
    pub commission_rate: f64,
    /// Charged on sells only.
    pub stamp_duty: f64,
    /// Symmetric: buys fill at `open * (1 + slippage)`, sells at `open * (1 - slippage)`.
    pub slippage: f64,
    pub sizing: PositionSizingConfig,
    pub risk_free_rate: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            initial_capital: DEFAULT_INITIAL_CAPITAL,
            commission_rate: DEFAULT_COMMISSION_RATE,
            stamp_duty: DEFAULT_STAMP_DUTY,
            slippage: 0.0,
            sizing: PositionSizingConfig::default(),
            risk_free_rate: 0.0,
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), BacktestError> {
        if !self.initial_capital.is_finite() || self.initial_capital <= 0.0 {
            return Err(BacktestError::InvalidConfig(
                "initial_capital must be finite and > 0".to_string(),
            ));
        }
        for (name, value) in [
            ("commission_rate", self.commission_rate),
            ("stamp_duty", self.stamp_duty),
            ("slippage", self.slippage),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(BacktestError::InvalidConfig(format!(
                    "{name} must be finite and >= 0"
                )));
            }
        }
        if self.slippage >= 1.0 {
            return Err(BacktestError::InvalidConfig(
                "slippage must be < 1".to_string(),
            ));
        }
        if !self.risk_free_rate.is_finite() {
            return Err(BacktestError::InvalidConfig(
                "risk_free_rate must be finite".to_string(),
            ));
        }
        self.sizing.validate().map_err(BacktestError::InvalidConfig)
    }
}
