use serde::Serialize;

/// Share of cash an all-in order may spend; the rest covers transaction costs.
pub const ALL_IN_CASH_BUFFER: f64 = 0.99;
pub const DEFAULT_LOT_SIZE: u64 = 100;
pub const DEFAULT_MIN_CASH_FRACTION: f64 = 0.4;
pub const DEFAULT_FRACTION: f64 = 0.6;
pub const DEFAULT_FIXED_CASH: f64 = 20_000.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum SizingMethod {
    /// Nearly all available cash.
    AllIn,
    /// A fraction of the cash above the reserve.
    FixedFraction { fraction: f64 },
    /// A fixed cash budget per order, capped by the cash above the reserve.
    FixedCash { amount: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PositionSizingConfig {
    #[serde(flatten)]
    pub method: SizingMethod,
    pub lot_size: u64,
    /// Cash kept aside, as a fraction of *initial* capital. Ignored by `AllIn`.
    pub min_cash_fraction: f64,
    /// Reserved for risk-based sizing; not read by any method yet.
    pub max_risk_fraction: f64,
    /// Reserved for stop-loss sizing; not read by any method yet.
    pub use_stop_loss: bool,
}

impl Default for PositionSizingConfig {
    fn default() -> Self {
        Self {
            method: SizingMethod::AllIn,
            lot_size: DEFAULT_LOT_SIZE,
            min_cash_fraction: DEFAULT_MIN_CASH_FRACTION,
            max_risk_fraction: 0.02,
            use_stop_loss: false,
        }
    }
}

impl PositionSizingConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.lot_size == 0 {
            return Err("sizing.lot_size must be >= 1".to_string());
        }
        if !self.min_cash_fraction.is_finite() || !(0.0..1.0).contains(&self.min_cash_fraction) {
            return Err("sizing.min_cash_fraction must be in [0, 1)".to_string());
        }
        match self.method {
            SizingMethod::AllIn => Ok(()),
            SizingMethod::FixedFraction { fraction } => {
                if fraction.is_finite() && fraction > 0.0 && fraction <= 1.0 {
                    Ok(())
                } else {
                    Err("sizing.fraction must be in (0, 1]".to_string())
                }
            }
            SizingMethod::FixedCash { amount } => {
                if amount.is_finite() && amount > 0.0 {
                    Ok(())
                } else {
                    Err("sizing.fixed_cash must be finite and > 0".to_string())
                }
            }
        }
    }
}

/// Rounds a share count down to a whole number of lots. A zero lot size
/// yields zero.
pub fn round_to_lot(quantity: u64, lot_size: u64) -> u64 {
    if lot_size == 0 {
        return 0;
    }
    (quantity / lot_size) * lot_size
}

/// Whole shares affordable with `cash` at `price`, before lot rounding.
pub(crate) fn affordable_shares(cash: f64, price: f64) -> u64 {
    if !cash.is_finite() || !price.is_finite() || cash <= 0.0 || price <= 0.0 {
        return 0;
    }
    (cash / price).floor() as u64
}

/// Turns a price and available cash into a buy quantity. It never looks at
/// settlement or broker constraints; the engine makes the final affordability
/// check.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PositionSizer {
    config: PositionSizingConfig,
    initial_capital: f64,
}

impl PositionSizer {
    pub fn new(config: PositionSizingConfig, initial_capital: f64) -> Self {
        Self {
            config,
            initial_capital,
        }
    }

    /// Desired buy quantity, always a multiple of the lot size.
    /// None of the bundled methods look at the current position yet.
    pub fn size(&self, price: f64, cash_available: f64, _current_position: u64) -> u64 {
        if !price.is_finite() || !cash_available.is_finite() {
            return 0;
        }
        if price <= 0.0 || cash_available <= 0.0 {
            return 0;
        }

        let lot_size = self.config.lot_size;
        if let SizingMethod::AllIn = self.config.method {
            let qty = affordable_shares(cash_available * ALL_IN_CASH_BUFFER, price);
            return round_to_lot(qty, lot_size);
        }

        let reserve = self.initial_capital * self.config.min_cash_fraction;
        let allocatable = (cash_available - reserve).max(0.0);
        if allocatable <= 0.0 {
            return 0;
        }

        let trade_cash = match self.config.method {
            SizingMethod::FixedFraction { fraction } => allocatable * fraction,
            SizingMethod::FixedCash { amount } => amount.min(allocatable),
            SizingMethod::AllIn => allocatable,
        };
        if trade_cash <= 0.0 {
            return 0;
        }

        round_to_lot(affordable_shares(trade_cash, price), lot_size)
    }
}
