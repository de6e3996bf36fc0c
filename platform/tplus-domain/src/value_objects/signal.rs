use crate::value_objects::side::Side;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    #[default]
    Hold,
    Buy,
    Sell,
}

/// What a strategy wants done at the next bar's open.
///
/// `quantity` and `cash_amount` are optional overrides; when both are absent the
/// engine sizes a buy through its position sizer and a sell liquidates every
/// tradable share. `cash_amount` is ignored on sells.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Signal {
    pub action: Action,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantity: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cash_amount: Option<f64>,
}

impl Signal {
    pub fn hold() -> Self {
        Self::default()
    }

    pub fn buy() -> Self {
        Self::from(Action::Buy)
    }

    pub fn sell() -> Self {
        Self::from(Action::Sell)
    }

    pub fn buy_quantity(quantity: u64) -> Self {
        Self {
            action: Action::Buy,
            quantity: Some(quantity),
            cash_amount: None,
        }
    }

    pub fn buy_cash(cash_amount: f64) -> Self {
        Self {
            action: Action::Buy,
            quantity: None,
            cash_amount: Some(cash_amount),
        }
    }

    pub fn sell_quantity(quantity: u64) -> Self {
        Self {
            action: Action::Sell,
            quantity: Some(quantity),
            cash_amount: None,
        }
    }

    pub fn side(&self) -> Option<Side> {
        match self.action {
            Action::Buy => Some(Side::Buy),
            Action::Sell => Some(Side::Sell),
            Action::Hold => None,
        }
    }
}

impl From<Action> for Signal {
    fn from(action: Action) -> Self {
        Self {
            action,
            quantity: None,
            cash_amount: None,
        }
    }
}
