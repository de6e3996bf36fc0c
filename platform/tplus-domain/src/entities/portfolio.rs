use chrono::NaiveDate;

/// Single-instrument cash/position book with T+1 settlement.
///
/// Shares bought on a calendar date stay in `frozen_position` until the first
/// bar of a later date; only `position - frozen_position` may be sold.
#[derive(Debug, Clone, PartialEq)]
pub struct PortfolioState {
    cash: f64,
    position: u64,
    frozen_position: u64,
    average_cost: f64,
    last_seen_date: Option<NaiveDate>,
}

impl PortfolioState {
    pub fn new_with_cash(initial_cash: f64) -> Self {
        Self {
            cash: initial_cash,
            position: 0,
            frozen_position: 0,
            average_cost: 0.0,
            last_seen_date: None,
        }
    }

    pub fn cash(&self) -> f64 {
        self.cash
    }

    pub fn position(&self) -> u64 {
        self.position
    }

    pub fn frozen_position(&self) -> u64 {
        self.frozen_position
    }

    pub fn average_cost(&self) -> f64 {
        self.average_cost
    }

    pub fn last_seen_date(&self) -> Option<NaiveDate> {
        self.last_seen_date
    }

    pub fn tradable(&self) -> u64 {
        self.position.saturating_sub(self.frozen_position)
    }

    pub fn total_assets(&self, price: f64) -> f64 {
        self.cash + self.position as f64 * price
    }

    /// Advances the settlement calendar. Returns `true` when `date` starts a new
    /// trading day, in which case every frozen share becomes tradable.
    pub fn roll_date(&mut self, date: NaiveDate) -> bool {
        match self.last_seen_date {
            None => {
                self.last_seen_date = Some(date);
                false
            }
            Some(last) if date > last => {
                self.frozen_position = 0;
                self.last_seen_date = Some(date);
                true
            }
            Some(_) => false,
        }
    }

    pub(crate) fn apply_buy(&mut self, quantity: u64, price: f64, commission: f64) {
        let prev_value = self.position as f64 * self.average_cost;
        self.cash -= quantity as f64 * price + commission;
        if self.cash < 0.0 && self.cash > -1e-9 {
            self.cash = 0.0;
        }
        self.position += quantity;
        self.frozen_position += quantity;
        self.average_cost = (prev_value + quantity as f64 * price) / self.position as f64;
    }

    /// Books a sale of already-tradable shares and returns the cost basis the
    /// shares were carried at.
    pub(crate) fn apply_sell(&mut self, quantity: u64, net_proceeds: f64) -> f64 {
        let entry_cost = self.average_cost;
        self.cash += net_proceeds;
        self.position -= quantity;
        if self.position == 0 {
            self.average_cost = 0.0;
        }
        entry_cost
    }
}
