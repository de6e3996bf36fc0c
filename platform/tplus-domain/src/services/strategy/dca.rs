use super::Strategy;
use crate::value_objects::bar::Bar;
use crate::value_objects::signal::Signal;
use chrono::Datelike;

pub const DEFAULT_WEEKLY_AMOUNT: f64 = 1_000.0;

/// Spends a fixed cash amount on the first bar of every week.
///
/// Weeks are keyed by calendar year and ISO week number, so an ISO week that
/// straddles 1 January buys once on each side of the year change.
#[derive(Debug, Clone)]
pub struct WeeklyDca {
    weekly_amount: f64,
    last_week: Option<(i32, u32)>,
    bars_processed: usize,
}

impl Default for WeeklyDca {
    fn default() -> Self {
        Self::new(DEFAULT_WEEKLY_AMOUNT)
    }
}

impl WeeklyDca {
    pub fn new(weekly_amount: f64) -> Self {
        Self {
            weekly_amount,
            last_week: None,
            bars_processed: 0,
        }
    }

    pub fn weekly_amount(&self) -> f64 {
        self.weekly_amount
    }

    pub fn bars_processed(&self) -> usize {
        self.bars_processed
    }
}

impl Strategy for WeeklyDca {
    fn name(&self) -> &str {
        "dca"
    }

    fn on_init(&mut self) {
        self.last_week = None;
        self.bars_processed = 0;
    }

    fn on_bar(&mut self, bar: &Bar) -> Signal {
        self.bars_processed += 1;
        let week = (bar.datetime.year(), bar.datetime.iso_week().week());
        if self.last_week == Some(week) {
            return Signal::hold();
        }
        self.last_week = Some(week);
        Signal::buy_cash(self.weekly_amount)
    }

    fn on_stop(&mut self) {
        tracing::debug!(bars = self.bars_processed, "dca strategy stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::WeeklyDca;
    use crate::services::strategy::Strategy;
    use crate::value_objects::bar::Bar;
    use crate::value_objects::signal::{Action, Signal};
    use chrono::NaiveDate;

    fn bar_on(y: i32, m: u32, d: u32) -> Bar {
        Bar {
            datetime: NaiveDate::from_ymd_opt(y, m, d)
                .and_then(|date| date.and_hms_opt(15, 0, 0))
                .expect("valid datetime"),
            open: 1.0,
            high: 1.0,
            low: 1.0,
            close: 1.0,
            volume: 0.0,
        }
    }

    #[test]
    fn buys_on_first_bar_of_each_week() {
        let mut strategy = WeeklyDca::new(500.0);
        strategy.on_init();
        // 2024-01-01 is a Monday.
        let bars = [
            bar_on(2024, 1, 1),
            bar_on(2024, 1, 2),
            bar_on(2024, 1, 5),
            bar_on(2024, 1, 8),
            bar_on(2024, 1, 9),
        ];
        let out: Vec<Signal> = bars.iter().map(|b| strategy.on_bar(b)).collect();
        assert_eq!(out[0], Signal::buy_cash(500.0));
        assert_eq!(out[1].action, Action::Hold);
        assert_eq!(out[2].action, Action::Hold);
        assert_eq!(out[3], Signal::buy_cash(500.0));
        assert_eq!(out[4].action, Action::Hold);
        assert_eq!(strategy.bars_processed(), 5);
    }

    #[test]
    fn week_spanning_new_year_buys_again_in_january() {
        let mut strategy = WeeklyDca::new(100.0);
        strategy.on_init();
        // 2024-12-30 (Mon) through 2025-01-03 (Fri) is ISO week 2025-W01.
        assert_eq!(strategy.on_bar(&bar_on(2024, 12, 30)).action, Action::Buy);
        assert_eq!(strategy.on_bar(&bar_on(2024, 12, 31)).action, Action::Hold);
        assert_eq!(strategy.on_bar(&bar_on(2025, 1, 2)).action, Action::Buy);
        assert_eq!(strategy.on_bar(&bar_on(2025, 1, 3)).action, Action::Hold);
        assert_eq!(strategy.on_bar(&bar_on(2025, 1, 6)).action, Action::Buy);
    }
}
