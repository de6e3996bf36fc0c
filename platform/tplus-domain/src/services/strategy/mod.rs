//! Signal generators. A strategy only sees bars; sizing, settlement and
//! execution belong to the engine.

pub mod dca;
pub mod ma_crossover;
pub mod rsi;

pub use dca::WeeklyDca;
pub use ma_crossover::MaCrossover;
pub use rsi::RsiThreshold;

use crate::value_objects::bar::Bar;
use crate::value_objects::signal::Signal;

pub trait Strategy {
    fn name(&self) -> &str;

    /// Called once before the first bar. Implementations reset any state kept
    /// from a previous run here.
    fn on_init(&mut self) {}

    fn on_bar(&mut self, _bar: &Bar) -> Signal {
        Signal::hold()
    }

    fn on_stop(&mut self) {}
}

impl<S: Strategy + ?Sized> Strategy for Box<S> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn on_init(&mut self) {
        (**self).on_init()
    }

    fn on_bar(&mut self, bar: &Bar) -> Signal {
        (**self).on_bar(bar)
    }

    fn on_stop(&mut self) {
        (**self).on_stop()
    }
}

pub struct HoldStrategy;

impl Strategy for HoldStrategy {
    fn name(&self) -> &str {
        "hold"
    }
}

/// Buys once on the first bar and never sells.
#[derive(Debug, Default)]
pub struct BuyAndHold {
    has_bought: bool,
}

impl BuyAndHold {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Strategy for BuyAndHold {
    fn name(&self) -> &str {
        "buy_and_hold"
    }

    fn on_init(&mut self) {
        self.has_bought = false;
    }

    fn on_bar(&mut self, _bar: &Bar) -> Signal {
        if self.has_bought {
            return Signal::hold();
        }
        self.has_bought = true;
        Signal::buy()
    }
}

/// The bundled strategies behind one concrete type, so config-driven callers
/// can stay generic without boxing.
pub enum StrategyKind {
    Hold(HoldStrategy),
    BuyAndHold(BuyAndHold),
    MaCrossover(MaCrossover),
    Rsi(RsiThreshold),
    Dca(WeeklyDca),
}

impl StrategyKind {
    fn inner(&self) -> &dyn Strategy {
        match self {
            StrategyKind::Hold(s) => s,
            StrategyKind::BuyAndHold(s) => s,
            StrategyKind::MaCrossover(s) => s,
            StrategyKind::Rsi(s) => s,
            StrategyKind::Dca(s) => s,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn Strategy {
        match self {
            StrategyKind::Hold(s) => s,
            StrategyKind::BuyAndHold(s) => s,
            StrategyKind::MaCrossover(s) => s,
            StrategyKind::Rsi(s) => s,
            StrategyKind::Dca(s) => s,
        }
    }
}

impl Strategy for StrategyKind {
    fn name(&self) -> &str {
        self.inner().name()
    }

    fn on_init(&mut self) {
        self.inner_mut().on_init()
    }

    fn on_bar(&mut self, bar: &Bar) -> Signal {
        self.inner_mut().on_bar(bar)
    }

    fn on_stop(&mut self) {
        self.inner_mut().on_stop()
    }
}

/// Simple moving average of the `window` values ending `offset` places before
/// the end of `values`.
pub(crate) fn trailing_mean(values: &[f64], window: usize, offset: usize) -> Option<f64> {
    if window == 0 || values.len() < window + offset {
        return None;
    }
    let end = values.len() - offset;
    let slice = &values[end - window..end];
    Some(slice.iter().sum::<f64>() / window as f64)
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::value_objects::bar::Bar;
    use chrono::{Duration, NaiveDate};

    pub fn bars_from_closes(closes: &[f64]) -> Vec<Bar> {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1)
            .and_then(|d| d.and_hms_opt(15, 0, 0))
            .expect("valid datetime");
        closes
            .iter()
            .enumerate()
            .map(|(i, close)| Bar {
                datetime: start + Duration::days(i as i64),
                open: *close,
                high: *close,
                low: *close,
                close: *close,
                volume: 1_000.0,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::bars_from_closes;
    use super::{trailing_mean, BuyAndHold, HoldStrategy, Strategy, StrategyKind};
    use crate::value_objects::signal::{Action, Signal};

    #[test]
    fn buy_and_hold_buys_once_per_run() {
        let mut strategy = StrategyKind::BuyAndHold(BuyAndHold::new());
        let bars = bars_from_closes(&[1.0, 2.0, 3.0]);
        strategy.on_init();
        let actions: Vec<Action> = bars.iter().map(|b| strategy.on_bar(b).action).collect();
        assert_eq!(actions, vec![Action::Buy, Action::Hold, Action::Hold]);

        strategy.on_init();
        assert_eq!(strategy.on_bar(&bars[0]), Signal::buy());
        assert_eq!(strategy.name(), "buy_and_hold");
    }

    #[test]
    fn hold_never_trades() {
        let mut strategy = HoldStrategy;
        for bar in bars_from_closes(&[1.0, 2.0]) {
            assert_eq!(strategy.on_bar(&bar), Signal::hold());
        }
    }

    #[test]
    fn trailing_mean_with_offset() {
        let values = [1.0, 2.0, 3.0, 4.0];
        assert_eq!(trailing_mean(&values, 2, 0), Some(3.5));
        assert_eq!(trailing_mean(&values, 2, 1), Some(2.5));
        assert_eq!(trailing_mean(&values, 4, 1), None);
        assert_eq!(trailing_mean(&values, 0, 0), None);
    }
}
