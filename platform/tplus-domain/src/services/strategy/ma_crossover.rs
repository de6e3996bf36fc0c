use super::{trailing_mean, Strategy};
use crate::value_objects::bar::Bar;
use crate::value_objects::signal::Signal;

pub const DEFAULT_SHORT_WINDOW: usize = 10;
pub const DEFAULT_LONG_WINDOW: usize = 30;

/// Golden cross buys, death cross sells, on simple moving averages of closes.
///
/// A cross needs the averages of two consecutive bars, so nothing is emitted
/// before `long_window + 1` closes have been seen.
#[derive(Debug, Clone)]
pub struct MaCrossover {
    short_window: usize,
    long_window: usize,
    closes: Vec<f64>,
}

impl Default for MaCrossover {
    fn default() -> Self {
        Self::new(DEFAULT_SHORT_WINDOW, DEFAULT_LONG_WINDOW)
    }
}

impl MaCrossover {
    pub fn new(short_window: usize, long_window: usize) -> Self {
        Self {
            short_window,
            long_window,
            closes: Vec::with_capacity(long_window + 1),
        }
    }

    pub fn windows(&self) -> (usize, usize) {
        (self.short_window, self.long_window)
    }
}

impl Strategy for MaCrossover {
    fn name(&self) -> &str {
        "ma_crossover"
    }

    fn on_init(&mut self) {
        self.closes.clear();
    }

    fn on_bar(&mut self, bar: &Bar) -> Signal {
        if !bar.close.is_finite() {
            return Signal::hold();
        }
        self.closes.push(bar.close);
        if self.closes.len() > self.long_window + 1 {
            self.closes.remove(0);
        }

        let averages = (
            trailing_mean(&self.closes, self.short_window, 0),
            trailing_mean(&self.closes, self.long_window, 0),
            trailing_mean(&self.closes, self.short_window, 1),
            trailing_mean(&self.closes, self.long_window, 1),
        );
        let (Some(short), Some(long), Some(prev_short), Some(prev_long)) = averages else {
            return Signal::hold();
        };

        if prev_short <= prev_long && short > long {
            Signal::buy()
        } else if prev_short >= prev_long && short < long {
            Signal::sell()
        } else {
            Signal::hold()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::MaCrossover;
    use crate::services::strategy::test_support::bars_from_closes;
    use crate::services::strategy::Strategy;
    use crate::value_objects::signal::Action;

    fn run(strategy: &mut MaCrossover, closes: &[f64]) -> Vec<Action> {
        strategy.on_init();
        bars_from_closes(closes)
            .iter()
            .map(|bar| strategy.on_bar(bar).action)
            .collect()
    }

    #[test]
    fn golden_and_death_cross() {
        let mut strategy = MaCrossover::new(2, 3);
        let closes = [10.0, 10.0, 10.0, 12.0, 12.0, 8.0, 6.0];
        let actions = run(&mut strategy, &closes);
        // Bar 3: short 11 > long 10.67 after equal averages on bar 2.
        assert_eq!(actions[3], Action::Buy);
        assert_eq!(actions[4], Action::Hold);
        // Bar 5: short 10 < long 10.67 after 12 >= 11.33.
        assert_eq!(actions[5], Action::Sell);
        assert_eq!(actions[6], Action::Hold);
    }

    #[test]
    fn warm_up_needs_long_window_plus_one() {
        let mut strategy = MaCrossover::new(1, 3);
        let actions = run(&mut strategy, &[1.0, 2.0, 3.0]);
        assert!(actions.iter().all(|a| *a == Action::Hold));
    }

    #[test]
    fn reinit_clears_history() {
        let mut strategy = MaCrossover::new(2, 3);
        let first = run(&mut strategy, &[10.0, 10.0, 10.0, 12.0]);
        let second = run(&mut strategy, &[10.0, 10.0, 10.0, 12.0]);
        assert_eq!(first, second);
    }
}
