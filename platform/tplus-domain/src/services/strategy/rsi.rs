use super::Strategy;
use crate::value_objects::bar::Bar;
use crate::value_objects::signal::Signal;

pub const DEFAULT_PERIOD: usize = 14;
pub const DEFAULT_OVERBOUGHT: f64 = 70.0;
pub const DEFAULT_OVERSOLD: f64 = 30.0;

/// Buys when RSI drops below `oversold`, sells when it rises above
/// `overbought`. RSI here is the simple-average (Cutler) variant over the last
/// `period` close-to-close changes.
#[derive(Debug, Clone)]
pub struct RsiThreshold {
    period: usize,
    overbought: f64,
    oversold: f64,
    closes: Vec<f64>,
}

impl Default for RsiThreshold {
    fn default() -> Self {
        Self::new(DEFAULT_PERIOD, DEFAULT_OVERBOUGHT, DEFAULT_OVERSOLD)
    }
}

impl RsiThreshold {
    pub fn new(period: usize, overbought: f64, oversold: f64) -> Self {
        Self {
            period,
            overbought,
            oversold,
            closes: Vec::new(),
        }
    }

    fn rsi(&self) -> Option<f64> {
        if self.period == 0 || self.closes.len() < self.period + 1 {
            return None;
        }
        let recent = &self.closes[self.closes.len() - (self.period + 1)..];
        let (gains, losses) = recent
            .windows(2)
            .map(|pair| pair[1] - pair[0])
            .fold((0.0, 0.0), |(gains, losses), change| {
                if change > 0.0 {
                    (gains + change, losses)
                } else {
                    (gains, losses - change)
                }
            });
        let avg_gain = gains / self.period as f64;
        let avg_loss = losses / self.period as f64;
        if avg_loss == 0.0 {
            return Some(100.0);
        }
        let rs = avg_gain / avg_loss;
        Some(100.0 - 100.0 / (1.0 + rs))
    }
}

impl Strategy for RsiThreshold {
    fn name(&self) -> &str {
        "rsi"
    }

    fn on_init(&mut self) {
        self.closes.clear();
    }

    fn on_bar(&mut self, bar: &Bar) -> Signal {
        if !bar.close.is_finite() {
            return Signal::hold();
        }
        self.closes.push(bar.close);
        if self.closes.len() <= self.period {
            return Signal::hold();
        }
        if self.closes.len() > self.period * 5 {
            self.closes.remove(0);
        }

        match self.rsi() {
            Some(rsi) if rsi < self.oversold => Signal::buy(),
            Some(rsi) if rsi > self.overbought => Signal::sell(),
            _ => Signal::hold(),
        }
    }
}
