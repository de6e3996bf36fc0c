pub mod backtest;
pub mod config;
