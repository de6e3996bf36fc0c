pub mod bar;
pub mod closed_trade;
pub mod execution;
pub mod history_point;
pub mod side;
pub mod signal;
