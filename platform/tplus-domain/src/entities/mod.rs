pub mod metrics;
pub mod portfolio;
pub mod sizing;
