pub mod age;
mod calculator;
pub mod config;
pub mod rank;
pub mod slot;

pub use calculator::{CalcStats, DelayCalculator};
pub use config::DelayConfig;
pub use rank::{CostCategory, RankState};
