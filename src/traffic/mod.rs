pub mod config;
pub mod generator;

pub use config::{TrafficConfig, TrafficIssueConfig};
pub use generator::{TrafficGenerator, TrafficOffer};
