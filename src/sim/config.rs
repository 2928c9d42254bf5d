use std::path::PathBuf;

use log::warn;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use toml::Value;

use crate::delay::DelayConfig;
use crate::timeq::ServerConfig;
use crate::traffic::TrafficConfig;

pub trait Config: DeserializeOwned + Default {
    fn from_section(section: Option<&Value>) -> Result<Self, toml::de::Error> {
        match section {
            Some(value) => value.clone().try_into(),
            None => {
                warn!("config section not found, using defaults");
                Ok(Self::default())
            }
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SimConfig {
    /// ticks during which the traffic generator issues requests
    pub cycles: u64,
    /// ticks after traffic stops, to let outstanding requests finish
    pub drain_cycles: u64,
    pub log_level: u64,
    pub results_json: Option<PathBuf>,
}

impl Config for SimConfig {}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            cycles: 10_000,
            drain_cycles: 5_000,
            log_level: 0,
            results_json: None,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(default)]
pub struct BankConfig {
    pub num_ids: usize,
    pub write_resp_capacity: usize,
    pub read_data_capacity: usize,
    pub max_burst_len: u32,
}

impl Config for BankConfig {}

impl Default for BankConfig {
    fn default() -> Self {
        Self {
            num_ids: 4,
            write_resp_capacity: 32,
            read_data_capacity: 16,
            max_burst_len: 8,
        }
    }
}

impl BankConfig {
    pub fn ensure_valid(&self) {
        assert!(self.num_ids > 0, "num_ids must be > 0");
        assert!(self.write_resp_capacity > 0, "write_resp_capacity must be > 0");
        assert!(self.read_data_capacity > 0, "read_data_capacity must be > 0");
        assert!(
            (1..=64).contains(&self.max_burst_len),
            "max_burst_len must be within 1..=64"
        );
    }
}

#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(default)]
pub struct RealMemConfig {
    pub base_latency: u64,
    pub bytes_per_cycle: u32,
    pub queue_capacity: usize,
}

impl Config for RealMemConfig {}

impl Default for RealMemConfig {
    fn default() -> Self {
        Self {
            base_latency: 2,
            bytes_per_cycle: 8,
            queue_capacity: 64,
        }
    }
}

impl RealMemConfig {
    pub fn server(&self) -> ServerConfig {
        assert!(self.bytes_per_cycle > 0, "bytes_per_cycle must be > 0");
        assert!(self.queue_capacity > 0, "queue_capacity must be > 0");
        ServerConfig {
            base_latency: self.base_latency,
            bytes_per_cycle: self.bytes_per_cycle,
            queue_capacity: self.queue_capacity,
        }
    }
}

/// Every section of a configuration file.
#[derive(Debug, Clone, Default)]
pub struct SimmemConfig {
    pub sim: SimConfig,
    pub bank: BankConfig,
    pub delay: DelayConfig,
    pub realmem: RealMemConfig,
    pub traffic: TrafficConfig,
}

impl SimmemConfig {
    pub fn from_toml(text: &str) -> Result<Self, toml::de::Error> {
        let table: Value = toml::from_str(text)?;
        Ok(Self {
            sim: SimConfig::from_section(table.get("sim"))?,
            bank: BankConfig::from_section(table.get("bank"))?,
            delay: DelayConfig::from_section(table.get("delay"))?,
            realmem: RealMemConfig::from_section(table.get("realmem"))?,
            traffic: TrafficConfig::from_section(table.get("traffic"))?,
        })
    }

    pub fn ensure_valid(&self) {
        self.bank.ensure_valid();
        self.delay.ensure_valid();
        self.traffic.ensure_valid(self.bank.num_ids, self.bank.max_burst_len);
    }
}
