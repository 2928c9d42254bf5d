use serde::Deserialize;

use crate::sim::config::Config;

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct TrafficConfig {
    pub seed: u64,
    pub issue: TrafficIssueConfig,
    pub max_burst_len: u32,
    /// addresses are drawn from `0..1 << addr_bits`
    pub addr_bits: u32,
    /// fraction of bursts issued as FIXED bursts
    pub fixed_burst_rate: f64,
}

impl Config for TrafficConfig {}

impl Default for TrafficConfig {
    fn default() -> Self {
        Self {
            seed: 0x5eed,
            issue: TrafficIssueConfig::default(),
            max_burst_len: 4,
            addr_bits: 16,
            fixed_burst_rate: 0.0,
        }
    }
}

/// Per-tick probabilities of the requester driving each channel.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct TrafficIssueConfig {
    pub waddr_rate: f64,
    pub raddr_rate: f64,
    pub wdata_rate: f64,
    pub wresp_ready_rate: f64,
    pub rdata_ready_rate: f64,
}

impl Default for TrafficIssueConfig {
    fn default() -> Self {
        Self {
            waddr_rate: 0.2,
            raddr_rate: 0.2,
            wdata_rate: 0.6,
            wresp_ready_rate: 0.9,
            rdata_ready_rate: 0.9,
        }
    }
}

impl TrafficConfig {
    pub fn ensure_valid(&self, num_ids: usize, max_burst_len: u32) {
        let rates = [
            ("waddr_rate", self.issue.waddr_rate),
            ("raddr_rate", self.issue.raddr_rate),
            ("wdata_rate", self.issue.wdata_rate),
            ("wresp_ready_rate", self.issue.wresp_ready_rate),
            ("rdata_ready_rate", self.issue.rdata_ready_rate),
            ("fixed_burst_rate", self.fixed_burst_rate),
        ];
        for (name, rate) in rates {
            assert!((0.0..=1.0).contains(&rate), "{} must be within [0, 1]", name);
        }
        assert!(num_ids > 0, "traffic needs at least one identifier");
        assert!(
            self.max_burst_len >= 1 && self.max_burst_len <= max_burst_len,
            "traffic max_burst_len must be within 1..={}",
            max_burst_len
        );
        assert!(self.addr_bits >= 2 && self.addr_bits <= 48, "addr_bits must be within 2..=48");
    }
}
