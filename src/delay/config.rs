use serde::Deserialize;

use crate::delay::rank::CostCategory;
use crate::sim::config::Config;

#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(default)]
pub struct DelayConfig {
    pub num_write_slots: usize,
    pub num_read_slots: usize,
    pub num_ranks: usize,
    /// address bit where the rank index starts
    pub rank_shift: u32,
    /// address bit where the row index starts
    pub row_shift: u32,
    pub row_hit_latency: u32,
    pub row_closed_latency: u32,
    pub row_conflict_latency: u32,
}

impl Config for DelayConfig {}

impl Default for DelayConfig {
    fn default() -> Self {
        Self {
            num_write_slots: 16,
            num_read_slots: 8,
            num_ranks: 1,
            rank_shift: 20,
            row_shift: 10,
            row_hit_latency: 4,
            row_closed_latency: 7,
            row_conflict_latency: 10,
        }
    }
}

impl DelayConfig {
    /// Entries complete three ticks before the rank frees up, so no latency may be shorter.
    pub const MIN_LATENCY: u32 = 3;

    pub fn latency(&self, category: CostCategory) -> u32 {
        match category {
            CostCategory::Hit => self.row_hit_latency,
            CostCategory::Closed => self.row_closed_latency,
            CostCategory::Conflict => self.row_conflict_latency,
        }
    }

    pub fn ensure_valid(&self) {
        assert!(self.num_write_slots > 0, "num_write_slots must be > 0");
        assert!(self.num_read_slots > 0, "num_read_slots must be > 0");
        assert!(self.num_ranks > 0, "num_ranks must be > 0");
        assert!(self.row_shift < 64, "row_shift must be < 64");
        assert!(self.rank_shift < 64, "rank_shift must be < 64");
        for category in CostCategory::ALL {
            assert!(
                self.latency(category) >= Self::MIN_LATENCY,
                "{:?} latency must be >= {}",
                category,
                Self::MIN_LATENCY
            );
        }
    }

    pub fn rank_of(&self, addr: u64) -> usize {
        ((addr >> self.rank_shift) % self.num_ranks as u64) as usize
    }

    pub fn row_of(&self, addr: u64) -> u64 {
        addr >> self.row_shift
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        DelayConfig::default().ensure_valid();
    }

    #[test]
    #[should_panic(expected = "latency must be >= 3")]
    fn latency_below_completion_lead_is_rejected() {
        let config = DelayConfig {
            row_hit_latency: 2,
            ..DelayConfig::default()
        };
        config.ensure_valid();
    }

    #[test]
    fn section_overrides_defaults() {
        let value: toml::Value = toml::from_str("num_ranks = 2\nrow_hit_latency = 5").unwrap();
        let config = DelayConfig::from_section(Some(&value)).unwrap();
        assert_eq!(2, config.num_ranks);
        assert_eq!(5, config.row_hit_latency);
        assert_eq!(16, config.num_write_slots);
        assert_eq!(1, config.rank_of(1 << 20));
    }
}
