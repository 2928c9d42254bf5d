//! Request and response records exchanged across the requester / real-memory boundary.
//!
//! Records are plain structs; how they are moved (handshakes) and laid out on a wire is left to
//! the caller.

use crate::types::AxiId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BurstType {
    Fixed,
    #[default]
    Incr,
    Wrap,
}

/// Write or read address request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressRequest {
    pub id: AxiId,
    pub addr: u64,
    /// Number of beats, at least one.
    pub burst_len: u32,
    /// log2 of the number of bytes per beat.
    pub burst_size: u32,
    pub burst_type: BurstType,
}

impl AddressRequest {
    pub fn new(id: AxiId, addr: u64, burst_len: u32) -> Self {
        Self {
            id,
            addr,
            burst_len,
            burst_size: 2,
            burst_type: BurstType::Incr,
        }
    }

    pub fn with_burst_type(mut self, burst_type: BurstType) -> Self {
        self.burst_type = burst_type;
        self
    }

    pub fn with_burst_size(mut self, burst_size: u32) -> Self {
        self.burst_size = burst_size;
        self
    }

    pub fn is_fixed(&self) -> bool {
        self.burst_type == BurstType::Fixed
    }

    pub fn beat_bytes(&self) -> u32 {
        1 << self.burst_size
    }

    /// Address touched by beat `beat` of the burst.
    ///
    /// Fixed bursts reuse the start address for every beat; the beat index still advances.
    pub fn beat_addr(&self, beat: u32) -> u64 {
        let step = (beat as u64) << self.burst_size;
        match self.burst_type {
            BurstType::Fixed => self.addr,
            BurstType::Incr => self.addr.wrapping_add(step),
            BurstType::Wrap => {
                let span = (self.burst_len.max(1) as u64) << self.burst_size;
                let base = self.addr / span * span;
                base + (self.addr - base + step) % span
            }
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteData {
    pub id: AxiId,
    pub data: u64,
    pub strb: u8,
    pub last: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReadData {
    pub id: AxiId,
    pub data: u64,
    pub rsp: u8,
    pub last: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteResponse {
    pub id: AxiId,
    pub rsp: u8,
    /// Opaque tag copied from the request by the memory side.
    pub content: u64,
}

/// Anything a response bank can hold must expose the identifier it is ordered under.
pub trait Tagged {
    fn axi_id(&self) -> AxiId;
}

impl Tagged for ReadData {
    fn axi_id(&self) -> AxiId {
        self.id
    }
}

impl Tagged for WriteResponse {
    fn axi_id(&self) -> AxiId {
        self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn incr_burst_advances_by_beat_size() {
        let req = AddressRequest::new(0, 0x100, 4).with_burst_size(2);
        let addrs: Vec<u64> = (0..4).map(|b| req.beat_addr(b)).collect();
        assert_eq!(vec![0x100, 0x104, 0x108, 0x10c], addrs);
    }

    #[test]
    fn fixed_burst_reuses_start_address() {
        let req = AddressRequest::new(0, 0x40, 3).with_burst_type(BurstType::Fixed);
        assert!(req.is_fixed());
        assert!((0..3).all(|b| req.beat_addr(b) == 0x40));
    }

    #[test]
    fn wrap_burst_stays_inside_aligned_window() {
        let req = AddressRequest::new(0, 0x38, 4)
            .with_burst_size(3)
            .with_burst_type(BurstType::Wrap);
        let addrs: Vec<u64> = (0..4).map(|b| req.beat_addr(b)).collect();
        assert_eq!(vec![0x38, 0x20, 0x28, 0x30], addrs);
    }
}
