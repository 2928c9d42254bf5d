use std::collections::VecDeque;

use log::debug;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::axi::{AddressRequest, BurstType, WriteData};
use crate::traffic::TrafficConfig;

/// What the requester drives during one tick.
#[derive(Debug, Default, Clone)]
pub struct TrafficOffer {
    pub waddr: Option<AddressRequest>,
    pub raddr: Option<AddressRequest>,
    pub wdata: Option<WriteData>,
    pub wresp_ready: bool,
    pub rdata_ready: bool,
}

/// Randomized requester.
///
/// A refused address request stays current and is offered again on the next tick. Write data
/// for the current write burst may be sent before the burst's address is accepted.
pub struct TrafficGenerator {
    config: TrafficConfig,
    num_ids: usize,
    rng: StdRng,
    cur_waddr: Option<AddressRequest>,
    cur_raddr: Option<AddressRequest>,
    wdata: VecDeque<WriteData>,
    issued_waddr: u64,
    issued_raddr: u64,
}

impl TrafficGenerator {
    pub fn new(config: TrafficConfig, num_ids: usize) -> Self {
        let rng = StdRng::seed_from_u64(config.seed);
        Self {
            config,
            num_ids,
            rng,
            cur_waddr: None,
            cur_raddr: None,
            wdata: VecDeque::new(),
            issued_waddr: 0,
            issued_raddr: 0,
        }
    }

    /// Draw this tick's offer. With `issuing` unset no new bursts are started, but pending
    /// requests and write data are still driven so outstanding traffic can finish.
    pub fn offer(&mut self, issuing: bool) -> TrafficOffer {
        let issue = self.config.issue.clone();
        if issuing && self.cur_waddr.is_none() && self.rng.gen_bool(issue.waddr_rate) {
            let req = self.random_request();
            for beat in 0..req.burst_len {
                self.wdata.push_back(WriteData {
                    id: req.id,
                    data: req.beat_addr(beat),
                    strb: 0xf,
                    last: beat + 1 == req.burst_len,
                });
            }
            self.cur_waddr = Some(req);
        }
        if issuing && self.cur_raddr.is_none() && self.rng.gen_bool(issue.raddr_rate) {
            self.cur_raddr = Some(self.random_request());
        }
        let wdata = if self.rng.gen_bool(issue.wdata_rate) {
            self.wdata.front().cloned()
        } else {
            None
        };
        TrafficOffer {
            waddr: self.cur_waddr.clone(),
            raddr: self.cur_raddr.clone(),
            wdata,
            wresp_ready: self.rng.gen_bool(issue.wresp_ready_rate),
            rdata_ready: self.rng.gen_bool(issue.rdata_ready_rate),
        }
    }

    /// Outcome of the handshakes of the last offer.
    pub fn handshake(&mut self, waddr_taken: bool, raddr_taken: bool, wdata_taken: bool) {
        if waddr_taken {
            if let Some(req) = self.cur_waddr.take() {
                debug!("traffic: write id {} addr {:#x} accepted", req.id, req.addr);
                self.issued_waddr += 1;
            }
        }
        if raddr_taken {
            if let Some(req) = self.cur_raddr.take() {
                debug!("traffic: read id {} addr {:#x} accepted", req.id, req.addr);
                self.issued_raddr += 1;
            }
        }
        if wdata_taken {
            self.wdata.pop_front();
        }
    }

    pub fn is_drained(&self) -> bool {
        self.cur_waddr.is_none() && self.cur_raddr.is_none() && self.wdata.is_empty()
    }

    pub fn issued(&self) -> (u64, u64) {
        (self.issued_waddr, self.issued_raddr)
    }

    fn random_request(&mut self) -> AddressRequest {
        let id = self.rng.gen_range(0..self.num_ids);
        let burst_len = self.rng.gen_range(1..=self.config.max_burst_len);
        let addr = self.rng.gen_range(0..1u64 << self.config.addr_bits) & !0x3;
        let burst_type = if self.rng.gen_bool(self.config.fixed_burst_rate) {
            BurstType::Fixed
        } else {
            BurstType::Incr
        };
        AddressRequest::new(id, addr, burst_len).with_burst_type(burst_type)
    }
}
