use std::sync::Arc;

use log::info;

use crate::axi::{AddressRequest, ReadData, WriteData, WriteResponse};
use crate::bank::{Released, ResponseBank, ResponseBankConfig};
use crate::base::behavior::*;
use crate::delay::{DelayCalculator, DelayConfig};
use crate::sim::config::BankConfig;
use crate::sim::stats::TopStats;
use crate::timeq::Cycle;
use crate::types::{Iid, Reject, RequestKind};

pub struct SimmemTopConfig {
    pub bank: BankConfig,
    pub delay: DelayConfig,
}

/// Requests passed through to real memory and responses released to the requester in one tick.
#[derive(Debug, Default)]
pub struct TopOutputs {
    pub fwd_waddr: Option<AddressRequest>,
    pub fwd_raddr: Option<AddressRequest>,
    pub fwd_wdata: Option<WriteData>,
    pub wresp: Option<Released<WriteResponse>>,
    pub rdata: Option<Released<ReadData>>,
}

/// Both response banks and the delay calculator behind the requester / real-memory boundary.
///
/// Per tick, the caller offers requests and real-memory responses, sets the requester's
/// readiness, calls `tick_one` and collects the outputs.
pub struct SimmemTop {
    pub wbank: ResponseBank<WriteResponse>,
    pub rbank: ResponseBank<ReadData>,
    pub calc: DelayCalculator,
    outputs: TopOutputs,
    cycle: Cycle,
}

impl SimmemTop {
    pub fn new(config: Arc<SimmemTopConfig>) -> SimmemTop {
        config.bank.ensure_valid();
        let wbank = ResponseBank::new(Arc::new(ResponseBankConfig {
            kind: RequestKind::Write,
            capacity: config.bank.write_resp_capacity,
            num_ids: config.bank.num_ids,
            max_burst_len: 1,
        }));
        let rbank = ResponseBank::new(Arc::new(ResponseBankConfig {
            kind: RequestKind::Read,
            capacity: config.bank.read_data_capacity,
            num_ids: config.bank.num_ids,
            max_burst_len: config.bank.max_burst_len,
        }));
        let calc = DelayCalculator::new(
            Arc::new(config.delay),
            config.bank.write_resp_capacity,
            config.bank.read_data_capacity,
        );
        info!(
            "simmem: {} ids, {} write cells, {} read cells, {} ranks",
            config.bank.num_ids,
            config.bank.write_resp_capacity,
            config.bank.read_data_capacity,
            config.delay.num_ranks
        );
        SimmemTop {
            wbank,
            rbank,
            calc,
            outputs: TopOutputs::default(),
            cycle: 0,
        }
    }

    /// The iid the next accepted address request of `kind` would receive.
    pub fn next_iid(&self, kind: RequestKind) -> Option<Iid> {
        match kind {
            RequestKind::Write => self.wbank.next_iid(),
            RequestKind::Read => self.rbank.next_iid(),
        }
    }

    /// Offer an address request; accepted only if both a bank cell and a calculator slot are free.
    pub fn offer_addr(&mut self, kind: RequestKind, req: AddressRequest) -> Result<Iid, Reject> {
        let bank_free = match kind {
            RequestKind::Write => self.wbank.can_reserve(),
            RequestKind::Read => self.rbank.can_reserve(),
        };
        if !bank_free {
            match kind {
                RequestKind::Write => self.wbank.note_reject(),
                RequestKind::Read => self.rbank.note_reject(),
            }
            return Err(Reject::capacity(kind));
        }
        if !self.calc.can_accept(kind) {
            self.calc.note_reject();
            return Err(Reject::slot(kind));
        }
        let iid = match kind {
            RequestKind::Write => self.wbank.reserve(req.id, 1)?,
            RequestKind::Read => self.rbank.reserve(req.id, req.burst_len)?,
        };
        self.calc.accept_address_request(kind, iid, &req)?;
        match kind {
            RequestKind::Write => self.outputs.fwd_waddr = Some(req),
            RequestKind::Read => self.outputs.fwd_raddr = Some(req),
        }
        Ok(iid)
    }

    pub fn offer_waddr(&mut self, req: AddressRequest) -> Result<Iid, Reject> {
        self.offer_addr(RequestKind::Write, req)
    }

    pub fn offer_raddr(&mut self, req: AddressRequest) -> Result<Iid, Reject> {
        self.offer_addr(RequestKind::Read, req)
    }

    /// Write data is always accepted.
    pub fn offer_wdata(&mut self, data: WriteData) {
        self.calc.accept_write_data();
        self.outputs.fwd_wdata = Some(data);
    }

    pub fn deliver_wresp(&mut self, resp: WriteResponse) {
        self.wbank.acquire(resp);
    }

    pub fn deliver_rdata(&mut self, data: ReadData) {
        self.rbank.acquire(data);
    }

    /// Requester readiness for write responses and read data this tick.
    pub fn set_ready(&mut self, wresp_ready: bool, rdata_ready: bool) {
        self.wbank.set_out_ready(wresp_ready);
        self.rbank.set_out_ready(rdata_ready);
    }

    pub fn take_outputs(&mut self) -> TopOutputs {
        std::mem::take(&mut self.outputs)
    }

    pub fn now(&self) -> Cycle {
        self.cycle
    }

    pub fn is_idle(&self) -> bool {
        self.wbank.is_empty() && self.rbank.is_empty() && self.calc.is_idle()
    }

    pub fn stats(&self) -> TopStats {
        TopStats {
            write_bank: self.wbank.stats(),
            read_bank: self.rbank.stats(),
            calculator: self.calc.stats(),
        }
    }
}

impl ModuleBehaviors for SimmemTop {
    fn tick_one(&mut self) {
        // banks see the release-enable committed by the calculator last tick
        self.wbank.set_release_enable(self.calc.write_credits());
        self.rbank.set_release_enable(self.calc.read_credits());
        self.wbank.tick_one();
        self.rbank.tick_one();

        if let Some(resp) = self.wbank.take_released() {
            self.calc.notify_released(RequestKind::Write, resp.iid);
            self.outputs.wresp = Some(resp);
        }
        if let Some(data) = self.rbank.take_released() {
            self.calc.notify_released(RequestKind::Read, data.iid);
            self.outputs.rdata = Some(data);
        }
        self.calc.tick_one();
        self.cycle += 1;
    }

    fn reset(&mut self) {
        self.wbank.reset();
        self.rbank.reset();
        self.calc.reset();
        self.outputs = TopOutputs::default();
        self.cycle = 0;
    }
}
