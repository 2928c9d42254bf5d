use std::collections::VecDeque;

use log::warn;
use serde::Serialize;

use crate::axi::{AddressRequest, ReadData, WriteResponse};
use crate::bank::{BankStats, Released};
use crate::delay::CalcStats;
use crate::timeq::Cycle;
use crate::types::{AxiId, RequestKind};

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct TopStats {
    pub write_bank: BankStats,
    pub read_bank: BankStats,
    pub calculator: CalcStats,
}

/// Acceptance-to-final-release delays of one request kind.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct DelaySummary {
    pub completed: u64,
    pub min: Option<Cycle>,
    pub max: Option<Cycle>,
    pub mean: f64,
    #[serde(skip)]
    total: u64,
}

impl DelaySummary {
    pub fn record(&mut self, delay: Cycle) {
        self.completed += 1;
        self.total = self.total.saturating_add(delay);
        self.min = Some(self.min.map_or(delay, |m| m.min(delay)));
        self.max = Some(self.max.map_or(delay, |m| m.max(delay)));
        self.mean = self.total as f64 / self.completed as f64;
    }
}

#[derive(Debug, Clone)]
struct Outstanding {
    req: AddressRequest,
    accepted_at: Cycle,
    next_beat: u32,
}

/// Pairs accepted address requests with their releases, per identifier and kind.
///
/// Releases are checked against the oldest outstanding request of their identifier: the payload
/// must be the one real memory produced for that request, and the release must come at least
/// `min_delay` ticks after acceptance.
#[derive(Debug)]
pub struct DelayTracker {
    writes: Vec<VecDeque<Outstanding>>,
    reads: Vec<VecDeque<Outstanding>>,
    min_delay: Cycle,
    pub write_delays: DelaySummary,
    pub read_delays: DelaySummary,
    /// releases whose payload does not belong to the oldest request of the identifier
    pub order_violations: u64,
    /// releases earlier than `min_delay`
    pub delay_violations: u64,
    /// releases with no outstanding request at all
    pub unmatched: u64,
}

impl DelayTracker {
    pub fn new(num_ids: usize, min_delay: Cycle) -> Self {
        Self {
            writes: vec![VecDeque::new(); num_ids],
            reads: vec![VecDeque::new(); num_ids],
            min_delay,
            write_delays: DelaySummary::default(),
            read_delays: DelaySummary::default(),
            order_violations: 0,
            delay_violations: 0,
            unmatched: 0,
        }
    }

    pub fn accepted(&mut self, kind: RequestKind, req: &AddressRequest, now: Cycle) {
        let queue = match kind {
            RequestKind::Write => &mut self.writes[req.id],
            RequestKind::Read => &mut self.reads[req.id],
        };
        queue.push_back(Outstanding {
            req: req.clone(),
            accepted_at: now,
            next_beat: 0,
        });
    }

    pub fn write_released(&mut self, resp: &Released<WriteResponse>, now: Cycle) {
        let Some(head) = self.writes[resp.id].pop_front() else {
            warn!("write response for id {} without outstanding request", resp.id);
            self.unmatched += 1;
            return;
        };
        if head.req.addr != resp.payload.content {
            warn!(
                "id {}: write response for {:#x} released while {:#x} is oldest",
                resp.id, resp.payload.content, head.req.addr
            );
            self.order_violations += 1;
        }
        let delay = now - head.accepted_at;
        self.check_delay(RequestKind::Write, resp.id, delay);
        self.write_delays.record(delay);
    }

    pub fn read_released(&mut self, data: &Released<ReadData>, now: Cycle) {
        let Some(head) = self.reads[data.id].front_mut() else {
            warn!("read data for id {} without outstanding request", data.id);
            self.unmatched += 1;
            return;
        };
        let beat = head.next_beat;
        if head.req.beat_addr(beat) != data.payload.data || data.offset != beat {
            warn!(
                "id {}: read beat {:#x} (offset {}) released, expected beat {} of {:#x}",
                data.id, data.payload.data, data.offset, beat, head.req.addr
            );
            self.order_violations += 1;
        }
        head.next_beat += 1;
        if head.next_beat < head.req.burst_len {
            return;
        }
        let delay = now - head.accepted_at;
        self.reads[data.id].pop_front();
        self.check_delay(RequestKind::Read, data.id, delay);
        self.read_delays.record(delay);
    }

    /// Requests accepted but not completely released yet.
    pub fn outstanding(&self) -> usize {
        self.writes.iter().chain(&self.reads).map(VecDeque::len).sum()
    }

    fn check_delay(&mut self, kind: RequestKind, id: AxiId, delay: Cycle) {
        if delay < self.min_delay {
            warn!("{} id {}: released after only {} ticks", kind.short(), id, delay);
            self.delay_violations += 1;
        }
    }
}

/// Summary of one simulation run.
#[derive(Debug, Clone, Serialize)]
pub struct SimReport {
    pub cycles: Cycle,
    pub writes_accepted: u64,
    pub reads_accepted: u64,
    pub write_delays: DelaySummary,
    pub read_delays: DelaySummary,
    pub order_violations: u64,
    pub delay_violations: u64,
    pub unmatched_releases: u64,
    pub outstanding: usize,
    pub stats: TopStats,
}

impl SimReport {
    pub fn is_clean(&self) -> bool {
        self.order_violations == 0 && self.delay_violations == 0 && self.unmatched_releases == 0
    }
}
