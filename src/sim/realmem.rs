use std::collections::VecDeque;

use log::debug;

use crate::axi::{AddressRequest, ReadData, WriteData, WriteResponse};
use crate::sim::config::RealMemConfig;
use crate::timeq::{Cycle, ServiceRequest, TimedServer};

/// Stand-in for the real memory behind the model.
///
/// Responds as soon as its timed servers allow, far earlier than the simulated device would.
/// Read data carries the beat address and write responses carry the request address, so the
/// requester side can check what it gets back. Finished responses wait in one queue per
/// identifier and the lowest identifier with something ready goes first, so responses of
/// different identifiers come back out of acceptance order.
pub struct RealMemory {
    writes: TimedServer<WriteResponse>,
    // whole read bursts; their beats are queued together once the burst is served
    reads: TimedServer<AddressRequest>,
    // write addresses still waiting for (some of) their data
    waiting_data: VecDeque<AddressRequest>,
    // data beats that arrived before their address
    spare_wdata: u32,
    // requests refused by a full server, retried in order
    write_backlog: VecDeque<ServiceRequest<WriteResponse>>,
    read_backlog: VecDeque<ServiceRequest<AddressRequest>>,
    wresp_out: Vec<VecDeque<WriteResponse>>,
    rdata_out: Vec<VecDeque<ReadData>>,
}

impl RealMemory {
    pub fn new(config: &RealMemConfig, num_ids: usize) -> Self {
        Self {
            writes: TimedServer::new(config.server()),
            reads: TimedServer::new(config.server()),
            waiting_data: VecDeque::new(),
            spare_wdata: 0,
            write_backlog: VecDeque::new(),
            read_backlog: VecDeque::new(),
            wresp_out: (0..num_ids).map(|_| VecDeque::new()).collect(),
            rdata_out: (0..num_ids).map(|_| VecDeque::new()).collect(),
        }
    }

    pub fn accept_waddr(&mut self, now: Cycle, req: AddressRequest) {
        self.waiting_data.push_back(req);
        self.match_write_data(now);
    }

    pub fn accept_wdata(&mut self, now: Cycle, _data: WriteData) {
        self.spare_wdata += 1;
        self.match_write_data(now);
    }

    pub fn accept_raddr(&mut self, now: Cycle, req: AddressRequest) {
        let size = req.beat_bytes() * req.burst_len;
        self.read_backlog.push_back(ServiceRequest::new(req, size));
        Self::flush(&mut self.reads, &mut self.read_backlog, now);
    }

    /// Responses handed back this tick: at most one write response and one read beat.
    pub fn respond(&mut self, now: Cycle) -> (Option<WriteResponse>, Option<ReadData>) {
        Self::flush(&mut self.writes, &mut self.write_backlog, now);
        Self::flush(&mut self.reads, &mut self.read_backlog, now);
        let wresp_out = &mut self.wresp_out;
        self.writes.service_ready(now, |result| {
            queue_for(wresp_out, result.payload.id).push_back(result.payload)
        });
        let rdata_out = &mut self.rdata_out;
        self.reads.service_ready(now, |result| {
            let req = result.payload;
            debug!("realmem: read id {} addr {:#x} served", req.id, req.addr);
            let queue = queue_for(rdata_out, req.id);
            for beat in 0..req.burst_len {
                queue.push_back(ReadData {
                    id: req.id,
                    data: req.beat_addr(beat),
                    rsp: 0,
                    last: beat + 1 == req.burst_len,
                });
            }
        });
        (
            pop_lowest_id(&mut self.wresp_out),
            pop_lowest_id(&mut self.rdata_out),
        )
    }

    pub fn is_idle(&self) -> bool {
        self.waiting_data.is_empty()
            && self.write_backlog.is_empty()
            && self.read_backlog.is_empty()
            && self.writes.outstanding() == 0
            && self.reads.outstanding() == 0
            && self.wresp_out.iter().all(VecDeque::is_empty)
            && self.rdata_out.iter().all(VecDeque::is_empty)
    }

    pub fn reset(&mut self) {
        self.writes.reset();
        self.reads.reset();
        self.waiting_data.clear();
        self.spare_wdata = 0;
        self.write_backlog.clear();
        self.read_backlog.clear();
        self.wresp_out.iter_mut().for_each(VecDeque::clear);
        self.rdata_out.iter_mut().for_each(VecDeque::clear);
    }

    fn match_write_data(&mut self, now: Cycle) {
        while let Some(front) = self.waiting_data.front() {
            if self.spare_wdata < front.burst_len {
                break;
            }
            self.spare_wdata -= front.burst_len;
            let Some(req) = self.waiting_data.pop_front() else {
                break;
            };
            debug!("realmem: write id {} addr {:#x} complete", req.id, req.addr);
            let resp = WriteResponse {
                id: req.id,
                rsp: 0,
                content: req.addr,
            };
            let size = req.beat_bytes() * req.burst_len;
            self.write_backlog.push_back(ServiceRequest::new(resp, size));
        }
        Self::flush(&mut self.writes, &mut self.write_backlog, now);
    }

    fn flush<T>(server: &mut TimedServer<T>, backlog: &mut VecDeque<ServiceRequest<T>>, now: Cycle) {
        while let Some(request) = backlog.pop_front() {
            if let Err(bp) = server.try_enqueue(now, request) {
                backlog.push_front(bp.into_request());
                break;
            }
        }
    }
}

fn queue_for<T>(queues: &mut Vec<VecDeque<T>>, id: usize) -> &mut VecDeque<T> {
    if id >= queues.len() {
        queues.resize_with(id + 1, VecDeque::new);
    }
    &mut queues[id]
}

fn pop_lowest_id<T>(queues: &mut [VecDeque<T>]) -> Option<T> {
    queues.iter_mut().find_map(VecDeque::pop_front)
}
