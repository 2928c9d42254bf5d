use std::sync::Arc;

use log::info;

use crate::base::behavior::ModuleBehaviors;
use crate::delay::DelayConfig;
use crate::sim::config::SimmemConfig;
use crate::sim::realmem::RealMemory;
use crate::sim::stats::{DelayTracker, SimReport};
use crate::sim::top::{SimmemTop, SimmemTopConfig};
use crate::timeq::Cycle;
use crate::traffic::TrafficGenerator;
use crate::types::RequestKind;

/// Traffic generator, model and real memory wired together, with every release checked.
pub struct Simulation {
    config: SimmemConfig,
    pub top: SimmemTop,
    pub mem: RealMemory,
    pub traffic: TrafficGenerator,
    pub tracker: DelayTracker,
    cycle: Cycle,
}

impl Simulation {
    pub fn new(config: SimmemConfig) -> Self {
        config.ensure_valid();
        let top = SimmemTop::new(Arc::new(SimmemTopConfig {
            bank: config.bank,
            delay: config.delay,
        }));
        let mem = RealMemory::new(&config.realmem, config.bank.num_ids);
        let traffic = TrafficGenerator::new(config.traffic.clone(), config.bank.num_ids);
        let tracker = DelayTracker::new(config.bank.num_ids, DelayConfig::MIN_LATENCY as Cycle);
        Self {
            config,
            top,
            mem,
            traffic,
            tracker,
            cycle: 0,
        }
    }

    pub fn now(&self) -> Cycle {
        self.cycle
    }

    /// Run one tick; with `issuing` unset the requester only finishes what it already started.
    pub fn step(&mut self, issuing: bool) {
        let now = self.cycle;
        let (wresp, rdata) = self.mem.respond(now);
        if let Some(resp) = wresp {
            self.top.deliver_wresp(resp);
        }
        if let Some(data) = rdata {
            self.top.deliver_rdata(data);
        }

        let offer = self.traffic.offer(issuing);
        let mut waddr_taken = false;
        let mut raddr_taken = false;
        if let Some(req) = &offer.waddr {
            if self.top.offer_waddr(req.clone()).is_ok() {
                self.tracker.accepted(RequestKind::Write, req, now);
                waddr_taken = true;
            }
        }
        if let Some(req) = &offer.raddr {
            if self.top.offer_raddr(req.clone()).is_ok() {
                self.tracker.accepted(RequestKind::Read, req, now);
                raddr_taken = true;
            }
        }
        let wdata_taken = offer.wdata.is_some();
        if let Some(data) = offer.wdata {
            self.top.offer_wdata(data);
        }
        self.top.set_ready(offer.wresp_ready, offer.rdata_ready);
        self.traffic.handshake(waddr_taken, raddr_taken, wdata_taken);

        self.top.tick_one();

        let out = self.top.take_outputs();
        if let Some(req) = out.fwd_waddr {
            self.mem.accept_waddr(now, req);
        }
        if let Some(req) = out.fwd_raddr {
            self.mem.accept_raddr(now, req);
        }
        if let Some(data) = out.fwd_wdata {
            self.mem.accept_wdata(now, data);
        }
        if let Some(resp) = &out.wresp {
            self.tracker.write_released(resp, now);
        }
        if let Some(data) = &out.rdata {
            self.tracker.read_released(data, now);
        }
        self.cycle += 1;
    }

    /// Everything issued has been released and every component is empty.
    pub fn is_quiescent(&self) -> bool {
        self.traffic.is_drained()
            && self.tracker.outstanding() == 0
            && self.mem.is_idle()
            && self.top.is_idle()
    }

    /// Issue traffic for `[sim].cycles` ticks, then drain for up to `[sim].drain_cycles`.
    pub fn run(&mut self) -> SimReport {
        let cycles = self.config.sim.cycles;
        let drain = self.config.sim.drain_cycles;
        info!("running {} cycles of traffic, up to {} drain cycles", cycles, drain);
        for _ in 0..cycles {
            self.step(true);
        }
        for _ in 0..drain {
            if self.is_quiescent() {
                break;
            }
            self.step(false);
        }
        let report = self.report();
        info!(
            "done at cycle {}: {} writes, {} reads completed, {} outstanding",
            report.cycles,
            report.write_delays.completed,
            report.read_delays.completed,
            report.outstanding
        );
        report
    }

    pub fn report(&self) -> SimReport {
        let (writes_accepted, reads_accepted) = self.traffic.issued();
        SimReport {
            cycles: self.cycle,
            writes_accepted,
            reads_accepted,
            write_delays: self.tracker.write_delays,
            read_delays: self.tracker.read_delays,
            order_violations: self.tracker.order_violations,
            delay_violations: self.tracker.delay_violations,
            unmatched_releases: self.tracker.unmatched,
            outstanding: self.tracker.outstanding(),
            stats: self.top.stats(),
        }
    }

    pub fn reset(&mut self) {
        self.top.reset();
        self.mem.reset();
        self.traffic = TrafficGenerator::new(self.config.traffic.clone(), self.config.bank.num_ids);
        self.tracker = DelayTracker::new(self.config.bank.num_ids, DelayConfig::MIN_LATENCY as Cycle);
        self.cycle = 0;
    }
}
