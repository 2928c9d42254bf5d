use std::sync::Arc;

use crate::axi::{AddressRequest, BurstType, ReadData, WriteData, WriteResponse};
use crate::bank::Released;
use crate::base::behavior::ModuleBehaviors;
use crate::delay::DelayConfig;
use crate::sim::config::{BankConfig, RealMemConfig, SimConfig, SimmemConfig};
use crate::sim::harness::Simulation;
use crate::sim::realmem::RealMemory;
use crate::sim::top::{SimmemTop, SimmemTopConfig};
use crate::timeq::Cycle;
use crate::traffic::TrafficConfig;
use crate::types::{AxiId, Iid, Reject, RejectReason, RequestKind};

/// Model plus a fast real memory, driven by hand one tick at a time.
struct Bench {
    top: SimmemTop,
    mem: RealMemory,
    now: Cycle,
    wresps: Vec<(Cycle, Released<WriteResponse>)>,
    rdata: Vec<(Cycle, Released<ReadData>)>,
    // identifiers of read beats in the order real memory returned them
    rdata_in: Vec<AxiId>,
}

impl Bench {
    fn new(bank: BankConfig, delay: DelayConfig) -> Self {
        let realmem = RealMemConfig {
            base_latency: 0,
            bytes_per_cycle: 8,
            queue_capacity: 16,
        };
        Self::with_memory(bank, delay, &realmem)
    }

    fn with_memory(bank: BankConfig, delay: DelayConfig, realmem: &RealMemConfig) -> Self {
        let mem = RealMemory::new(realmem, bank.num_ids);
        Self {
            top: SimmemTop::new(Arc::new(SimmemTopConfig { bank, delay })),
            mem,
            now: 0,
            wresps: Vec::new(),
            rdata: Vec::new(),
            rdata_in: Vec::new(),
        }
    }

    fn tick(
        &mut self,
        waddr: Option<AddressRequest>,
        raddr: Option<AddressRequest>,
        wdata: Option<WriteData>,
    ) -> (Option<Result<Iid, Reject>>, Option<Result<Iid, Reject>>) {
        let (wresp, rdata) = self.mem.respond(self.now);
        if let Some(resp) = wresp {
            self.top.deliver_wresp(resp);
        }
        if let Some(data) = rdata {
            self.rdata_in.push(data.id);
            self.top.deliver_rdata(data);
        }
        let waccept = waddr.map(|req| self.top.offer_waddr(req));
        let raccept = raddr.map(|req| self.top.offer_raddr(req));
        if let Some(data) = wdata {
            self.top.offer_wdata(data);
        }
        self.top.set_ready(true, true);
        self.top.tick_one();

        let out = self.top.take_outputs();
        if let Some(req) = out.fwd_waddr {
            self.mem.accept_waddr(self.now, req);
        }
        if let Some(req) = out.fwd_raddr {
            self.mem.accept_raddr(self.now, req);
        }
        if let Some(data) = out.fwd_wdata {
            self.mem.accept_wdata(self.now, data);
        }
        if let Some(resp) = out.wresp {
            self.wresps.push((self.now, resp));
        }
        if let Some(data) = out.rdata {
            self.rdata.push((self.now, data));
        }
        self.now += 1;
        (waccept, raccept)
    }

    fn idle(&mut self, ticks: usize) {
        for _ in 0..ticks {
            self.tick(None, None, None);
        }
    }
}

fn beat(id: usize) -> Option<WriteData> {
    Some(WriteData {
        id,
        data: 0,
        strb: 0xf,
        last: false,
    })
}

#[test]
fn write_bursts_of_one_id_release_in_acceptance_order() {
    let mut bench = Bench::new(BankConfig::default(), DelayConfig::default());
    let (w, _) = bench.tick(Some(AddressRequest::new(1, 5, 2)), None, None);
    assert!(matches!(w, Some(Ok(_))));
    let (w, _) = bench.tick(Some(AddressRequest::new(1, 8, 1)), None, beat(1));
    assert!(matches!(w, Some(Ok(_))));
    bench.tick(None, None, beat(1));
    bench.tick(None, None, beat(1));
    bench.idle(80);

    let released: Vec<(usize, u64)> = bench
        .wresps
        .iter()
        .map(|(_, r)| (r.id, r.payload.content))
        .collect();
    assert_eq!(vec![(1, 5), (1, 8)], released);
    assert!(bench.top.is_idle());
}

#[test]
fn single_cell_refuses_second_reservation_until_release() {
    let bank = BankConfig {
        write_resp_capacity: 1,
        ..BankConfig::default()
    };
    let mut bench = Bench::new(bank, DelayConfig::default());
    let (first, _) = bench.tick(Some(AddressRequest::new(0, 0x10, 1)), None, beat(0));
    assert_eq!(Some(Ok(0)), first);

    let second = AddressRequest::new(0, 0x20, 1);
    let (refused, _) = bench.tick(Some(second.clone()), None, None);
    assert_eq!(
        Some(Err(Reject::new(RequestKind::Write, RejectReason::CapacityExhausted))),
        refused
    );
    let stats = bench.top.stats();
    assert_eq!(1, stats.write_bank.capacity_rejects());
    assert_eq!(0, stats.calculator.slot_rejects);
    assert_eq!(1, bench.top.calc.outstanding(RequestKind::Write));

    let mut accepted_at = None;
    for _ in 0..80 {
        let now = bench.now;
        if let (Some(Ok(_)), _) = bench.tick(Some(second.clone()), None, None) {
            accepted_at = Some(now);
            break;
        }
    }
    let accepted_at = accepted_at.expect("second request never accepted");
    let (released_at, first_resp) = &bench.wresps[0];
    assert_eq!(0x10, first_resp.payload.content);
    assert!(accepted_at > *released_at);
}

#[test]
fn slot_shortage_refuses_without_reserving() {
    let delay = DelayConfig {
        num_read_slots: 1,
        ..DelayConfig::default()
    };
    let mut bench = Bench::new(BankConfig::default(), delay);
    let (_, first) = bench.tick(None, Some(AddressRequest::new(0, 0, 2)), None);
    assert_eq!(Some(Ok(0)), first);
    let (_, second) = bench.tick(None, Some(AddressRequest::new(1, 0, 2)), None);
    assert_eq!(Some(Err(Reject::slot(RequestKind::Read))), second);
    let stats = bench.top.stats();
    assert_eq!(1, stats.calculator.slot_rejects);
    assert_eq!(0, stats.read_bank.capacity_rejects());
    assert_eq!(1, bench.top.rbank.occupancy());
    assert_eq!(Some(1), bench.top.next_iid(RequestKind::Read));
}

#[test]
fn read_burst_releases_progressively() {
    let mut bench = Bench::new(BankConfig::default(), DelayConfig::default());
    let accepted_at = bench.now;
    let (_, r) = bench.tick(None, Some(AddressRequest::new(2, 0x100, 4)), None);
    assert!(matches!(r, Some(Ok(_))));
    bench.idle(80);

    assert_eq!(4, bench.rdata.len());
    let offsets: Vec<u32> = bench.rdata.iter().map(|(_, r)| r.offset).collect();
    assert_eq!(vec![0, 1, 2, 3], offsets);
    assert!(bench.rdata.iter().all(|(_, r)| r.id == 2));
    assert!(bench.rdata[3].1.last);

    let times: Vec<Cycle> = bench.rdata.iter().map(|(t, _)| *t).collect();
    assert!(times[0] - accepted_at >= 3);
    let gaps: Vec<Cycle> = times.windows(2).map(|w| w[1] - w[0]).collect();
    assert!(gaps.windows(2).all(|g| g[0] <= g[1]), "gaps {:?}", gaps);
}

#[test]
fn early_write_data_is_credited_to_its_address() {
    let mut bench = Bench::new(BankConfig::default(), DelayConfig::default());
    bench.tick(None, None, beat(3));
    bench.tick(None, None, beat(3));
    assert_eq!(2, bench.top.calc.wdata_surplus());

    let (w, _) = bench.tick(Some(AddressRequest::new(3, 0x40, 2)), None, None);
    let Some(Ok(iid)) = w else {
        panic!("write address refused: {:?}", w);
    };
    let slot = bench.top.calc.slot_of(RequestKind::Write, iid).unwrap();
    assert!(!slot.missing_data());
    assert_eq!(0, bench.top.calc.wdata_surplus());

    // scheduled on the very next tick
    bench.tick(None, None, None);
    assert_eq!(1, bench.top.calc.stats().row_closed);

    bench.idle(60);
    assert_eq!(1, bench.wresps.len());
    assert_eq!(3, bench.wresps[0].1.id);
}

#[test]
fn slow_identifier_does_not_hold_back_another() {
    let config = SimmemTopConfig {
        bank: BankConfig::default(),
        delay: DelayConfig::default(),
    };
    let mut top = SimmemTop::new(Arc::new(config));
    top.set_ready(true, true);
    top.offer_raddr(AddressRequest::new(0, 0x0, 1)).unwrap();
    top.tick_one();
    top.offer_raddr(AddressRequest::new(1, 0x10, 1)).unwrap();
    top.tick_one();
    // only identifier 1 gets its data from real memory
    top.deliver_rdata(ReadData {
        id: 1,
        data: 0x10,
        rsp: 0,
        last: true,
    });
    let mut released = Vec::new();
    for _ in 0..60 {
        top.tick_one();
        released.extend(top.take_outputs().rdata);
    }
    assert_eq!(1, released.len());
    assert_eq!(1, released[0].id);

    top.deliver_rdata(ReadData {
        id: 0,
        data: 0x0,
        rsp: 0,
        last: true,
    });
    for _ in 0..5 {
        top.tick_one();
        released.extend(top.take_outputs().rdata);
    }
    assert_eq!(2, released.len());
    assert_eq!(0, released[1].id);
}

#[test]
fn reordered_memory_responses_release_per_identifier_order() {
    let realmem = RealMemConfig {
        base_latency: 6,
        bytes_per_cycle: 4,
        queue_capacity: 16,
    };
    let mut bench = Bench::with_memory(BankConfig::default(), DelayConfig::default(), &realmem);
    bench.tick(None, Some(AddressRequest::new(1, 0x100, 4)), None);
    bench.tick(None, Some(AddressRequest::new(0, 0x200, 1)), None);
    bench.idle(120);

    // id 0 was accepted last but real memory hands it back mid-burst
    assert_eq!(vec![1, 0, 1, 1, 1], bench.rdata_in);

    let of_id = |id: AxiId| -> Vec<u64> {
        bench
            .rdata
            .iter()
            .filter(|(_, r)| r.id == id)
            .map(|(_, r)| r.payload.data)
            .collect()
    };
    assert_eq!(vec![0x100, 0x104, 0x108, 0x10c], of_id(1));
    assert_eq!(vec![0x200], of_id(0));
    assert!(bench.top.is_idle());
    assert!(bench.mem.is_idle());
}

#[test]
fn requester_stall_delays_but_keeps_order() {
    let mut top = SimmemTop::new(Arc::new(SimmemTopConfig {
        bank: BankConfig::default(),
        delay: DelayConfig::default(),
    }));
    top.set_ready(false, false);
    top.offer_raddr(AddressRequest::new(0, 0x0, 2)).unwrap();
    top.tick_one();
    for beat in 0..2u64 {
        top.deliver_rdata(ReadData {
            id: 0,
            data: beat * 4,
            rsp: 0,
            last: beat == 1,
        });
        top.tick_one();
    }
    for _ in 0..40 {
        top.tick_one();
        assert!(top.take_outputs().rdata.is_none());
    }
    top.set_ready(false, true);
    let mut released = Vec::new();
    for _ in 0..5 {
        top.tick_one();
        released.extend(top.take_outputs().rdata);
    }
    let data: Vec<u64> = released.iter().map(|r| r.payload.data).collect();
    assert_eq!(vec![0, 4], data);
}

fn random_config(seed: u64) -> SimmemConfig {
    SimmemConfig {
        sim: SimConfig {
            cycles: 1_500,
            drain_cycles: 6_000,
            ..SimConfig::default()
        },
        bank: BankConfig {
            num_ids: 3,
            write_resp_capacity: 6,
            read_data_capacity: 4,
            max_burst_len: 8,
        },
        delay: DelayConfig {
            num_write_slots: 3,
            num_read_slots: 2,
            ..DelayConfig::default()
        },
        realmem: RealMemConfig::default(),
        traffic: TrafficConfig {
            seed,
            ..TrafficConfig::default()
        },
    }
}

fn assert_run_is_clean(config: SimmemConfig) {
    let mut sim = Simulation::new(config);
    let report = sim.run();
    assert!(report.is_clean(), "{:?}", report);
    assert_eq!(0, report.outstanding, "{:?}", report);
    assert_eq!(report.writes_accepted, report.write_delays.completed);
    assert_eq!(report.reads_accepted, report.read_delays.completed);
    assert!(report.writes_accepted > 0 && report.reads_accepted > 0);
    assert!(report.write_delays.min.unwrap() >= 3);
    assert!(report.read_delays.min.unwrap() >= 3);
    assert!(sim.is_quiescent());
}

#[test]
fn random_traffic_keeps_order_and_loses_nothing() {
    for seed in [1, 2, 3] {
        assert_run_is_clean(random_config(seed));
    }
}

#[test]
fn random_traffic_with_fixed_bursts_and_two_ranks() {
    let mut config = random_config(11);
    config.delay.num_ranks = 2;
    config.delay.rank_shift = 8;
    config.traffic.fixed_burst_rate = 0.3;
    config.traffic.max_burst_len = 8;
    assert_run_is_clean(config);
}

#[test]
fn random_traffic_with_minimum_latencies_and_slow_requester() {
    let mut config = random_config(5);
    config.delay.row_hit_latency = 3;
    config.delay.row_closed_latency = 3;
    config.delay.row_conflict_latency = 3;
    config.traffic.issue.wresp_ready_rate = 0.3;
    config.traffic.issue.rdata_ready_rate = 0.3;
    assert_run_is_clean(config);
}

#[test]
fn reset_restarts_the_same_run() {
    let mut sim = Simulation::new(random_config(9));
    let first = sim.run();
    sim.reset();
    assert_eq!(0, sim.now());
    let second = sim.run();
    assert_eq!(first.cycles, second.cycles);
    assert_eq!(first.writes_accepted, second.writes_accepted);
    assert_eq!(first.read_delays.max, second.read_delays.max);
}

#[test]
fn refused_requests_are_counted() {
    let mut config = random_config(4);
    config.traffic.issue.waddr_rate = 1.0;
    config.traffic.issue.raddr_rate = 1.0;
    let mut sim = Simulation::new(config);
    let report = sim.run();
    let stats = report.stats;
    let refused = stats.write_bank.capacity_rejects()
        + stats.read_bank.capacity_rejects()
        + stats.calculator.slot_rejects;
    assert!(refused > 0);
    assert!(report.is_clean());
}

#[test]
fn wrap_burst_beats_come_back_in_wrap_order() {
    let mut bench = Bench::new(BankConfig::default(), DelayConfig::default());
    let req = AddressRequest::new(0, 0x38, 4)
        .with_burst_size(3)
        .with_burst_type(BurstType::Wrap);
    bench.tick(None, Some(req.clone()), None);
    bench.idle(80);
    let data: Vec<u64> = bench.rdata.iter().map(|(_, r)| r.payload.data).collect();
    assert_eq!(vec![0x38, 0x20, 0x28, 0x30], data);
}
