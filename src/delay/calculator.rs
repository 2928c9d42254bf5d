use std::sync::Arc;

use log::debug;
use serde::Serialize;
use smallvec::SmallVec;

use crate::axi::AddressRequest;
use crate::base::behavior::ModuleBehaviors;
use crate::base::module::{module, IsModule, ModuleBase};
use crate::delay::age::{oldest, AgeClock};
use crate::delay::config::DelayConfig;
use crate::delay::rank::{CostCategory, EntryRef, RankState};
use crate::delay::slot::Slot;
use crate::types::{Iid, Reject, RequestKind};

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct CalcStats {
    pub row_hits: u64,
    pub row_closed: u64,
    pub row_conflicts: u64,
    pub entries_completed: u64,
    pub slots_retired: u64,
    pub slot_rejects: u64,
}

impl CalcStats {
    fn count(&mut self, category: CostCategory) {
        let counter = match category {
            CostCategory::Hit => &mut self.row_hits,
            CostCategory::Closed => &mut self.row_closed,
            CostCategory::Conflict => &mut self.row_conflicts,
        };
        *counter = counter.saturating_add(1);
    }
}

#[derive(Debug, Default)]
pub struct CalcState {
    wslots: Vec<Option<Slot>>,
    rslots: Vec<Option<Slot>>,
    ranks: Vec<RankState>,
    /// one flag per write iid: the write response may be released
    write_release: Vec<u32>,
    /// per read iid: number of beats that may be released
    read_release: Vec<u32>,
    // write-data beats that arrived before any address claimed them
    wdata_surplus: u32,
    ages: AgeClock,
    stats: CalcStats,
}

/// Outcome of one rank for the current tick, computed from the previous state.
#[derive(Debug)]
struct RankStep {
    next: RankState,
    started: Option<(EntryRef, CostCategory)>,
    completed: Option<EntryRef>,
}

/// FR-FCFS scheduler over a simulated row buffer, deciding when each response may be released.
pub struct DelayCalculator {
    base: ModuleBase<CalcState, DelayConfig>,
    pending_waddr: Option<(Iid, AddressRequest)>,
    pending_raddr: Option<(Iid, AddressRequest)>,
    pending_wdata: bool,
    write_pulses: SmallVec<[Iid; 2]>,
    read_pulses: SmallVec<[Iid; 2]>,
}

impl ModuleBehaviors for DelayCalculator {
    fn tick_one(&mut self) {
        let steps: SmallVec<[RankStep; 2]> =
            (0..self.state().ranks.len()).map(|r| self.step_rank(r)).collect();
        for (rank, step) in steps.into_iter().enumerate() {
            self.apply_step(rank, step);
        }
        self.apply_release_pulses();
        if std::mem::take(&mut self.pending_wdata) {
            self.attribute_write_data();
        }
        if let Some((iid, req)) = self.pending_waddr.take() {
            self.allocate(RequestKind::Write, iid, req);
        }
        if let Some((iid, req)) = self.pending_raddr.take() {
            self.allocate(RequestKind::Read, iid, req);
        }
        self.base.advance();
    }

    fn reset(&mut self) {
        let write_iids = self.state().write_release.len();
        let read_iids = self.state().read_release.len();
        self.base.state = CalcState::new(&self.base.config, write_iids, read_iids);
        self.base.cycle = 0;
        self.pending_waddr = None;
        self.pending_raddr = None;
        self.pending_wdata = false;
        self.write_pulses.clear();
        self.read_pulses.clear();
    }
}

module!(DelayCalculator, CalcState, DelayConfig,);

impl CalcState {
    fn new(config: &DelayConfig, write_iids: usize, read_iids: usize) -> Self {
        Self {
            wslots: vec![None; config.num_write_slots],
            rslots: vec![None; config.num_read_slots],
            ranks: vec![RankState::default(); config.num_ranks],
            write_release: vec![0; write_iids],
            read_release: vec![0; read_iids],
            ..Self::default()
        }
    }

    fn slots(&self, kind: RequestKind) -> &Vec<Option<Slot>> {
        match kind {
            RequestKind::Write => &self.wslots,
            RequestKind::Read => &self.rslots,
        }
    }

    fn slots_mut(&mut self, kind: RequestKind) -> &mut Vec<Option<Slot>> {
        match kind {
            RequestKind::Write => &mut self.wslots,
            RequestKind::Read => &mut self.rslots,
        }
    }

    fn slot_mut(&mut self, entry: EntryRef) -> &mut Slot {
        match self.slots_mut(entry.kind)[entry.slot].as_mut() {
            Some(slot) => slot,
            None => panic!("{:?} refers to a free slot", entry),
        }
    }
}

impl DelayCalculator {
    /// `write_iids` / `read_iids` are the capacities of the matching response banks.
    pub fn new(config: Arc<DelayConfig>, write_iids: usize, read_iids: usize) -> Self {
        config.ensure_valid();
        let state = CalcState::new(&config, write_iids, read_iids);
        Self {
            base: ModuleBase::with_state(state, config),
            pending_waddr: None,
            pending_raddr: None,
            pending_wdata: false,
            write_pulses: SmallVec::new(),
            read_pulses: SmallVec::new(),
        }
    }

    /// A free slot of `kind` exists and none was claimed this tick.
    pub fn can_accept(&self, kind: RequestKind) -> bool {
        let pending = match kind {
            RequestKind::Write => self.pending_waddr.is_some(),
            RequestKind::Read => self.pending_raddr.is_some(),
        };
        !pending && self.state().slots(kind).iter().any(Option::is_none)
    }

    pub fn note_reject(&mut self) {
        self.base.state.stats.slot_rejects += 1;
    }

    /// Record the metadata of an accepted address request under the iid its bank reserved.
    pub fn accept_address_request(
        &mut self,
        kind: RequestKind,
        iid: Iid,
        req: &AddressRequest,
    ) -> Result<Iid, Reject> {
        if !self.can_accept(kind) {
            self.note_reject();
            return Err(Reject::slot(kind));
        }
        assert!(req.burst_len >= 1 && req.burst_len <= 64, "burst length {} out of range", req.burst_len);
        let staged = Some((iid, req.clone()));
        match kind {
            RequestKind::Write => self.pending_waddr = staged,
            RequestKind::Read => self.pending_raddr = staged,
        }
        Ok(iid)
    }

    /// One write-data beat crossed the boundary this tick.
    pub fn accept_write_data(&mut self) {
        assert!(!self.pending_wdata, "only one write-data beat per tick");
        self.pending_wdata = true;
    }

    /// Release acknowledgement from a response bank.
    pub fn notify_released(&mut self, kind: RequestKind, iid: Iid) {
        match kind {
            RequestKind::Write => self.write_pulses.push(iid),
            RequestKind::Read => self.read_pulses.push(iid),
        }
    }

    /// Release-enable per write iid.
    pub fn write_credits(&self) -> &[u32] {
        &self.state().write_release
    }

    /// Releasable beats per read iid.
    pub fn read_credits(&self) -> &[u32] {
        &self.state().read_release
    }

    pub fn credits(&self, kind: RequestKind) -> &[u32] {
        match kind {
            RequestKind::Write => self.write_credits(),
            RequestKind::Read => self.read_credits(),
        }
    }

    pub fn slot_of(&self, kind: RequestKind, iid: Iid) -> Option<&Slot> {
        self.state()
            .slots(kind)
            .iter()
            .flatten()
            .find(|slot| slot.iid == iid)
    }

    pub fn rank(&self, rank: usize) -> &RankState {
        &self.state().ranks[rank]
    }

    pub fn wdata_surplus(&self) -> u32 {
        self.state().wdata_surplus
    }

    pub fn outstanding(&self, kind: RequestKind) -> usize {
        self.state().slots(kind).iter().flatten().count()
    }

    pub fn is_idle(&self) -> bool {
        let state = self.state();
        state.wslots.iter().chain(&state.rslots).all(Option::is_none)
            && state.ranks.iter().all(|r| !r.is_busy())
            && state.write_release.iter().chain(&state.read_release).all(|c| *c == 0)
    }

    pub fn stats(&self) -> CalcStats {
        self.state().stats
    }

    fn step_rank(&self, rank_id: usize) -> RankStep {
        let mut next = self.state().ranks[rank_id].clone();
        let mut started = None;
        if next.delay_cnt > 0 {
            next.delay_cnt -= 1;
        } else if let Some((entry, category, row)) = self.pick(rank_id, &next) {
            next.delay_cnt = self.conf().latency(category);
            next.open(row);
            next.inflight = Some(entry);
            started = Some((entry, category));
        }
        // completion is signalled early to cover the release path
        let completed = if next.delay_cnt == DelayConfig::MIN_LATENCY {
            next.inflight.take()
        } else {
            None
        };
        RankStep {
            next,
            started,
            completed,
        }
    }

    /// Cheapest ready entry of the rank, oldest first within a cost category.
    fn pick(&self, rank_id: usize, rank: &RankState) -> Option<(EntryRef, CostCategory, u64)> {
        let state = self.state();
        let config = self.conf();
        [RequestKind::Write, RequestKind::Read]
            .into_iter()
            .flat_map(move |kind| {
                state
                    .slots(kind)
                    .iter()
                    .enumerate()
                    .filter_map(|(i, s)| s.as_ref().map(|s| (i, s)))
                    .filter(move |(_, slot)| slot.rank == rank_id)
                    .flat_map(move |(i, slot)| {
                        slot.ready_entries().map(move |beat| {
                            let row = config.row_of(slot.req.beat_addr(beat));
                            let entry = EntryRef { kind, slot: i, beat };
                            (rank.category(row), slot.entry_age(beat), entry, row)
                        })
                    })
            })
            .min()
            .map(|(category, _, entry, row)| (entry, category, row))
    }

    fn apply_step(&mut self, rank_id: usize, step: RankStep) {
        let state = &mut self.base.state;
        state.ranks[rank_id] = step.next;

        if let Some((entry, category)) = step.started {
            let slot = state.slot_mut(entry);
            slot.start(entry.beat);
            debug!(
                "rank {}: start {} iid {} beat {} ({:?})",
                rank_id,
                entry.kind.short(),
                slot.iid,
                entry.beat,
                category
            );
            state.stats.count(category);
        }

        let Some(entry) = step.completed else {
            return;
        };
        let slot = state.slot_mut(entry);
        slot.complete(entry.beat);
        let iid = slot.iid;
        let all_done = slot.all_done();
        debug!(
            "rank {}: complete {} iid {} beat {}",
            rank_id,
            entry.kind.short(),
            iid,
            entry.beat
        );
        state.stats.entries_completed += 1;

        match entry.kind {
            RequestKind::Read => state.read_release[iid] += 1,
            RequestKind::Write if all_done => {
                assert_eq!(0, state.write_release[iid], "write iid {} released twice", iid);
                state.write_release[iid] = 1;
            }
            RequestKind::Write => {}
        }
        if all_done {
            state.slots_mut(entry.kind)[entry.slot] = None;
            state.stats.slots_retired += 1;
        }
    }

    fn apply_release_pulses(&mut self) {
        let state = &mut self.base.state;
        for iid in self.write_pulses.drain(..) {
            assert_eq!(
                1, state.write_release[iid],
                "release pulse for write iid {} without credit",
                iid
            );
            state.write_release[iid] = 0;
        }
        for iid in self.read_pulses.drain(..) {
            assert!(
                state.read_release[iid] > 0,
                "release pulse for read iid {} without credit",
                iid
            );
            state.read_release[iid] -= 1;
        }
    }

    /// Write data follows address order, so a beat belongs to the oldest slot still missing data.
    fn attribute_write_data(&mut self) {
        let state = &mut self.base.state;
        let age = state.ages.stamp();
        let target = oldest(
            state
                .wslots
                .iter()
                .enumerate()
                .filter_map(|(i, s)| s.as_ref().filter(|s| s.missing_data()).map(|s| (s.alloc_age, i))),
        );
        match target {
            Some(i) => {
                if let Some(slot) = state.wslots[i].as_mut() {
                    let beat = slot.attribute_data(age);
                    debug!("write data beat {} attributed to iid {}", beat, slot.iid);
                }
            }
            None => state.wdata_surplus += 1,
        }
    }

    fn allocate(&mut self, kind: RequestKind, iid: Iid, req: AddressRequest) {
        let rank = self.conf().rank_of(req.addr);
        let state = &mut self.base.state;
        let age = state.ages.stamp();
        let slot = match kind {
            RequestKind::Write => {
                let immediate = state.wdata_surplus.min(req.burst_len);
                state.wdata_surplus -= immediate;
                debug!(
                    "w slot for iid {}: {} of {} data beats already present",
                    iid, immediate, req.burst_len
                );
                Slot::new_write(iid, req, rank, immediate, age)
            }
            RequestKind::Read => Slot::new_read(iid, req, rank, age),
        };
        let slots = state.slots_mut(kind);
        match slots.iter().position(Option::is_none) {
            Some(free) => slots[free] = Some(slot),
            None => panic!("{} slot allocated without a free slot", kind.short()),
        }
    }
}
