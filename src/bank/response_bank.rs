use std::fmt::Debug;
use std::sync::Arc;

use log::debug;
use serde::Serialize;
use smallvec::SmallVec;

use crate::axi::Tagged;
use crate::bank::cell::ExtCell;
use crate::bank::linkedlist::{next_pointers, ListEvents, ListPointers};
use crate::base::behavior::ModuleBehaviors;
use crate::base::module::{module_inner, IsModule, ModuleBase};
use crate::types::{AxiId, Iid, Reject, RequestKind};

#[derive(Debug, Clone, Copy)]
pub struct ResponseBankConfig {
    pub kind: RequestKind,
    /// Number of extended cells.
    pub capacity: usize,
    pub num_ids: usize,
    pub max_burst_len: u32,
}

/// A response handed to the requester.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Released<T> {
    pub id: AxiId,
    pub iid: Iid,
    /// Position inside the burst.
    pub offset: u32,
    pub last: bool,
    pub payload: T,
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct BankStats {
    reservations: u64,
    capacity_rejects: u64,
    acquisitions: u64,
    releases: u64,
    cancelled: u64,
    peak_occupancy: u64,
}

impl BankStats {
    pub fn reservations(&self) -> u64 {
        self.reservations
    }

    pub fn capacity_rejects(&self) -> u64 {
        self.capacity_rejects
    }

    pub fn acquisitions(&self) -> u64 {
        self.acquisitions
    }

    pub fn releases(&self) -> u64 {
        self.releases
    }

    pub fn cancelled(&self) -> u64 {
        self.cancelled
    }

    pub fn peak_occupancy(&self) -> u64 {
        self.peak_occupancy
    }
}

#[derive(Debug)]
pub struct BankState<T> {
    cells: Vec<ExtCell<T>>,
    // forward pointers of every per-identifier chain
    next: Vec<Iid>,
    lists: Vec<ListPointers>,
    // entry read one tick ahead of its delivery
    out_reg: Option<Released<T>>,
    rr_next: AxiId,
    occupied: usize,
    stats: BankStats,
}

impl<T: Clone> BankState<T> {
    fn new(config: &ResponseBankConfig) -> Self {
        Self {
            cells: vec![ExtCell::default(); config.capacity],
            next: vec![0; config.capacity],
            lists: vec![ListPointers::default(); config.num_ids],
            out_reg: None,
            rr_next: 0,
            occupied: 0,
            stats: BankStats::default(),
        }
    }
}

/// Stores responses of one kind and releases them in per-identifier request order.
///
/// A cell is reserved when the address request is accepted, filled as real-memory responses
/// arrive, and drained as the requester takes responses.  Release of a cell's entries is gated
/// by the per-iid credits the delay calculator publishes.
pub struct ResponseBank<T> {
    base: ModuleBase<BankState<T>, ResponseBankConfig>,
    // inputs staged for the current tick
    pending_reserve: Option<(AxiId, Iid, u32)>,
    pending_acquire: Option<T>,
    release_credits: Vec<u32>,
    out_ready: bool,
    // output of the last tick
    released: Option<Released<T>>,
}

impl<T: Clone + Tagged + Debug> ModuleBehaviors for ResponseBank<T> {
    fn tick_one(&mut self) {
        let mut out_reg = None;
        let mut delivered = None;

        if let Some(staged) = self.base.state.out_reg.take() {
            if self.credit(staged.iid) == 0 {
                // release-enable was withdrawn since the entry was read: drop the copy, the
                // entry itself stays in its cell
                debug!(
                    "{} bank: cancelled release of id {} iid {} offset {}",
                    self.kind().short(),
                    staged.id,
                    staged.iid,
                    staged.offset
                );
                self.base.state.stats.cancelled += 1;
            } else if self.out_ready {
                delivered = Some(staged);
            } else {
                out_reg = Some(staged);
            }
        }

        if out_reg.is_none() {
            out_reg = self.stage_next(delivered.as_ref());
        }

        self.commit(delivered.as_ref());

        let state = &mut self.base.state;
        if let Some(staged) = &out_reg {
            state.rr_next = (staged.id + 1) % state.lists.len();
        }
        state.out_reg = out_reg;
        self.released = delivered;
        self.base.advance();
    }

    fn reset(&mut self) {
        self.base.state = BankState::new(&self.base.config);
        self.base.cycle = 0;
        self.pending_reserve = None;
        self.pending_acquire = None;
        self.release_credits.iter_mut().for_each(|c| *c = 0);
        self.out_ready = false;
        self.released = None;
    }
}

impl<T: Clone + Tagged + Debug> IsModule for ResponseBank<T> {
    module_inner!(BankState<T>, ResponseBankConfig);
}

impl<T: Clone + Tagged + Debug> ResponseBank<T> {
    pub fn new(config: Arc<ResponseBankConfig>) -> Self {
        assert!(config.capacity > 0, "bank capacity must be > 0");
        assert!(config.num_ids > 0, "num_ids must be > 0");
        assert!(config.max_burst_len > 0, "max_burst_len must be > 0");
        let state = BankState::new(&config);
        let capacity = config.capacity;
        Self {
            base: ModuleBase::with_state(state, config),
            pending_reserve: None,
            pending_acquire: None,
            release_credits: vec![0; capacity],
            out_ready: false,
            released: None,
        }
    }

    pub fn kind(&self) -> RequestKind {
        self.conf().kind
    }

    pub fn capacity(&self) -> usize {
        self.conf().capacity
    }

    /// The iid the next accepted reservation receives, if any cell is free.
    ///
    /// At most one reservation is granted per tick.
    pub fn next_iid(&self) -> Option<Iid> {
        if self.pending_reserve.is_some() {
            return None;
        }
        self.state().cells.iter().position(|cell| !cell.is_valid())
    }

    pub fn can_reserve(&self) -> bool {
        self.next_iid().is_some()
    }

    /// Count an address request refused for lack of a free cell.
    pub fn note_reject(&mut self) {
        self.base.state.stats.capacity_rejects += 1;
    }

    /// Reserve a cell for a burst of `burst_len` responses of identifier `id`.
    pub fn reserve(&mut self, id: AxiId, burst_len: u32) -> Result<Iid, Reject> {
        assert!(id < self.conf().num_ids, "identifier {} out of range", id);
        assert!(
            burst_len >= 1 && burst_len <= self.conf().max_burst_len,
            "burst length {} exceeds the cell width {}",
            burst_len,
            self.conf().max_burst_len
        );
        let Some(iid) = self.next_iid() else {
            self.note_reject();
            return Err(Reject::capacity(self.kind()));
        };
        debug!(
            "{} bank: reserve iid {} for id {} ({} beats)",
            self.kind().short(),
            iid,
            id,
            burst_len
        );
        self.pending_reserve = Some((id, iid, burst_len));
        Ok(iid)
    }

    /// Store a response from real memory in the oldest cell of its identifier still awaiting
    /// responses.
    pub fn acquire(&mut self, payload: T) {
        let id = payload.axi_id();
        assert!(id < self.conf().num_ids, "identifier {} out of range", id);
        assert!(
            self.pending_acquire.is_none(),
            "only one response can be acquired per tick"
        );
        assert!(
            self.state().lists[id].rsv_len > 0,
            "response for identifier {} without reservation",
            id
        );
        self.pending_acquire = Some(payload);
    }

    /// Latch the release-enable input for this tick (credits indexed by iid).
    pub fn set_release_enable(&mut self, credits: &[u32]) {
        assert_eq!(credits.len(), self.release_credits.len());
        self.release_credits.copy_from_slice(credits);
    }

    pub fn set_out_ready(&mut self, ready: bool) {
        self.out_ready = ready;
    }

    /// Response delivered to the requester during the last tick.
    pub fn take_released(&mut self) -> Option<Released<T>> {
        self.released.take()
    }

    /// The entry currently held in the output register, if any.
    pub fn staged(&self) -> Option<&Released<T>> {
        self.state().out_reg.as_ref()
    }

    pub fn pointers(&self, id: AxiId) -> ListPointers {
        self.state().lists[id]
    }

    pub fn cell(&self, iid: Iid) -> &ExtCell<T> {
        &self.state().cells[iid]
    }

    pub fn occupancy(&self) -> usize {
        self.state().occupied
    }

    pub fn is_empty(&self) -> bool {
        self.occupancy() == 0 && self.state().out_reg.is_none()
    }

    pub fn stats(&self) -> BankStats {
        self.state().stats
    }

    fn credit(&self, iid: Iid) -> u32 {
        self.release_credits[iid]
    }

    /// Pick the next entry to read into the output register, round-robin over identifiers.
    fn stage_next(&self, delivered: Option<&Released<T>>) -> Option<Released<T>> {
        let num_ids = self.conf().num_ids;
        let start = self.state().rr_next;
        (0..num_ids)
            .map(|k| (start + k) % num_ids)
            .find_map(|id| self.try_release(id, delivered))
    }

    /// Candidate release for identifier `id`, computed from the previous tick's state.
    ///
    /// When the entry delivered this tick belongs to the same identifier, the read skips over
    /// it: either the next offset of the same cell, or the cell at `pre_tail` when the delivery
    /// drains the tail cell.
    pub fn try_release(&self, id: AxiId, delivered: Option<&Released<T>>) -> Option<Released<T>> {
        let state = self.state();
        let list = &state.lists[id];
        if list.is_empty() {
            return None;
        }

        let (iid, consumed) = match delivered {
            Some(d) if d.id == id => {
                if state.cells[d.iid].drains_on_release() {
                    if list.len() < 2 {
                        return None;
                    }
                    (list.pre_tail, 0)
                } else {
                    (d.iid, 1)
                }
            }
            _ => (list.tail, 0),
        };

        let cell = &state.cells[iid];
        if cell.rsp_cnt() <= consumed || self.credit(iid) <= consumed {
            return None;
        }
        let offset = cell.release_offset() + consumed;
        let payload = cell.entry(offset)?.clone();
        Some(Released {
            id,
            iid,
            offset,
            last: offset + 1 == cell.burst_len(),
            payload,
        })
    }

    fn commit(&mut self, delivered: Option<&Released<T>>) {
        let reserve = self.pending_reserve.take();
        let acquire = self.pending_acquire.take();
        let state = &mut self.base.state;

        // collect this tick's events per identifier, all read from the previous state
        let mut events: SmallVec<[(AxiId, ListEvents); 3]> = SmallVec::new();
        if let Some((id, iid, _)) = reserve {
            events_of(&mut events, id).reserved = Some(iid);
        }
        if let Some(payload) = &acquire {
            let id = payload.axi_id();
            let filled = state.cells[state.lists[id].rsp_head].fills_on_acquire();
            events_of(&mut events, id).filled = filled;
        }
        if let Some(d) = delivered {
            let drained = state.cells[d.iid].drains_on_release();
            events_of(&mut events, d.id).drained = drained;
        }

        let updates: SmallVec<[(AxiId, ListPointers); 3]> = events
            .iter()
            .map(|(id, ev)| (*id, next_pointers(&state.lists[*id], &state.next, *ev)))
            .collect();

        if let Some((id, iid, _)) = reserve {
            let list = state.lists[id];
            if !list.is_empty() {
                state.next[list.rsv_head] = iid;
            }
        }

        if let Some(payload) = acquire {
            let id = payload.axi_id();
            let iid = state.lists[id].rsp_head;
            let cell = &mut state.cells[iid];
            assert_eq!(cell.id(), id, "response stored into a cell of another identifier");
            debug!(
                "{} bank: acquire id {} iid {} offset {}",
                self.base.config.kind.short(),
                id,
                iid,
                cell.acquire_offset()
            );
            cell.store(payload);
            state.stats.acquisitions += 1;
        }

        if let Some(d) = delivered {
            let cell = &mut state.cells[d.iid];
            cell.retire(d.offset);
            if !cell.is_valid() {
                state.occupied -= 1;
            }
            state.stats.releases += 1;
            debug!(
                "{} bank: release id {} iid {} offset {}{}",
                self.base.config.kind.short(),
                d.id,
                d.iid,
                d.offset,
                if d.last { " (last)" } else { "" }
            );
        }

        if let Some((id, iid, burst_len)) = reserve {
            state.cells[iid].reserve(id, burst_len);
            state.occupied += 1;
            state.stats.reservations += 1;
            state.stats.peak_occupancy = state.stats.peak_occupancy.max(state.occupied as u64);
        }

        for (id, pointers) in updates {
            state.lists[id] = pointers;
        }
    }
}

fn events_of(events: &mut SmallVec<[(AxiId, ListEvents); 3]>, id: AxiId) -> &mut ListEvents {
    let pos = match events.iter().position(|(eid, _)| *eid == id) {
        Some(pos) => pos,
        None => {
            events.push((id, ListEvents::default()));
            events.len() - 1
        }
    };
    &mut events[pos].1
}
