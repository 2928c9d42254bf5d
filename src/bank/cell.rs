use smallvec::SmallVec;

use crate::types::AxiId;

/// Storage unit allocated per reservation, wide enough for a whole burst.
///
/// Responses of a burst are laid out in depth: beat `k` lives at offset `k`.
/// `burst_len >= rsv_cnt + rsp_cnt` holds at all times.
#[derive(Debug, Clone)]
pub struct ExtCell<T> {
    id: AxiId,
    burst_len: u32,
    // responses still awaited
    rsv_cnt: u32,
    // responses stored but not released yet
    rsp_cnt: u32,
    entries: SmallVec<[Option<T>; 8]>,
}

impl<T> Default for ExtCell<T> {
    fn default() -> Self {
        Self {
            id: 0,
            burst_len: 0,
            rsv_cnt: 0,
            rsp_cnt: 0,
            entries: SmallVec::new(),
        }
    }
}

impl<T: Clone> ExtCell<T> {
    pub fn id(&self) -> AxiId {
        self.id
    }

    pub fn burst_len(&self) -> u32 {
        self.burst_len
    }

    pub fn rsv_cnt(&self) -> u32 {
        self.rsv_cnt
    }

    pub fn rsp_cnt(&self) -> u32 {
        self.rsp_cnt
    }

    /// Occupied: some response is still awaited or still waiting for release.
    pub fn is_valid(&self) -> bool {
        self.rsv_cnt != 0 || self.rsp_cnt != 0
    }

    /// At least one response acquired and not all of them released.
    pub fn is_active(&self) -> bool {
        self.is_valid() && self.rsv_cnt < self.burst_len
    }

    pub fn acquire_offset(&self) -> u32 {
        self.burst_len - self.rsv_cnt
    }

    pub fn release_offset(&self) -> u32 {
        self.burst_len - self.rsv_cnt - self.rsp_cnt
    }

    /// The next acquisition completes the burst.
    pub fn fills_on_acquire(&self) -> bool {
        self.rsv_cnt == 1
    }

    /// The next release empties the cell.
    pub fn drains_on_release(&self) -> bool {
        self.rsv_cnt == 0 && self.rsp_cnt == 1
    }

    pub fn entry(&self, offset: u32) -> Option<&T> {
        self.entries.get(offset as usize).and_then(Option::as_ref)
    }

    pub fn reserve(&mut self, id: AxiId, burst_len: u32) {
        assert!(!self.is_valid(), "reserving an occupied cell");
        assert!(burst_len > 0, "burst length must be at least one");
        self.id = id;
        self.burst_len = burst_len;
        self.rsv_cnt = burst_len;
        self.rsp_cnt = 0;
        self.entries.clear();
        self.entries.resize(burst_len as usize, None);
    }

    pub fn store(&mut self, payload: T) {
        assert!(
            self.rsv_cnt > 0,
            "acquired more responses than the burst length {} of identifier {}",
            self.burst_len,
            self.id
        );
        let offset = self.acquire_offset() as usize;
        self.entries[offset] = Some(payload);
        self.rsv_cnt -= 1;
        self.rsp_cnt += 1;
    }

    /// Remove the entry at `offset`, which must be the next one in burst order.
    pub fn retire(&mut self, offset: u32) -> T {
        assert!(self.rsp_cnt > 0, "releasing from a cell without stored responses");
        assert_eq!(self.release_offset(), offset, "out-of-order release inside a burst");
        let payload = self.entries[offset as usize]
            .take()
            .expect("stored response missing at release offset");
        self.rsp_cnt -= 1;
        if !self.is_valid() {
            self.entries.clear();
        }
        payload
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}
