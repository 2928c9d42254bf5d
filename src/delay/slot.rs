use smallvec::SmallVec;

use crate::axi::AddressRequest;
use crate::delay::age::Age;
use crate::types::{Iid, RequestKind};

/// Bits at burst positions `burst_len..64`.
pub fn beyond_mask(burst_len: u32) -> u64 {
    if burst_len >= 64 {
        0
    } else {
        u64::MAX << burst_len
    }
}

/// Bits at burst positions `0..count`.
pub fn low_mask(count: u32) -> u64 {
    !beyond_mask(count)
}

/// Metadata the delay calculator keeps per outstanding address request.
///
/// The three bit arrays are indexed by burst position and pre-seeded past the burst length, so
/// "every entry done" is simply `mem_done == u64::MAX`.
#[derive(Debug, Clone)]
pub struct Slot {
    pub iid: Iid,
    pub kind: RequestKind,
    pub req: AddressRequest,
    pub rank: usize,
    /// write data arrived; always full for reads
    pub data_v: u64,
    pub mem_pending: u64,
    pub mem_done: u64,
    /// allocation order, used to attribute early write data
    pub alloc_age: Age,
    // age of each entry once it becomes schedulable
    entry_age: SmallVec<[Option<Age>; 8]>,
}

impl Slot {
    pub fn new_write(iid: Iid, req: AddressRequest, rank: usize, immediate: u32, age: Age) -> Self {
        assert!(immediate <= req.burst_len);
        let beyond = beyond_mask(req.burst_len);
        let mut entry_age: SmallVec<[Option<Age>; 8]> =
            SmallVec::from_elem(None, req.burst_len as usize);
        entry_age[..immediate as usize].iter_mut().for_each(|a| *a = Some(age));
        Self {
            iid,
            kind: RequestKind::Write,
            req,
            rank,
            data_v: low_mask(immediate) | beyond,
            mem_pending: 0,
            mem_done: beyond,
            alloc_age: age,
            entry_age,
        }
    }

    /// Every entry of a read burst shares the burst's age.
    pub fn new_read(iid: Iid, req: AddressRequest, rank: usize, age: Age) -> Self {
        let beyond = beyond_mask(req.burst_len);
        let entry_age = SmallVec::from_elem(Some(age), req.burst_len as usize);
        Self {
            iid,
            kind: RequestKind::Read,
            req,
            rank,
            data_v: u64::MAX,
            mem_pending: 0,
            mem_done: beyond,
            alloc_age: age,
            entry_age,
        }
    }

    pub fn burst_len(&self) -> u32 {
        self.req.burst_len
    }

    pub fn missing_data(&self) -> bool {
        self.data_v != u64::MAX
    }

    /// Record one write-data beat against the lowest position still missing data.
    pub fn attribute_data(&mut self, age: Age) -> u32 {
        assert!(self.missing_data(), "write data attributed to a complete slot");
        let beat = (!self.data_v).trailing_zeros();
        self.data_v |= 1 << beat;
        self.entry_age[beat as usize] = Some(age);
        beat
    }

    /// Entries with outstanding work: not pending, not done, data present.
    pub fn ready_entries(&self) -> impl Iterator<Item = u32> + '_ {
        let ready = self.data_v & !self.mem_pending & !self.mem_done;
        (0..self.burst_len()).filter(move |beat| ready & (1 << beat) != 0)
    }

    pub fn entry_age(&self, beat: u32) -> Age {
        match self.entry_age[beat as usize] {
            Some(age) => age,
            None => panic!("entry {} of iid {} has no age", beat, self.iid),
        }
    }

    pub fn start(&mut self, beat: u32) {
        let bit = 1 << beat;
        assert_eq!(0, (self.mem_pending | self.mem_done) & bit, "entry scheduled twice");
        self.mem_pending |= bit;
    }

    pub fn complete(&mut self, beat: u32) {
        let bit = 1 << beat;
        assert_ne!(0, self.mem_pending & bit, "completing an entry that is not in flight");
        self.mem_pending &= !bit;
        self.mem_done |= bit;
    }

    pub fn all_done(&self) -> bool {
        self.mem_done == u64::MAX
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delay::age::AgeClock;

    #[test]
    fn masks_cover_full_width() {
        assert_eq!(0, beyond_mask(64));
        assert_eq!(u64::MAX, low_mask(64));
        assert_eq!(0b111, low_mask(3));
        assert_eq!(u64::MAX << 3, beyond_mask(3));
    }

    #[test]
    fn write_slot_is_pre_seeded_past_burst() {
        let mut clock = AgeClock::default();
        let slot = Slot::new_write(0, AddressRequest::new(1, 5, 2), 0, 1, clock.stamp());
        assert_eq!(u64::MAX << 2 | 1, slot.data_v);
        assert_eq!(u64::MAX << 2, slot.mem_done);
        assert!(slot.missing_data());
        assert_eq!(vec![0], slot.ready_entries().collect::<Vec<_>>());
    }

    #[test]
    fn data_fills_lowest_missing_position() {
        let mut clock = AgeClock::default();
        let mut slot = Slot::new_write(0, AddressRequest::new(1, 5, 3), 0, 0, clock.stamp());
        assert_eq!(0, slot.ready_entries().count());
        assert_eq!(0, slot.attribute_data(clock.stamp()));
        assert_eq!(1, slot.attribute_data(clock.stamp()));
        assert!(slot.entry_age(0) < slot.entry_age(1));
        assert_eq!(2, slot.attribute_data(clock.stamp()));
        assert!(!slot.missing_data());
    }

    #[test]
    fn entries_complete_to_all_done() {
        let mut clock = AgeClock::default();
        let mut slot = Slot::new_read(4, AddressRequest::new(2, 0, 2), 0, clock.stamp());
        assert_eq!(slot.entry_age(0), slot.entry_age(1));
        slot.start(1);
        assert_eq!(vec![0], slot.ready_entries().collect::<Vec<_>>());
        slot.complete(1);
        slot.start(0);
        slot.complete(0);
        assert!(slot.all_done());
    }

    #[test]
    #[should_panic(expected = "not in flight")]
    fn completing_idle_entry_panics() {
        let mut clock = AgeClock::default();
        let mut slot = Slot::new_read(0, AddressRequest::new(0, 0, 1), 0, clock.stamp());
        slot.complete(0);
    }
}
