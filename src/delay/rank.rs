use serde::Serialize;

use crate::types::RequestKind;

/// Row-buffer cost of an entry against the rank's current row, cheapest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum CostCategory {
    /// Same row as the open one.
    Hit,
    /// No row open.
    Closed,
    /// Another row must be closed first.
    Conflict,
}

impl CostCategory {
    pub const ALL: [CostCategory; 3] = [Self::Hit, Self::Closed, Self::Conflict];
}

/// One burst entry of one slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct EntryRef {
    pub kind: RequestKind,
    pub slot: usize,
    pub beat: u32,
}

/// One simulated memory channel.
#[derive(Debug, Clone, Default)]
pub struct RankState {
    pub delay_cnt: u32,
    pub row_open: bool,
    pub row_id: u64,
    pub inflight: Option<EntryRef>,
}

impl RankState {
    pub fn is_busy(&self) -> bool {
        self.delay_cnt > 0
    }

    pub fn category(&self, row: u64) -> CostCategory {
        if !self.row_open {
            CostCategory::Closed
        } else if self.row_id == row {
            CostCategory::Hit
        } else {
            CostCategory::Conflict
        }
    }

    pub fn open(&mut self, row: u64) {
        self.row_open = true;
        self.row_id = row;
    }
}
