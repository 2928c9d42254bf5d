//! Per-identifier ordering lists over the cells of a response bank.
//!
//! Cells of one identifier form a chain through the bank's forward-pointer map, oldest first:
//!
//! ```text
//!  tail -> pre_tail -> ... -> rsp_head -> ... -> rsv_head
//! ```
//!
//! `tail` is the oldest cell and `pre_tail` the one after it (or `tail` itself when the list has
//! a single cell).  `rsp_head` is the oldest cell still waiting for responses; once every cell
//! has all its responses it piggybacks on `rsv_head`, the most recently reserved cell.
//!
//! The next state of the pointers is a pure function of the previous tick's pointers, the
//! previous tick's chain and the events of the current tick.

use crate::types::Iid;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ListPointers {
    pub rsv_head: Iid,
    pub rsp_head: Iid,
    pub pre_tail: Iid,
    pub tail: Iid,
    /// Cells still waiting for at least one response.
    pub rsv_len: usize,
    /// Cells holding all their responses, waiting for release.
    pub rsp_len: usize,
}

impl ListPointers {
    pub fn len(&self) -> usize {
        self.rsv_len + self.rsp_len
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// What happens to one list during a tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ListEvents {
    /// Cell newly reserved for this identifier.
    pub reserved: Option<Iid>,
    /// The acquisition of this tick completes the cell at `rsp_head`.
    pub filled: bool,
    /// The release of this tick empties the cell at `tail`.
    pub drained: bool,
}

/// Compute the pointers committed at the end of the tick.
///
/// `next` is the chain as of the previous tick; the caller links the new cell after the old
/// `rsv_head` when committing.
pub fn next_pointers(cur: &ListPointers, next: &[Iid], ev: ListEvents) -> ListPointers {
    assert!(!ev.filled || cur.rsv_len > 0, "acquisition without a reserved cell");
    assert!(!ev.drained || cur.rsp_len > 0, "release drains a cell still awaiting responses");

    let rsp_len_after_out = cur.rsp_len - ev.drained as usize;
    let rsv_len_after_in = cur.rsv_len - ev.filled as usize;
    let len_after_out = cur.rsv_len + rsp_len_after_out;

    let rsv_head = ev.reserved.unwrap_or(cur.rsv_head);

    let tail = if len_after_out == 0 {
        ev.reserved.unwrap_or(cur.tail)
    } else if ev.drained {
        cur.pre_tail
    } else {
        cur.tail
    };

    let pre_tail = if len_after_out >= 2 {
        if ev.drained {
            next[cur.pre_tail]
        } else {
            cur.pre_tail
        }
    } else {
        // piggyback: at most one cell survives the release, so the new cell (if any) becomes
        // the second oldest
        ev.reserved.unwrap_or(tail)
    };

    let rsp_head = if rsv_len_after_in >= 1 {
        if ev.filled {
            next[cur.rsp_head]
        } else {
            cur.rsp_head
        }
    } else {
        rsv_head
    };

    ListPointers {
        rsv_head,
        rsp_head,
        pre_tail,
        tail,
        rsv_len: rsv_len_after_in + ev.reserved.is_some() as usize,
        rsp_len: rsp_len_after_out + ev.filled as usize,
    }
}
