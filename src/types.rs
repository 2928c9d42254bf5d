use std::fmt;

/// External (AXI) request identifier.
pub type AxiId = usize;

/// Internal identifier handed out by a response bank at reservation time.
pub type Iid = usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RequestKind {
    Write,
    Read,
}

impl RequestKind {
    pub fn short(self) -> &'static str {
        match self {
            Self::Write => "w",
            Self::Read => "r",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// No free extended cell in the response bank.
    CapacityExhausted,
    /// No free scheduling slot in the delay calculator.
    SlotExhausted,
}

/// Refusal to accept an address request this tick. Always recoverable by retrying later.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reject {
    pub kind: RequestKind,
    pub reason: RejectReason,
}

impl Reject {
    pub fn new(kind: RequestKind, reason: RejectReason) -> Self {
        Self { kind, reason }
    }

    pub fn capacity(kind: RequestKind) -> Self {
        Self::new(kind, RejectReason::CapacityExhausted)
    }

    pub fn slot(kind: RequestKind) -> Self {
        Self::new(kind, RejectReason::SlotExhausted)
    }
}

impl fmt::Display for Reject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let what = match self.kind {
            RequestKind::Write => "write",
            RequestKind::Read => "read",
        };
        match self.reason {
            RejectReason::CapacityExhausted => {
                write!(f, "{what} address request refused: response bank has no free cell")
            }
            RejectReason::SlotExhausted => {
                write!(f, "{what} address request refused: delay calculator has no free slot")
            }
        }
    }
}

impl std::error::Error for Reject {}
