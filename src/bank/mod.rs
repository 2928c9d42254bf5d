//! Response banks: per-identifier ordered storage for responses coming back from real memory.

pub mod cell;
pub mod linkedlist;
mod response_bank;

pub use cell::ExtCell;
pub use linkedlist::{next_pointers, ListEvents, ListPointers};
pub use response_bank::{BankStats, Released, ResponseBank, ResponseBankConfig};
