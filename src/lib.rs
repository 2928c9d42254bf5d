pub mod axi;
pub mod bank;
pub mod base;
pub mod delay;
pub mod sim;
pub mod timeq;
pub mod traffic;
pub mod types;

pub use bank::{Released, ResponseBank};
pub use delay::DelayCalculator;
pub use sim::harness::Simulation;
pub use sim::top::SimmemTop;
pub use types::{AxiId, Iid, Reject, RejectReason, RequestKind};
