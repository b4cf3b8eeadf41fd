//! 变更通知
//!
//! [`ChangeBus`] fans catalog change events out to synchronous handlers and
//! async receivers.

pub mod bus;

pub use bus::{ChangeBus, Subscription};
pub use shared::message::{ChangeChannel, ChangeEvent};
