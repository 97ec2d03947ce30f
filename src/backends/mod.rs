//! The services that speak the protocol.
//!
//! [`counter`] and [`inventory`] register functions with a
//! [`Dispatcher`](crate::Dispatcher); [`oracle`] answers every call from a
//! response table.

pub mod counter;
pub mod inventory;
pub mod oracle;
