//! Connection management
//!
//! Per-socket handles and the registry of authenticated sessions.

mod connection;
mod registry;

pub use connection::{Connection, ConnectionState, DeliveryError, Outbound};
pub use registry::{DeliveryReport, SessionRegistry};
