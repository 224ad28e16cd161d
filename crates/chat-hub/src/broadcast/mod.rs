//! Event fan-out
//!
//! The trigger interface the API layer calls and the dispatcher that turns
//! triggers into events for connected sessions.

mod dispatcher;
mod trigger;

pub use dispatcher::{DispatchError, EventDispatcher};
pub use trigger::{trigger_channel, HubTriggers, Trigger, TriggerError, TriggerReceiver};
