//! Wire protocol
//!
//! JSON text frames in both directions, tagged by `type`.

mod close_codes;
mod events;
mod intents;

pub use close_codes::CloseCode;
pub use events::{PresenceStatus, ServerEvent};
pub use intents::ClientIntent;
