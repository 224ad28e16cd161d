//! WebSocket close codes
//!
//! Hub-specific close codes sent in the close frame when the hub ends a connection.

use serde::{Deserialize, Serialize};

/// Hub WebSocket close codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u16)]
pub enum CloseCode {
    /// Unknown error occurred
    UnknownError = 4000,
    /// Frame was not a well-formed intent (bad JSON, unknown `type`, binary frame)
    DecodeError = 4002,
    /// Sent an intent before `authenticate`
    NotAuthenticated = 4003,
    /// Credential rejected by the identity verifier
    AuthenticationFailed = 4004,
    /// Sent `authenticate` twice
    AlreadyAuthenticated = 4005,
    /// Same identity authenticated on another connection
    Superseded = 4006,
}

impl CloseCode {
    /// Get the raw u16 value
    #[must_use]
    pub const fn as_u16(self) -> u16 {
        self as u16
    }

    /// Get the description for this close code
    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::UnknownError => "Unknown error occurred",
            Self::DecodeError => "Invalid payload encoding",
            Self::NotAuthenticated => "Authentication required",
            Self::AuthenticationFailed => "Invalid authentication",
            Self::AlreadyAuthenticated => "Already authenticated",
            Self::Superseded => "Connected elsewhere",
        }
    }

    /// Get the name of this close code
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::UnknownError => "UnknownError",
            Self::DecodeError => "DecodeError",
            Self::NotAuthenticated => "NotAuthenticated",
            Self::AuthenticationFailed => "AuthenticationFailed",
            Self::AlreadyAuthenticated => "AlreadyAuthenticated",
            Self::Superseded => "Superseded",
        }
    }
}

impl std::fmt::Display for CloseCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({}): {}", self.name(), self.as_u16(), self.description())
    }
}

impl From<CloseCode> for u16 {
    fn from(code: CloseCode) -> Self {
        code.as_u16()
    }
}
