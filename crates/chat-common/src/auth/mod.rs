//! Credential verification for the `authenticate` handshake

mod jwt;

pub use jwt::{Claims, JwtService, TokenType};
