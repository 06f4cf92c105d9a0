pub mod claims;
pub mod constants;
pub mod messages;

// Re-export primary types for convenience.
pub use claims::{ClaimsError, TokenClaims, decode_claims};
pub use messages::{ClientConnectionRequest, ClientPayload};
