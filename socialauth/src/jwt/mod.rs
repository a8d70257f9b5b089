//! ID token verification and replay protection.

mod errors;
mod jwks;
mod verify;

pub use errors::JwtError;
pub use verify::{Claims, verify_and_decode, verify_jti};
