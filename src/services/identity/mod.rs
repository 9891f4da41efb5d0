pub mod factory;
pub mod jwt;
pub mod verifier;

pub use factory::build_identity_verifier;
pub use jwt::JwtIdentityVerifier;
pub use verifier::{IdentityVerifier, VerifyError};
