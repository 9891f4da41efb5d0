use async_trait::async_trait;
use thiserror::Error;

/// What a verifier vouches for after checking a bearer token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedIdentity {
    pub email: String,
    pub subject: String,
}

/// Verification errors.
///
/// Note:
/// - `Invalid` is the caller's fault (bad/expired token) and is recovered as "anonymous".
/// - `Unavailable` means we could not decide (key source down, timeout); it is surfaced as 503.
#[derive(Debug, Error)]
pub enum VerifyError {
    #[error("invalid token: {0}")]
    Invalid(String),
    #[error("identity verifier unavailable: {0}")]
    Unavailable(String),
}

impl VerifyError {
    pub fn invalid(reason: impl Into<String>) -> Self {
        Self::Invalid(reason.into())
    }

    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::Unavailable(reason.into())
    }
}

impl From<jsonwebtoken::errors::Error> for VerifyError {
    fn from(e: jsonwebtoken::errors::Error) -> Self {
        Self::Invalid(e.to_string())
    }
}

/// Turns an opaque bearer token into a verified identity.
///
/// Implementations must be safe to share across requests (`Arc<dyn IdentityVerifier>`).
#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> Result<VerifiedIdentity, VerifyError>;
}
