//! Access Gate: who is calling (authentication) and may they promote users (authorization).
//!
//! - `authenticate` is fail-open: a bad token makes the caller anonymous, it never rejects.
//! - `authorize_admin_mutation` decides through an exhaustive `AdminCheck`.
use std::sync::Arc;
use std::time::Duration;

use axum::http::{HeaderMap, header};
use thiserror::Error;

use crate::config::PromotionMode;
use crate::repos::error::RepoError;
use crate::repos::outcome::UpdateOutcome;
use crate::repos::user_repo::{ADMIN_ROLE, UserDirectory};
use crate::services::identity::{IdentityVerifier, VerifyError};

/// Caller identity for the lifetime of one request. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallerIdentity {
    Verified { email: String },
    Anonymous,
}

impl CallerIdentity {
    pub fn email(&self) -> Option<&str> {
        match self {
            Self::Verified { email } => Some(email),
            Self::Anonymous => None,
        }
    }
}

/// Classification of a caller against the directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdminCheck {
    NoIdentity,
    IdentityNotFound,
    IdentityNotAdmin,
    IdentityIsAdmin,
}

#[derive(Debug, Error)]
pub enum GateError {
    #[error("you do not have access to make admin")]
    Forbidden,
    #[error("only admins can make other users admin")]
    NotAuthorized,
    #[error("user {0} not found")]
    TargetNotFound(String),
    #[error("identity verifier unavailable: {0}")]
    VerifierUnavailable(String),
    #[error(transparent)]
    Directory(#[from] RepoError),
}

/// `Authorization: Bearer <token>` -> `<token>`. Anything else is "no token".
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .filter(|token| !token.is_empty())
}

pub struct AccessGate {
    verifier: Arc<dyn IdentityVerifier>,
    directory: Arc<dyn UserDirectory>,
    verify_timeout: Duration,
    promotion: PromotionMode,
}

impl std::fmt::Debug for AccessGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessGate")
            .field("verify_timeout", &self.verify_timeout)
            .field("promotion", &self.promotion)
            .finish()
    }
}

impl AccessGate {
    pub fn new(
        verifier: Arc<dyn IdentityVerifier>,
        directory: Arc<dyn UserDirectory>,
        verify_timeout: Duration,
        promotion: PromotionMode,
    ) -> Self {
        Self {
            verifier,
            directory,
            verify_timeout,
            promotion,
        }
    }

    /// Resolves the caller from request headers.
    ///
    /// Returns `Err` only when the verifier could not answer (timeout / key source down);
    /// a token the verifier rejects yields `Ok(CallerIdentity::Anonymous)`.
    pub async fn authenticate(&self, headers: &HeaderMap) -> Result<CallerIdentity, GateError> {
        let Some(token) = bearer_token(headers) else {
            return Ok(CallerIdentity::Anonymous);
        };

        let verified = tokio::time::timeout(self.verify_timeout, self.verifier.verify(token))
            .await
            .unwrap_or_else(|_| Err(VerifyError::unavailable("verification timed out")));

        match verified {
            Ok(identity) => {
                tracing::debug!(
                    email = %identity.email,
                    subject = %identity.subject,
                    "caller authenticated"
                );
                Ok(CallerIdentity::Verified {
                    email: identity.email,
                })
            }
            Err(VerifyError::Invalid(reason)) => {
                tracing::warn!(%reason, "bearer token rejected, continuing as anonymous");
                Ok(CallerIdentity::Anonymous)
            }
            Err(VerifyError::Unavailable(reason)) => {
                tracing::error!(%reason, "identity verifier unavailable");
                Err(GateError::VerifierUnavailable(reason))
            }
        }
    }

    /// Admin-only routes reject anonymous callers before the request body is read.
    pub fn require_identity(&self, identity: &CallerIdentity) -> Result<(), GateError> {
        match identity {
            CallerIdentity::Verified { .. } => Ok(()),
            CallerIdentity::Anonymous => {
                tracing::warn!("admin request without identity");
                Err(GateError::Forbidden)
            }
        }
    }

    pub async fn check_admin(&self, identity: &CallerIdentity) -> Result<AdminCheck, GateError> {
        let Some(email) = identity.email() else {
            return Ok(AdminCheck::NoIdentity);
        };

        let check = match self.directory.find_by_email(email).await? {
            None => AdminCheck::IdentityNotFound,
            Some(record) if record.is_admin() => AdminCheck::IdentityIsAdmin,
            Some(_) => AdminCheck::IdentityNotAdmin,
        };
        Ok(check)
    }

    /// Sets `role = "admin"` on `target_email` if the caller is an admin.
    pub async fn authorize_admin_mutation(
        &self,
        identity: &CallerIdentity,
        target_email: &str,
    ) -> Result<UpdateOutcome, GateError> {
        let check = self.check_admin(identity).await?;

        match check {
            AdminCheck::NoIdentity => {
                tracing::warn!(%target_email, "admin promotion without identity");
                Err(GateError::Forbidden)
            }
            AdminCheck::IdentityNotFound | AdminCheck::IdentityNotAdmin => {
                tracing::warn!(
                    caller = identity.email().unwrap_or_default(),
                    target_email = %target_email,
                    ?check,
                    "admin promotion denied"
                );
                Err(GateError::NotAuthorized)
            }
            AdminCheck::IdentityIsAdmin => {
                let outcome = self
                    .directory
                    .set_role(target_email, ADMIN_ROLE, self.promotion.upserts())
                    .await?;

                if outcome.matched_count == 0 && outcome.upserted_count == 0 {
                    return Err(GateError::TargetNotFound(target_email.to_string()));
                }

                tracing::info!(
                    caller = identity.email().unwrap_or_default(),
                    target_email = %target_email,
                    modified = outcome.modified_count,
                    upserted = outcome.upserted_count,
                    "admin promotion granted"
                );
                Ok(outcome)
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::HashMap;

    use async_trait::async_trait;
    use axum::http::HeaderValue;

    use crate::repos::memory::MemoryUserDirectory;
    use crate::services::identity::verifier::VerifiedIdentity;

    /// Verifier fake: known tokens map to emails, `slow` never answers, `down` is unavailable.
    pub(crate) struct FakeVerifier {
        tokens: HashMap<String, String>,
    }

    impl FakeVerifier {
        pub(crate) fn new(pairs: &[(&str, &str)]) -> Self {
            Self {
                tokens: pairs
                    .iter()
                    .map(|(t, e)| (t.to_string(), e.to_string()))
                    .collect(),
            }
        }
    }

    #[async_trait]
    impl IdentityVerifier for FakeVerifier {
        async fn verify(&self, token: &str) -> Result<VerifiedIdentity, VerifyError> {
            match token {
                "slow" => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    Err(VerifyError::invalid("unreachable"))
                }
                "down" => Err(VerifyError::unavailable("key source down")),
                _ => self
                    .tokens
                    .get(token)
                    .map(|email| VerifiedIdentity {
                        email: email.clone(),
                        subject: format!("sub-{email}"),
                    })
                    .ok_or_else(|| VerifyError::invalid("unknown token")),
            }
        }
    }

    pub(crate) fn gate_with(
        directory: MemoryUserDirectory,
        promotion: PromotionMode,
    ) -> AccessGate {
        AccessGate::new(
            Arc::new(FakeVerifier::new(&[
                ("alice-token", "alice@example.com"),
                ("carol-token", "carol@example.com"),
                ("dave-token", "dave@example.com"),
            ])),
            Arc::new(directory),
            Duration::from_millis(50),
            promotion,
        )
    }

    fn headers(authorization: Option<&str>) -> HeaderMap {
        let mut headers = HeaderMap::new();
        if let Some(value) = authorization {
            headers.insert(header::AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        }
        headers
    }

    fn verified(email: &str) -> CallerIdentity {
        CallerIdentity::Verified {
            email: email.to_string(),
        }
    }

    #[test]
    fn bearer_prefix_is_exact() {
        assert_eq!(bearer_token(&headers(Some("Bearer abc"))), Some("abc"));
        assert_eq!(bearer_token(&headers(Some("bearer abc"))), None);
        assert_eq!(bearer_token(&headers(Some("Basic abc"))), None);
        assert_eq!(bearer_token(&headers(Some("Bearer "))), None);
        assert_eq!(bearer_token(&headers(None)), None);
    }

    #[tokio::test]
    async fn authenticate_resolves_or_falls_back_to_anonymous() {
        let gate = gate_with(MemoryUserDirectory::new(), PromotionMode::Upsert);

        assert_eq!(
            gate.authenticate(&headers(None)).await.unwrap(),
            CallerIdentity::Anonymous
        );
        assert_eq!(
            gate.authenticate(&headers(Some("Token alice-token")))
                .await
                .unwrap(),
            CallerIdentity::Anonymous
        );
        assert_eq!(
            gate.authenticate(&headers(Some("Bearer alice-token")))
                .await
                .unwrap(),
            verified("alice@example.com")
        );
        assert_eq!(
            gate.authenticate(&headers(Some("Bearer forged")))
                .await
                .unwrap(),
            CallerIdentity::Anonymous
        );
    }

    #[tokio::test]
    async fn authenticate_surfaces_unavailable_verifier() {
        let gate = gate_with(MemoryUserDirectory::new(), PromotionMode::Upsert);

        let err = gate
            .authenticate(&headers(Some("Bearer down")))
            .await
            .unwrap_err();
        assert!(matches!(err, GateError::VerifierUnavailable(_)));

        let err = gate
            .authenticate(&headers(Some("Bearer slow")))
            .await
            .unwrap_err();
        assert!(matches!(err, GateError::VerifierUnavailable(_)));
    }

    #[test]
    fn require_identity_rejects_only_anonymous() {
        let gate = gate_with(MemoryUserDirectory::new(), PromotionMode::Upsert);
        assert!(matches!(
            gate.require_identity(&CallerIdentity::Anonymous),
            Err(GateError::Forbidden)
        ));
        let dave = CallerIdentity::Verified {
            email: "dave@example.com".into(),
        };
        assert!(gate.require_identity(&dave).is_ok());
    }

    #[tokio::test]
    async fn check_admin_covers_every_case() {
        let directory = MemoryUserDirectory::new();
        directory.put("alice@example.com", Some("admin")).await;
        directory.put("carol@example.com", Some("user")).await;
        let gate = gate_with(directory, PromotionMode::Upsert);

        let cases = [
            (CallerIdentity::Anonymous, AdminCheck::NoIdentity),
            (verified("nobody@example.com"), AdminCheck::IdentityNotFound),
            (verified("carol@example.com"), AdminCheck::IdentityNotAdmin),
            (verified("alice@example.com"), AdminCheck::IdentityIsAdmin),
        ];
        for (identity, expected) in cases {
            assert_eq!(gate.check_admin(&identity).await.unwrap(), expected);
        }
    }

    #[tokio::test]
    async fn no_identity_is_forbidden_and_leaves_directory_alone() {
        let directory = MemoryUserDirectory::new();
        directory.put("alice@example.com", Some("admin")).await;
        let gate = gate_with(directory.clone(), PromotionMode::Upsert);

        let err = gate
            .authorize_admin_mutation(&CallerIdentity::Anonymous, "bob@example.com")
            .await
            .unwrap_err();
        assert!(matches!(err, GateError::Forbidden));
        assert!(directory.find_by_email("bob@example.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn non_admin_gets_a_determinate_denial() {
        let directory = MemoryUserDirectory::new();
        directory.put("carol@example.com", Some("user")).await;
        directory.put("bob@example.com", None).await;
        let gate = gate_with(directory.clone(), PromotionMode::Upsert);

        for caller in ["carol@example.com", "nobody@example.com"] {
            let err = gate
                .authorize_admin_mutation(&verified(caller), "bob@example.com")
                .await
                .unwrap_err();
            assert!(matches!(err, GateError::NotAuthorized));
        }
        let bob = directory.find_by_email("bob@example.com").await.unwrap().unwrap();
        assert_eq!(bob.role, None);
    }

    #[tokio::test]
    async fn admin_promotion_is_idempotent() {
        let directory = MemoryUserDirectory::new();
        directory.put("alice@example.com", Some("admin")).await;
        let gate = gate_with(directory.clone(), PromotionMode::Upsert);
        let alice = verified("alice@example.com");

        let first = gate
            .authorize_admin_mutation(&alice, "bob@example.com")
            .await
            .unwrap();
        assert_eq!(first.upserted_count, 1);

        let second = gate
            .authorize_admin_mutation(&alice, "bob@example.com")
            .await
            .unwrap();
        assert_eq!((second.matched_count, second.modified_count), (1, 0));

        let bob = directory.find_by_email("bob@example.com").await.unwrap().unwrap();
        assert!(bob.is_admin());
    }

    #[tokio::test]
    async fn existing_mode_refuses_unknown_target() {
        let directory = MemoryUserDirectory::new();
        directory.put("alice@example.com", Some("admin")).await;
        let gate = gate_with(directory.clone(), PromotionMode::Existing);

        let err = gate
            .authorize_admin_mutation(&verified("alice@example.com"), "ghost@example.com")
            .await
            .unwrap_err();
        assert!(matches!(err, GateError::TargetNotFound(_)));
        assert!(directory.find_by_email("ghost@example.com").await.unwrap().is_none());
    }
}
