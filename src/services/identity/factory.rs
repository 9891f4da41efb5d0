/// Factory: build the identity verifier from application `Config`.
use std::sync::Arc;

use crate::config::{IdentityConfig, IdentityKeySource};
use crate::services::identity::{IdentityVerifier, JwtIdentityVerifier};

pub fn build_identity_verifier(config: &IdentityConfig) -> anyhow::Result<Arc<dyn IdentityVerifier>> {
    let verifier = match &config.keys {
        IdentityKeySource::Pem(pem) => JwtIdentityVerifier::from_pem(
            pem,
            config.algorithm,
            &config.issuer,
            &config.audience,
            config.leeway_seconds,
        ),
        IdentityKeySource::Jwks { url, cache_ttl } => JwtIdentityVerifier::from_jwks(
            url,
            *cache_ttl,
            config.verify_timeout,
            config.algorithm,
            &config.issuer,
            &config.audience,
            config.leeway_seconds,
        ),
    }
    .map_err(|e| anyhow::anyhow!("identity verifier: {e}"))?;

    tracing::info!(
        issuer = %config.issuer,
        audience = %config.audience,
        algorithm = ?config.algorithm,
        "identity verifier ready"
    );

    Ok(Arc::new(verifier))
}
