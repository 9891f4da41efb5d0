use std::time::{Duration, Instant};

use async_trait::async_trait;
use jsonwebtoken::{Algorithm, DecodingKey, Validation, jwk::JwkSet};
use serde::Deserialize;
use tokio::sync::RwLock;

use crate::services::identity::verifier::{IdentityVerifier, VerifiedIdentity, VerifyError};

// An unknown `kid` triggers a refetch, but not more often than this.
const MIN_JWKS_REFRESH: Duration = Duration::from_secs(30);

/// ID token claims we read. Signature, `exp`, `iss`, `aud` are checked by `Validation`.
#[derive(Debug, Clone, Deserialize)]
struct IdTokenClaims {
    sub: String,
    #[serde(default)]
    email: Option<String>,
}

struct CachedKeys {
    set: JwkSet,
    fetched_at: Instant,
}

/// Remote JSON Web Key Set, cached for `ttl`.
struct JwksCache {
    url: String,
    ttl: Duration,
    http: reqwest::Client,
    cached: RwLock<Option<CachedKeys>>,
}

impl JwksCache {
    async fn fetch(&self) -> Result<JwkSet, VerifyError> {
        let res = self
            .http
            .get(&self.url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| VerifyError::unavailable(format!("jwks fetch failed: {e}")))?;

        res.json::<JwkSet>()
            .await
            .map_err(|e| VerifyError::unavailable(format!("jwks body invalid: {e}")))
    }

    async fn key_for(&self, kid: &str) -> Result<DecodingKey, VerifyError> {
        {
            let cached = self.cached.read().await;
            if let Some(keys) = cached.as_ref() {
                let age = keys.fetched_at.elapsed();
                if age < self.ttl {
                    if let Some(jwk) = keys.set.find(kid) {
                        return Ok(DecodingKey::from_jwk(jwk)?);
                    }
                    if age < MIN_JWKS_REFRESH {
                        return Err(VerifyError::invalid("unknown key id"));
                    }
                }
            }
        }

        let set = self.fetch().await?;
        tracing::debug!(url = %self.url, keys = set.keys.len(), "jwks refreshed");

        let key = set
            .find(kid)
            .map(DecodingKey::from_jwk)
            .transpose()?
            .ok_or_else(|| VerifyError::invalid("unknown key id"));

        *self.cached.write().await = Some(CachedKeys {
            set,
            fetched_at: Instant::now(),
        });

        key
    }
}

enum KeyResolver {
    Static(DecodingKey),
    Jwks(JwksCache),
}

/// JWT ID-token verifier (jsonwebtoken).
///
/// - Key material is not printed by Debug.
pub struct JwtIdentityVerifier {
    validation: Validation,
    keys: KeyResolver,
}

impl std::fmt::Debug for JwtIdentityVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let source = match &self.keys {
            KeyResolver::Static(_) => "pem",
            KeyResolver::Jwks(_) => "jwks",
        };
        f.debug_struct("JwtIdentityVerifier")
            .field("validation", &self.validation)
            .field("keys", &source)
            .finish()
    }
}

fn validation(algorithm: Algorithm, issuer: &str, audience: &str, leeway: u64) -> Validation {
    let mut validation = Validation::new(algorithm);
    validation.set_issuer(&[issuer]);
    validation.set_audience(&[audience]);
    validation.set_required_spec_claims(&["exp", "iss", "aud", "sub"]);
    validation.leeway = leeway;
    validation
}

fn decoding_key_from_pem(algorithm: Algorithm, pem: &str) -> Result<DecodingKey, String> {
    let bytes = pem.as_bytes();
    let key = match algorithm {
        Algorithm::EdDSA => DecodingKey::from_ed_pem(bytes),
        Algorithm::ES256 | Algorithm::ES384 => DecodingKey::from_ec_pem(bytes),
        Algorithm::RS256
        | Algorithm::RS384
        | Algorithm::RS512
        | Algorithm::PS256
        | Algorithm::PS384
        | Algorithm::PS512 => DecodingKey::from_rsa_pem(bytes),
        other => return Err(format!("unsupported algorithm for public key: {other:?}")),
    };
    key.map_err(|e| format!("invalid public key pem: {}", e))
}

impl JwtIdentityVerifier {
    pub fn from_pem(
        pem: &str,
        algorithm: Algorithm,
        issuer: &str,
        audience: &str,
        leeway_seconds: u64,
    ) -> Result<Self, String> {
        let key = decoding_key_from_pem(algorithm, pem)?;

        Ok(Self {
            validation: validation(algorithm, issuer, audience, leeway_seconds),
            keys: KeyResolver::Static(key),
        })
    }

    pub fn from_jwks(
        url: &str,
        cache_ttl: Duration,
        fetch_timeout: Duration,
        algorithm: Algorithm,
        issuer: &str,
        audience: &str,
        leeway_seconds: u64,
    ) -> Result<Self, String> {
        let http = reqwest::Client::builder()
            .timeout(fetch_timeout)
            .build()
            .map_err(|e| format!("http client: {}", e))?;

        Ok(Self {
            validation: validation(algorithm, issuer, audience, leeway_seconds),
            keys: KeyResolver::Jwks(JwksCache {
                url: url.to_string(),
                ttl: cache_ttl,
                http,
                cached: RwLock::new(None),
            }),
        })
    }

    async fn decoding_key(&self, token: &str) -> Result<DecodingKey, VerifyError> {
        match &self.keys {
            KeyResolver::Static(key) => Ok(key.clone()),
            KeyResolver::Jwks(cache) => {
                let header = jsonwebtoken::decode_header(token)?;
                let kid = header
                    .kid
                    .filter(|k| !k.is_empty())
                    .ok_or_else(|| VerifyError::invalid("missing key id"))?;
                cache.key_for(&kid).await
            }
        }
    }
}

#[async_trait]
impl IdentityVerifier for JwtIdentityVerifier {
    async fn verify(&self, token: &str) -> Result<VerifiedIdentity, VerifyError> {
        let key = self.decoding_key(token).await?;
        let data = jsonwebtoken::decode::<IdTokenClaims>(token, &key, &self.validation)?;
        let claims = data.claims;

        if claims.sub.trim().is_empty() {
            return Err(VerifyError::invalid("empty 'sub' claim"));
        }
        let email = claims
            .email
            .filter(|e| !e.trim().is_empty())
            .ok_or_else(|| VerifyError::invalid("missing 'email' claim"))?;

        Ok(VerifiedIdentity {
            email,
            subject: claims.sub,
        })
    }
}
