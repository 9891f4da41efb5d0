/*
 * Responsibility
 * - 環境変数や設定の読み込み (PORT, DATABASE_URL, CORS 許可、Identity 検証設定など)
 * - 設定値のバリデーション (不足なら起動失敗)
 */
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use jsonwebtoken::Algorithm;
use thiserror::Error;

const GOOGLE_SECURE_TOKEN_ISSUER: &str = "https://securetoken.google.com";
const GOOGLE_SECURE_TOKEN_JWKS_URL: &str =
    "https://www.googleapis.com/service_accounts/v1/jwk/securetoken@system.gserviceaccount.com";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnv {
    Development,
    Production,
}

impl AppEnv {
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.unwrap_or("development").to_ascii_lowercase().as_str() {
            "production" | "prod" => Self::Production,
            _ => Self::Development,
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

/// What `PUT /users/admin` does when the target email has no record yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromotionMode {
    /// Create a bare `{email, role: "admin"}` record.
    Upsert,
    /// Leave the directory alone and answer 404.
    Existing,
}

impl PromotionMode {
    pub fn upserts(&self) -> bool {
        matches!(self, Self::Upsert)
    }
}

impl FromStr for PromotionMode {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "upsert" => Ok(Self::Upsert),
            "existing" => Ok(Self::Existing),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing configuration: {0}")]
    Missing(&'static str),
    #[error("invalid configuration: {0}")]
    Invalid(&'static str),
}

/// Where the identity verifier gets its public keys from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentityKeySource {
    Pem(String),
    Jwks { url: String, cache_ttl: Duration },
}

#[derive(Debug, Clone)]
pub struct IdentityConfig {
    pub issuer: String,
    pub audience: String,
    pub algorithm: Algorithm,
    pub keys: IdentityKeySource,
    pub leeway_seconds: u64,
    pub verify_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub addr: SocketAddr,
    pub app_env: AppEnv,

    pub database_url: Option<String>,
    pub database_max_connections: u32,

    pub cors_allowed_origins: Vec<String>,
    pub request_timeout: Duration,
    pub request_body_limit_bytes: usize,

    pub identity: IdentityConfig,

    pub promotion_mode: PromotionMode,
    pub bootstrap_admin_email: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup (the process env in production, a map in tests).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let port: u16 = parse_or(non_empty("PORT"), "PORT", 5000)?;

        let addr: SocketAddr = SocketAddr::from_str(&format!("0.0.0.0:{}", port))
            .map_err(|_| ConfigError::Invalid("PORT"))?;

        let app_env = AppEnv::parse(lookup("APP_ENV").as_deref());

        let database_url = non_empty("DATABASE_URL");
        if database_url.is_none() && app_env.is_production() {
            return Err(ConfigError::Missing("DATABASE_URL"));
        }

        let database_max_connections =
            parse_or(non_empty("DATABASE_MAX_CONNECTIONS"), "DATABASE_MAX_CONNECTIONS", 5)?;

        let cors_allowed_origins = lookup("CORS_ALLOWED_ORIGINS")
            .unwrap_or_default()
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>();

        let request_timeout = Duration::from_secs(parse_or(
            non_empty("REQUEST_TIMEOUT_SECONDS"),
            "REQUEST_TIMEOUT_SECONDS",
            30,
        )?);

        let request_body_limit_bytes = parse_or(
            non_empty("REQUEST_BODY_LIMIT_BYTES"),
            "REQUEST_BODY_LIMIT_BYTES",
            1024 * 1024,
        )?;

        let identity = identity_from_lookup(&non_empty)?;

        let promotion_mode = match non_empty("ADMIN_PROMOTION_MODE") {
            Some(raw) => raw
                .parse()
                .map_err(|_| ConfigError::Invalid("ADMIN_PROMOTION_MODE"))?,
            None => PromotionMode::Upsert,
        };

        let bootstrap_admin_email = non_empty("BOOTSTRAP_ADMIN_EMAIL").map(|s| s.trim().to_string());

        Ok(Self {
            addr,
            app_env,
            database_url,
            database_max_connections,
            cors_allowed_origins,
            request_timeout,
            request_body_limit_bytes,
            identity,
            promotion_mode,
            bootstrap_admin_email,
        })
    }
}

/// Unset -> `default`; set but unparsable -> `ConfigError::Invalid(key)`.
fn parse_or<T: FromStr>(raw: Option<String>, key: &'static str, default: T) -> Result<T, ConfigError> {
    match raw {
        Some(v) => v.trim().parse().map_err(|_| ConfigError::Invalid(key)),
        None => Ok(default),
    }
}

fn identity_from_lookup<F>(non_empty: &F) -> Result<IdentityConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    // Google secure-token (Firebase) ID tokens: issuer/audience/keys follow from the project id.
    let project_id = non_empty("IDENTITY_PROJECT_ID");

    let issuer = non_empty("IDENTITY_ISSUER")
        .or_else(|| {
            project_id
                .as_ref()
                .map(|id| format!("{}/{}", GOOGLE_SECURE_TOKEN_ISSUER, id))
        })
        .ok_or(ConfigError::Missing("IDENTITY_ISSUER"))?;

    let audience = non_empty("IDENTITY_AUDIENCE")
        .or_else(|| project_id.clone())
        .ok_or(ConfigError::Missing("IDENTITY_AUDIENCE"))?;

    let algorithm = match non_empty("IDENTITY_ALGORITHM") {
        Some(raw) => Algorithm::from_str(raw.trim())
            .map_err(|_| ConfigError::Invalid("IDENTITY_ALGORITHM"))?,
        None => Algorithm::RS256,
    };
    if matches!(
        algorithm,
        Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512
    ) {
        // shared-secret tokens can't come from an external issuer
        return Err(ConfigError::Invalid("IDENTITY_ALGORITHM"));
    }

    let cache_ttl = Duration::from_secs(parse_or(
        non_empty("IDENTITY_JWKS_CACHE_SECONDS"),
        "IDENTITY_JWKS_CACHE_SECONDS",
        3600,
    )?);

    let keys = if let Some(pem) = non_empty("IDENTITY_PUBLIC_KEY_PEM") {
        IdentityKeySource::Pem(pem.replace("\\n", "\n"))
    } else if let Some(url) = non_empty("IDENTITY_JWKS_URL") {
        IdentityKeySource::Jwks { url, cache_ttl }
    } else if project_id.is_some() {
        IdentityKeySource::Jwks {
            url: GOOGLE_SECURE_TOKEN_JWKS_URL.to_string(),
            cache_ttl,
        }
    } else {
        return Err(ConfigError::Missing("IDENTITY_PUBLIC_KEY_PEM"));
    };

    let leeway_seconds = parse_or(
        non_empty("IDENTITY_LEEWAY_SECONDS"),
        "IDENTITY_LEEWAY_SECONDS",
        60,
    )?;

    let verify_timeout = Duration::from_millis(parse_or(
        non_empty("IDENTITY_VERIFY_TIMEOUT_MS"),
        "IDENTITY_VERIFY_TIMEOUT_MS",
        5000,
    )?);

    Ok(IdentityConfig {
        issuer,
        audience,
        algorithm,
        keys,
        leeway_seconds,
        verify_timeout,
    })
}
