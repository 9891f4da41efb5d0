//! CORS policy for the browser storefront.
//!
//! Policy:
//! - Development: any origin, no credentials.
//! - Production: exact-match allowlist from `CORS_ALLOWED_ORIGINS`, no credentials.
//!   An empty allowlist allows no origin.

use std::time::Duration;

use axum::Router;
use axum::http::{HeaderName, HeaderValue, Method, header};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

use crate::config::{AppEnv, Config};

const PREFLIGHT_MAX_AGE: Duration = Duration::from_secs(60 * 10);

pub fn layer(app_env: AppEnv, allowed_origins: &[String]) -> CorsLayer {
    let allow_origin = if app_env.is_production() {
        let allowed: Vec<HeaderValue> = allowed_origins
            .iter()
            .filter_map(|s| HeaderValue::from_str(s).ok())
            .collect();
        AllowOrigin::predicate(move |origin: &HeaderValue, _req| allowed.contains(origin))
    } else {
        AllowOrigin::from(Any)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            header::ACCEPT,
            HeaderName::from_static("x-request-id"),
        ])
        .max_age(PREFLIGHT_MAX_AGE)
}

/// Do not combine a wildcard origin with `allow_credentials(true)`.
pub fn apply(router: Router, config: &Config) -> Router {
    router.layer(layer(config.app_env, &config.cors_allowed_origins))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::Request, routing::get};
    use tower::ServiceExt;

    async fn allow_origin_for(app_env: AppEnv, origin: &str) -> Option<String> {
        let allowed = vec!["https://shop.example.com".to_string()];
        let app = Router::new()
            .route("/cars", get(|| async { "[]" }))
            .layer(layer(app_env, &allowed));

        let res = app
            .oneshot(
                Request::builder()
                    .uri("/cars")
                    .header(header::ORIGIN, origin)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        res.headers()
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .map(|v| v.to_str().unwrap().to_string())
    }

    #[tokio::test]
    async fn development_allows_any_origin() {
        let got = allow_origin_for(AppEnv::Development, "http://localhost:3000").await;
        assert_eq!(got.as_deref(), Some("*"));
    }

    #[tokio::test]
    async fn production_only_echoes_allowlisted_origins() {
        let ok = allow_origin_for(AppEnv::Production, "https://shop.example.com").await;
        assert_eq!(ok.as_deref(), Some("https://shop.example.com"));

        let denied = allow_origin_for(AppEnv::Production, "https://evil.example.com").await;
        assert_eq!(denied, None);
    }
}
