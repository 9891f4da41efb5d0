use std::convert::Infallible;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::services::access_gate::CallerIdentity;
use crate::state::AppState;

/// Handler で CallerIdentity を受け取るための extractor
///
/// middleware が request.extensions() に insert 済みである前提。
/// 見つからない場合は Anonymous（middleware 未適用の route でも拒否はしない）。
pub struct Caller(pub CallerIdentity);

impl FromRequestParts<AppState> for Caller {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let identity = parts
            .extensions
            .get::<CallerIdentity>()
            .cloned()
            .unwrap_or(CallerIdentity::Anonymous);

        Ok(Caller(identity))
    }
}
