//! Bearer token → `CallerIdentity` を extensions に入れる
//!
//! - 認証 (authentication) だけを行い、拒否はしない (fail-open)。
//!   検証に失敗したトークンは Anonymous として下流に流す。
//! - 認可 (authorization) は handler 側で AccessGate を使って行う。
//! - verifier 自体が応答できない場合 (timeout / JWKS 取得失敗) のみ 503 を返す。

use axum::{
    Router,
    body::Body,
    extract::State,
    http::Request,
    middleware::{self, Next},
    response::Response,
};

use crate::error::AppError;
use crate::state::AppState;

/// Router 全体に認証 middleware を適用する。
///
/// 例：
/// ```ignore
/// let router = api::routes();
/// let router = middleware::auth::access::apply(router, state.clone());
/// ```
pub fn apply(router: Router<AppState>, state: AppState) -> Router<AppState> {
    // axum 0.8 の from_fn は State extractor を受け取れないため、`from_fn_with_state` で明示的に state を渡す
    router.layer(middleware::from_fn_with_state(state, access_middleware))
}

async fn access_middleware(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let caller = state.gate.authenticate(req.headers()).await?;

    // middleware → extractor への受け渡し
    req.extensions_mut().insert(caller);

    Ok(next.run(req).await)
}
