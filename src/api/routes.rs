/*
 * Responsibility
 * - URL 構造を定義
 * - /, /health, /cars, /reviews, /orders, /users
 * - 認証 middleware は app.rs で Router 全体に掛ける (fail-open なので匿名アクセスは通る)
 */
use axum::{
    Router,
    routing::{delete, get, put},
};

use crate::state::AppState;

use crate::api::handlers::{
    cars::{create_car, delete_car, get_car, list_cars},
    health::{health, root},
    orders::{create_order, delete_order, list_orders, update_order_status},
    reviews::{create_review, list_reviews},
    users::{create_user, get_admin_status, list_users, make_admin, upsert_user},
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/cars", get(list_cars).post(create_car))
        .route("/cars/buying/{car_id}", get(get_car))
        .route("/cars/{car_id}", delete(delete_car))
        .route("/reviews", get(list_reviews).post(create_review))
        .route("/orders", get(list_orders).post(create_order))
        .route(
            "/orders/{order_id}",
            put(update_order_status).delete(delete_order),
        )
        .route(
            "/users",
            get(list_users).post(create_user).put(upsert_user),
        )
        .route("/users/admin", put(make_admin))
        .route("/users/{email}", get(get_admin_status))
}
