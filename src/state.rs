/*
 * Responsibility
 * - Router に紐づける共有コンテキスト (AppState)
 *   - gate: AccessGate, users: UserDirectory, cars/reviews/orders: DocumentStore
 * - Clone 前提で持つ (内部は Arc/Clone cheap)
 */
use std::sync::Arc;

use crate::repos::{document_repo::DocumentStore, user_repo::UserDirectory};
use crate::services::access_gate::AccessGate;

#[derive(Clone)]
pub struct AppState {
    pub gate: Arc<AccessGate>,
    pub users: Arc<dyn UserDirectory>,
    pub cars: Arc<dyn DocumentStore>,
    pub reviews: Arc<dyn DocumentStore>,
    pub orders: Arc<dyn DocumentStore>,
}

impl AppState {
    pub fn new(
        gate: Arc<AccessGate>,
        users: Arc<dyn UserDirectory>,
        cars: Arc<dyn DocumentStore>,
        reviews: Arc<dyn DocumentStore>,
        orders: Arc<dyn DocumentStore>,
    ) -> Self {
        Self {
            gate,
            users,
            cars,
            reviews,
            orders,
        }
    }
}
