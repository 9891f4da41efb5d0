/*
 * Responsibility
 * - Orders の request DTO
 */
use serde::Deserialize;
use serde_json::Value;

use crate::repos::outcome::Document;

pub const DEFAULT_ORDER_STATUS: &str = "pending";

#[derive(Debug, Default, Deserialize)]
pub struct OrderQuery {
    pub email: Option<String>,
}

impl OrderQuery {
    pub fn filter(&self) -> Document {
        let mut filter = Document::new();
        if let Some(email) = self.email.as_deref().map(str::trim).filter(|e| !e.is_empty()) {
            filter.insert("email".to_string(), Value::String(email.to_string()));
        }
        filter
    }
}

/// Fills in a `pending` status when the client didn't send one.
pub fn with_default_status(mut order: Document) -> Document {
    order
        .entry("status")
        .or_insert_with(|| Value::String(DEFAULT_ORDER_STATUS.to_string()));
    order
}

#[derive(Debug, Deserialize)]
pub struct UpdateOrderStatusRequest {
    pub status: String,
}

impl UpdateOrderStatusRequest {
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.status.trim().is_empty() {
            return Err("status cannot be empty");
        }
        Ok(())
    }

    pub fn into_patch(self) -> Document {
        let mut patch = Document::new();
        patch.insert("status".to_string(), Value::String(self.status.trim().to_string()));
        patch
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn status_defaults_to_pending_but_is_not_overwritten() {
        let order = with_default_status(Document::new());
        assert_eq!(order["status"], "pending");

        let shipped = json!({"status": "shipped"}).as_object().cloned().unwrap();
        assert_eq!(with_default_status(shipped)["status"], "shipped");
    }

    #[test]
    fn blank_email_query_matches_everything() {
        let q = OrderQuery {
            email: Some(" ".into()),
        };
        assert!(q.filter().is_empty());
    }
}
