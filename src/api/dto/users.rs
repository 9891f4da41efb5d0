/*
 * Responsibility
 * - Users の request/response DTO
 * - email 以外の項目は profile としてそのまま保存する
 */
use serde::{Deserialize, Serialize};

use crate::repos::outcome::Document;

#[derive(Debug, Deserialize)]
pub struct SaveUserRequest {
    pub email: String,
    #[serde(flatten)]
    pub profile: Document,
}

impl SaveUserRequest {
    pub fn validate(&self) -> Result<(), &'static str> {
        validate_email(&self.email)
    }
}

#[derive(Debug, Deserialize)]
pub struct MakeAdminRequest {
    pub email: String,
}

impl MakeAdminRequest {
    pub fn validate(&self) -> Result<(), &'static str> {
        validate_email(&self.email)
    }
}

fn validate_email(email: &str) -> Result<(), &'static str> {
    let email = email.trim();
    if email.is_empty() {
        return Err("email is required");
    }
    if email.len() > 320 {
        return Err("email must be <= 320 chars");
    }
    Ok(())
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct AdminStatusResponse {
    pub admin: bool,
}
