//! Authentication models for Bazaar

use serde::{Deserialize, Serialize};
use sqlx::types::chrono::{DateTime, Utc};
use uuid::Uuid;
use validator::Validate;

use super::{User, UserRole};

/// Mobile numbers: ten digits, first digit 6-9
fn validate_phone(phone: &str) -> Result<(), validator::ValidationError> {
    let valid = phone.len() == 10
        && phone.chars().all(|c| c.is_ascii_digit())
        && matches!(phone.as_bytes()[0], b'6'..=b'9');
    if valid {
        Ok(())
    } else {
        Err(validator::ValidationError::new("phone"))
    }
}

/// Request to create a buyer account
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(length(min = 2, max = 100))]
    pub name: String,
    #[validate(custom = "validate_phone")]
    pub phone: String,
    #[validate(length(min = 8, max = 128))]
    pub password: String,
}

/// Phone + password login
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1))]
    pub phone: String,
    #[validate(length(min = 1))]
    pub password: String,
}

/// User response (sanitized for API)
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct UserResponse {
    pub id: Uuid,
    pub name: String,
    pub phone: String,
    pub role: UserRole,
    pub loyalty_points: i64,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            name: user.name,
            phone: user.phone,
            role: user.role,
            loyalty_points: user.loyalty_points,
            created_at: user.created_at,
        }
    }
}

/// Issued session, returned by login next to the cookie
#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub message: String,
    pub token: String,
    pub expires_in: i64,
    pub user: UserResponse,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LogoutAllResponse {
    pub token_version: i32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_validation() {
        let ok = RegisterRequest {
            name: "Asha Rao".to_string(),
            phone: "9876543210".to_string(),
            password: "correct-horse".to_string(),
        };
        assert!(ok.validate().is_ok());

        let bad_phone = RegisterRequest {
            phone: "1234567890".to_string(),
            ..ok
        };
        assert!(bad_phone.validate().is_err());
    }

    #[test]
    fn test_phone_rules() {
        assert!(validate_phone("6000000000").is_ok());
        assert!(validate_phone("98765").is_err());
        assert!(validate_phone("98765abcde").is_err());
        assert!(validate_phone("5876543210").is_err());
    }
}
