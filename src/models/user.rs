//! User data models and API request/response types.
//!
//! This module defines:
//! - `User`: Database entity representing a registered identity
//! - Request types for signup, signin and profile updates
//! - `UserProfile`: Public view of a user (credential excluded)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::validation::{
    USERNAME_MAX_LEN, USERNAME_MIN_LEN, Validate, check_length, check_name, check_password,
    trim_in_place,
};
use crate::error::AppError;

/// Represents a user record from the database.
///
/// # Database Table
///
/// Maps to the `users` table. Each user owns exactly one row in `accounts`,
/// created in the same database transaction as the user itself.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct User {
    /// Unique identifier, also the owner identity of the user's account
    pub id: Uuid,

    /// Login name (unique, case-sensitive)
    pub username: String,

    /// Argon2id PHC string; the plaintext password is never stored
    pub password_hash: String,

    pub first_name: String,

    pub last_name: String,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

/// Fields needed to insert a new user.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
}

/// Partial profile update as applied by the store.
///
/// `None` leaves the column untouched.
#[derive(Debug, Clone, Default)]
pub struct ProfileChanges {
    pub password_hash: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

/// Request body for `POST /api/v1/user/signup`.
///
/// # JSON Example
///
/// ```json
/// {
///   "username": "alice@example.com",
///   "firstName": "Alice",
///   "lastName": "Liddell",
///   "password": "rabbit-hole"
/// }
/// ```
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignupRequest {
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub password: String,
}

impl Validate for SignupRequest {
    fn validate(&self) -> Result<(), AppError> {
        check_length("username", &self.username, USERNAME_MIN_LEN, USERNAME_MAX_LEN)?;
        check_name("firstName", &self.first_name)?;
        check_name("lastName", &self.last_name)?;
        check_password(&self.password)
    }

    fn normalize(&mut self) {
        trim_in_place(&mut self.username);
        trim_in_place(&mut self.first_name);
        trim_in_place(&mut self.last_name);
    }
}

/// Request body for `POST /api/v1/user/signin`.
#[derive(Debug, Deserialize)]
pub struct SigninRequest {
    pub username: String,
    pub password: String,
}

impl Validate for SigninRequest {
    fn validate(&self) -> Result<(), AppError> {
        check_length("username", &self.username, USERNAME_MIN_LEN, USERNAME_MAX_LEN)?;
        if self.password.is_empty() {
            return Err(AppError::Validation("password is required".to_string()));
        }
        Ok(())
    }

    fn normalize(&mut self) {
        trim_in_place(&mut self.username);
    }
}

/// Request body for `PUT /api/v1/user`.
///
/// Every field is optional; unknown fields are rejected so a client cannot
/// attempt to rewrite its username or identity.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UpdateProfileRequest {
    pub password: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

impl Validate for UpdateProfileRequest {
    fn validate(&self) -> Result<(), AppError> {
        if let Some(password) = &self.password {
            check_password(password)?;
        }
        if let Some(first_name) = &self.first_name {
            check_name("firstName", first_name)?;
        }
        if let Some(last_name) = &self.last_name {
            check_name("lastName", last_name)?;
        }
        Ok(())
    }

    fn normalize(&mut self) {
        if let Some(first_name) = self.first_name.as_mut() {
            trim_in_place(first_name);
        }
        if let Some(last_name) = self.last_name.as_mut() {
            trim_in_place(last_name);
        }
    }
}

/// Query string for `GET /api/v1/user/bulk`.
#[derive(Debug, Default, Deserialize)]
pub struct BulkQuery {
    #[serde(default)]
    pub filter: String,
}

/// Public view of a user.
///
/// # JSON Example
///
/// ```json
/// {
///   "id": "550e8400-e29b-41d4-a716-446655440000",
///   "username": "alice@example.com",
///   "firstName": "Alice",
///   "lastName": "Liddell"
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: Uuid,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
}

/// Removes the credential hash and timestamps.
impl From<User> for UserProfile {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            first_name: user.first_name,
            last_name: user.last_name,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BulkResponse {
    pub users: Vec<UserProfile>,
}

/// Response for signup.
#[derive(Debug, Serialize, Deserialize)]
pub struct SignupResponse {
    pub message: String,
    pub token: String,
}

/// Response for signin.
#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    pub token: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn signup(username: &str, first: &str, last: &str, password: &str) -> SignupRequest {
        SignupRequest {
            username: username.to_string(),
            first_name: first.to_string(),
            last_name: last.to_string(),
            password: password.to_string(),
        }
    }

    #[rstest]
    #[case::valid(signup("alice", "Alice", "Liddell", "secret1"), true)]
    #[case::username_too_short(signup("al", "Alice", "Liddell", "secret1"), false)]
    #[case::username_too_long(signup(&"a".repeat(51), "Alice", "Liddell", "secret1"), false)]
    #[case::username_at_max(signup(&"a".repeat(50), "Alice", "Liddell", "secret1"), true)]
    #[case::password_too_short(signup("alice", "Alice", "Liddell", "12345"), false)]
    #[case::empty_first_name(signup("alice", "", "Liddell", "secret1"), false)]
    #[case::last_name_too_long(signup("alice", "Alice", &"l".repeat(51), "secret1"), false)]
    fn test_signup_validation(#[case] request: SignupRequest, #[case] ok: bool) {
        assert_eq!(request.validate().is_ok(), ok);
    }

    #[test]
    fn test_signup_normalize_trims_before_length_check() {
        let mut request = signup("  al  ", " Alice ", "Liddell", "secret1");
        request.normalize();

        assert_eq!(request.username, "al");
        assert_eq!(request.first_name, "Alice");
        assert!(matches!(request.validate(), Err(AppError::Validation(_))));
    }

    #[test]
    fn test_update_profile_allows_empty_body() {
        assert!(UpdateProfileRequest::default().validate().is_ok());
    }

    #[test]
    fn test_update_profile_rejects_short_password() {
        let request = UpdateProfileRequest {
            password: Some("abc".to_string()),
            ..Default::default()
        };
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_update_profile_rejects_unknown_fields() {
        let parsed = serde_json::from_str::<UpdateProfileRequest>(r#"{"username":"mallory"}"#);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_profile_serializes_camel_case_without_credential() {
        let user = User {
            id: Uuid::new_v4(),
            username: "alice".to_string(),
            password_hash: "$argon2id$v=19$...".to_string(),
            first_name: "Alice".to_string(),
            last_name: "Liddell".to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let json = serde_json::to_value(UserProfile::from(user)).unwrap();
        assert_eq!(json["firstName"], "Alice");
        assert_eq!(json["lastName"], "Liddell");
        assert!(json.get("password").is_none());
        assert!(json.get("passwordHash").is_none());
    }
}
