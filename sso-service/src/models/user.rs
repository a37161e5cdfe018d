//! User model - the canonical account every identity resolves to.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::ValidateEmail;

use crate::services::ServiceError;

/// User lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserStatus {
    Active,
    Blocked,
    Deleted,
}

impl UserStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserStatus::Active => "active",
            UserStatus::Blocked => "blocked",
            UserStatus::Deleted => "deleted",
        }
    }
}

impl std::str::FromStr for UserStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "active" => Ok(UserStatus::Active),
            "blocked" => Ok(UserStatus::Blocked),
            "deleted" => Ok(UserStatus::Deleted),
            _ => Err(format!("Invalid user status: {}", s)),
        }
    }
}

impl TryFrom<String> for UserStatus {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// User entity.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct User {
    pub user_id: Uuid,
    pub name: String,
    pub email: String,
    #[sqlx(try_from = "String")]
    pub status: UserStatus,
    pub created_utc: DateTime<Utc>,
}

impl User {
    /// Create a new active user. Emails are stored lowercased.
    pub fn new(name: &str, email: &str) -> Result<Self, ServiceError> {
        let (name, email) = validate_name_and_email(name, email)?;
        Ok(Self {
            user_id: Uuid::new_v4(),
            name,
            email,
            status: UserStatus::Active,
            created_utc: Utc::now(),
        })
    }

    /// Blocked and deleted users keep their records but cannot sign in.
    pub fn can_login(&self) -> bool {
        self.status == UserStatus::Active
    }

    pub fn is_deleted(&self) -> bool {
        self.status == UserStatus::Deleted
    }

    pub fn update(&mut self, name: &str, email: &str) -> Result<(), ServiceError> {
        if self.is_deleted() {
            return Err(ServiceError::UserDeleted);
        }
        let (name, email) = validate_name_and_email(name, email)?;
        self.name = name;
        self.email = email;
        Ok(())
    }

    pub fn block(&mut self) -> Result<(), ServiceError> {
        if self.is_deleted() {
            return Err(ServiceError::UserDeleted);
        }
        self.status = UserStatus::Blocked;
        Ok(())
    }

    pub fn delete(&mut self) -> Result<(), ServiceError> {
        if self.is_deleted() {
            return Err(ServiceError::UserDeleted);
        }
        self.status = UserStatus::Deleted;
        Ok(())
    }
}

/// Lowercased, trimmed form used for storage and lookups.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn validate_name_and_email(name: &str, email: &str) -> Result<(String, String), ServiceError> {
    let name = name.trim();
    let email = normalize_email(email);
    if name.is_empty() || email.is_empty() || !email.validate_email() {
        return Err(ServiceError::InvalidNameOrEmail);
    }
    Ok((name.to_string(), email))
}
