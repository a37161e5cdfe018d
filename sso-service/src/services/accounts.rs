use std::sync::Arc;
use uuid::Uuid;

use crate::models::User;
use crate::services::{ServiceError, UserRepository};

/// Self-service account operations. A deleted user is terminal.
#[derive(Clone)]
pub struct UserService {
    users: Arc<dyn UserRepository>,
}

impl UserService {
    pub fn new(users: Arc<dyn UserRepository>) -> Self {
        Self { users }
    }

    pub async fn get(&self, user_id: Uuid) -> Result<User, ServiceError> {
        self.users
            .by_id(user_id)
            .await?
            .ok_or(ServiceError::UserNotFound)
    }

    pub async fn update(
        &self,
        user_id: Uuid,
        name: &str,
        email: &str,
    ) -> Result<User, ServiceError> {
        let mut user = self.get(user_id).await?;
        user.update(name, email)?;
        match self.users.update(&user).await {
            Ok(()) => Ok(user),
            Err(ServiceError::UniqueViolated) => Err(ServiceError::UserAlreadyExists),
            Err(e) => Err(e),
        }
    }

    pub async fn delete(&self, user_id: Uuid) -> Result<User, ServiceError> {
        let mut user = self.get(user_id).await?;
        user.delete()?;
        self.users.update(&user).await?;
        tracing::info!(%user_id, "User deleted");
        Ok(user)
    }
}
