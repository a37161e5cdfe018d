use service_core::error::AppError;
use thiserror::Error;

/// Domain error taxonomy for identity resolution and the authorization-code
/// grant. Variants carry no user-facing detail; the HTTP mapping below decides
/// what an external caller may learn.
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("User not found")]
    UserNotFound,

    #[error("Identity not found")]
    IdentityNotFound,

    #[error("Credential not found")]
    CredentialNotFound,

    #[error("Client not found")]
    ClientNotFound,

    #[error("User cannot be logged in")]
    UserCannotBeLoggedIn,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Name and email must be valid and not empty")]
    InvalidNameOrEmail,

    #[error("Empty password is not permitted")]
    EmptyPasswordIsNotPermitted,

    #[error("User already exists")]
    UserAlreadyExists,

    #[error("User is deleted")]
    UserDeleted,

    #[error("Redirect URI is not allowed")]
    RedirectURINotAllowed,

    #[error("Authorization code not found")]
    AuthCodeNotFound,

    #[error("Invalid authorization code")]
    InvalidAuthCode,

    #[error("No signing keys configured")]
    KeysNotFound,

    #[error("Invalid auth provider: {0}")]
    InvalidAuthProvider(String),

    #[error("Invalid or expired session")]
    InvalidSession,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Unique constraint violated")]
    UniqueViolated,

    #[error("Unknown error: {0}")]
    Unknown(#[from] anyhow::Error),
}

impl ServiceError {
    /// Authentication failures that must look identical to an external caller.
    pub fn is_authentication_failure(&self) -> bool {
        matches!(
            self,
            ServiceError::UserNotFound
                | ServiceError::IdentityNotFound
                | ServiceError::CredentialNotFound
                | ServiceError::InvalidCredentials
                | ServiceError::UserCannotBeLoggedIn
        )
    }

    /// Re-wraps anything that is not already `Unknown`, for failures that
    /// happen after earlier writes in a multi-step operation succeeded.
    pub fn into_unknown(self, context: &'static str) -> Self {
        match self {
            ServiceError::Unknown(e) => ServiceError::Unknown(e.context(context)),
            other => ServiceError::Unknown(anyhow::anyhow!("{}: {}", context, other)),
        }
    }
}

impl From<sqlx::Error> for ServiceError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            if db_err.is_unique_violation() {
                return ServiceError::UniqueViolated;
            }
        }
        ServiceError::Unknown(anyhow::Error::new(err))
    }
}

impl From<redis::RedisError> for ServiceError {
    fn from(err: redis::RedisError) -> Self {
        ServiceError::Unknown(anyhow::Error::new(err))
    }
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        if err.is_authentication_failure() {
            return AppError::AuthError(anyhow::anyhow!("Invalid credentials"));
        }

        match err {
            ServiceError::ClientNotFound => AppError::BadRequest(anyhow::anyhow!("Unknown client")),
            ServiceError::RedirectURINotAllowed => {
                AppError::BadRequest(anyhow::anyhow!("Redirect URI is not allowed"))
            }
            ServiceError::AuthCodeNotFound | ServiceError::InvalidAuthCode => {
                AppError::BadRequest(anyhow::anyhow!("invalid_grant"))
            }
            ServiceError::InvalidNameOrEmail => {
                AppError::BadRequest(anyhow::anyhow!("Name and email must be valid and not empty"))
            }
            ServiceError::EmptyPasswordIsNotPermitted => {
                AppError::BadRequest(anyhow::anyhow!("Empty password is not permitted"))
            }
            ServiceError::InvalidAuthProvider(provider) => {
                AppError::BadRequest(anyhow::anyhow!("Invalid auth provider: {}", provider))
            }
            ServiceError::UserAlreadyExists => {
                AppError::Conflict(anyhow::anyhow!("User already exists"))
            }
            ServiceError::UniqueViolated => AppError::Conflict(anyhow::anyhow!("Conflict")),
            ServiceError::UserDeleted => AppError::NotFound(anyhow::anyhow!("User not found")),
            ServiceError::InvalidSession | ServiceError::InvalidToken => {
                AppError::Unauthorized(anyhow::anyhow!("Invalid or expired session"))
            }
            ServiceError::KeysNotFound => {
                AppError::InternalError(anyhow::anyhow!("No signing keys configured"))
            }
            ServiceError::Unknown(e) => AppError::InternalError(e),
            // Handled by the collapse above.
            ServiceError::UserNotFound
            | ServiceError::IdentityNotFound
            | ServiceError::CredentialNotFound
            | ServiceError::InvalidCredentials
            | ServiceError::UserCannotBeLoggedIn => {
                AppError::AuthError(anyhow::anyhow!("Invalid credentials"))
            }
        }
    }
}
