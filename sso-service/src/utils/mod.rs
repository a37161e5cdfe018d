pub mod password;
pub mod validation;

pub use password::{Argon2Hasher, CredentialHasher, Password};
pub use validation::ValidatedJson;
