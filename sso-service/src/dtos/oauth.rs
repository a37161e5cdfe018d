use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::parse_scopes;

#[derive(Debug, Deserialize, Validate)]
pub struct AuthorizeQuery {
    #[validate(length(min = 1, message = "client_id is required"))]
    pub client_id: String,
    #[validate(length(min = 1, message = "redirect_uri is required"))]
    pub redirect_uri: String,
    /// Space-delimited; empty means the client's registered scopes.
    #[serde(default)]
    pub scope: String,
}

impl AuthorizeQuery {
    pub fn scopes(&self) -> Vec<String> {
        parse_scopes(&self.scope)
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct ConsentRequest {
    #[validate(length(min = 1, message = "client_id is required"))]
    pub client_id: String,
    #[validate(length(min = 1, message = "redirect_uri is required"))]
    pub redirect_uri: String,
    #[serde(default)]
    pub scope: String,
    pub approve: bool,
}

impl ConsentRequest {
    pub fn scopes(&self) -> Vec<String> {
        parse_scopes(&self.scope)
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RedirectResponse {
    pub redirect_to: String,
}

#[derive(Deserialize, Validate)]
pub struct TokenRequest {
    #[validate(length(min = 1, message = "code is required"))]
    pub code: String,
    #[validate(length(min = 1, message = "client_id is required"))]
    pub client_id: String,
    #[serde(default)]
    pub client_secret: Option<String>,
    #[validate(length(min = 1, message = "redirect_uri is required"))]
    pub redirect_uri: String,
}
