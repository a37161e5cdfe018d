pub mod auth;
pub mod oauth;
pub mod user;
pub mod well_known;
