pub mod auth;
pub mod problem;
