pub mod auth;
pub mod error;
pub mod insights;
pub mod tasks;
