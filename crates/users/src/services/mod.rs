//! Service layer for the user directory.

pub mod user_service;
#[cfg(test)]
mod mock_repositories;

pub use user_service::{UserRepo, UserService};
