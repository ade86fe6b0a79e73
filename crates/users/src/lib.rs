//! # chatline users crate
//!
//! The user directory: profile lookups and the listings clients use to find
//! someone to talk to.
//!
//! - **Services**: [`UserService`], generic over a [`UserRepo`]
//! - **Types**: errors and response shapes

pub mod services;
pub mod types;

pub use services::{UserRepo, UserService};
pub use types::{DirectoryEntry, UserError, UserResult};
