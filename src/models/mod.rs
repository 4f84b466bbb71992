//! Data models for the user directory.
//!
//! JSON field names follow the column names of the underlying tables.

mod resource;
mod user;

pub use resource::*;
pub use user::*;
