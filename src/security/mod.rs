//! Authorization of requests against monitoring objects

pub mod permissions;
pub mod user;

pub use permissions::{AuthorizationKind, AuthorizationPolicy};
pub use user::User;
