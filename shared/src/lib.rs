pub mod issues;
pub mod password;
pub mod permissions;
pub mod report;
pub mod ticket_id;
mod types;

pub use permissions::{Permission, PermissionSet};
pub use types::*;
