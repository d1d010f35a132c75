pub mod roles;

pub use roles::{Permissions, RoleDefinition, RoleDirectory};
