pub mod principal;
pub mod role;

pub use principal::{Actor, Group};
pub use role::{Action, Permission, Role};
