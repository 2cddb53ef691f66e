mod create_scope;
mod delete_scope;

pub use create_scope::*;
pub use delete_scope::*;
