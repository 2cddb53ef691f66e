mod get_all_scopes;
mod get_scope;

pub use get_all_scopes::*;
pub use get_scope::*;
