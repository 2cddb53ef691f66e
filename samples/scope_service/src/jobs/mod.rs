mod sync_scopes;

pub use sync_scopes::*;
