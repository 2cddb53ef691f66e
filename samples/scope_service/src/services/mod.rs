pub mod scope_store;
