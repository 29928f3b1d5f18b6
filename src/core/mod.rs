pub mod database;
pub mod entry;
pub mod index;
pub mod list;
pub mod store;
pub mod ttl_sweep;
