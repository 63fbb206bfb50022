pub mod callable;
pub mod config_store;
pub mod defaults;
pub mod files;
pub mod identity;
pub mod profile_store;
pub mod runtime_engine;
pub mod secrets;
pub mod session_cache;
pub mod storage;
