pub mod callable;
pub mod identity;
pub mod request;
pub mod runtime;
pub mod storage;
pub mod synthesis;
