pub mod controller;
pub mod diagnosis;
pub mod error;
pub mod flight;
pub mod session;
pub mod synthesis;
pub mod traits;
pub mod uploads;
