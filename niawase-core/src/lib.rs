pub mod config;
pub mod diagnosis;
pub mod prompt;
pub mod types;

pub use config::*;
pub use diagnosis::*;
pub use prompt::*;
pub use types::*;
