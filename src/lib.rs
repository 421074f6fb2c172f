pub mod config;
pub mod error;
pub mod error_handling;
pub mod forge;
pub mod git;
pub mod push;
pub mod server;
pub mod ssh_config;
pub mod ui;
pub mod workflow;

pub use config::Config;
pub use error::{Error, Result};
pub use workflow::{Report, Workflow};
