pub mod chart;
pub mod cli;
pub mod config;
pub mod error;
pub mod external;
pub mod import;
pub mod refresh;
pub mod server;
pub mod store;
pub mod structs;

pub use error::{AprError, Result};
pub use structs::*;
