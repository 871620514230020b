// Refund Sync Core - Domain Logic & Ports
// NO infrastructure dependencies (hexagonal architecture)

pub mod application;
pub mod config;
pub mod domain;
pub mod error;
pub mod port;

pub use error::{Result, SyncError};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
