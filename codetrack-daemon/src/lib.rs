//! codetrack daemon library
//!
//! This module re-exports the daemon's modules for integration testing.

pub mod config;
pub mod poller;
pub mod server;
pub mod version;
pub mod ws;

pub use config::DaemonConfig;
pub use server::{build_router, AppState};
