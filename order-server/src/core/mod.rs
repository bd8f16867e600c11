//! Core Module
//!
//! Configuration, shared state, server lifecycle and the background task
//! registry.

mod config;
mod server;
mod state;
pub mod tasks;

pub use config::Config;
pub use server::Server;
pub use state::ServerState;
pub use tasks::{BackgroundTasks, TaskKind};
