//! IPC module for daemon-menu bar communication

mod protocol;
mod server;

pub use server::Server;
