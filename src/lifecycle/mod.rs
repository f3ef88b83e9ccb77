//! Lifecycle module: process shutdown

mod shutdown;

pub use shutdown::ShutdownSignal;
