//! Volume module: reading the output volume and sampling it over time

mod poller;
mod source;

pub use poller::VolumePoller;
pub use source::{NoReading, OsascriptVolume};
