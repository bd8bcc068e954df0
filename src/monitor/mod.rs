//! Multi-account polling.
//!
//! - `registry`: the accounts to poll and their data sources
//! - `poller`: the fixed-interval refresh loop and its stop handle
//! - `events`: snapshots and failures published to the display

mod events;
mod poller;
mod registry;

pub use events::{AccountSnapshot, CycleStats, MonitorEvent};
pub use poller::{Poller, PollerState, StopHandle};
pub use registry::{AccountRegistry, RegisteredAccount};
