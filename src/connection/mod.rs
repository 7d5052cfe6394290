//! Connection management
//!
//! A single connection to the device server, driven by a serialized queue of
//! connect, disconnect and command tasks.

mod manager;
mod queue;
mod state;

pub use manager::{ConnectionManager, ManagerConfig};
pub use queue::{Task, TaskKind, TaskQueue};
pub use state::{ActiveClient, ConnectionState, ConnectionStateMachine};
