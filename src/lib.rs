//! Haptic Link
//!
//! Keeps a single connection to a remote vibration device server and
//! serializes every operation against it through one ordered, self-draining
//! task queue.

pub mod config;
pub mod connection;
pub mod error;
pub mod haptics;
pub mod logging;
pub mod remote;

pub use connection::{ConnectionManager, ConnectionState, ManagerConfig, Task, TaskKind};
pub use error::{Error, ErrorCode, Result};
pub use haptics::{HapticCoordinator, HapticSettings};
pub use remote::{ClientFactory, RemoteClient};
