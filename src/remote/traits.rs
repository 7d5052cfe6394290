//! Remote client trait definitions
//!
//! Defines the seam between the connection manager and whatever speaks the
//! device server's protocol. The manager only ever sees these traits.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use url::Url;

use crate::error::Result;

// ─────────────────────────────────────────────────────────────────
// Remote Operations
// ─────────────────────────────────────────────────────────────────

/// The primitive calls a remote client can make against the server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RemoteOperation {
    Connect,
    StartScanning,
    SendVibration,
    StopAllDevices,
    StopScanning,
    Disconnect,
}

impl RemoteOperation {
    /// Stable kebab-case name used in logs and error messages
    pub fn as_str(&self) -> &'static str {
        match self {
            RemoteOperation::Connect => "connect",
            RemoteOperation::StartScanning => "start-scanning",
            RemoteOperation::SendVibration => "send-vibration",
            RemoteOperation::StopAllDevices => "stop-all-devices",
            RemoteOperation::StopScanning => "stop-scanning",
            RemoteOperation::Disconnect => "disconnect",
        }
    }
}

impl fmt::Display for RemoteOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─────────────────────────────────────────────────────────────────
// Devices
// ─────────────────────────────────────────────────────────────────

/// A device the server has announced to the client
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeviceHandle {
    /// Server-assigned device index
    pub index: u32,

    /// Human-readable device name
    pub name: String,
}

impl DeviceHandle {
    pub fn new(index: u32, name: impl Into<String>) -> Self {
        Self {
            index,
            name: name.into(),
        }
    }
}

impl fmt::Display for DeviceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (#{})", self.name, self.index)
    }
}

// ─────────────────────────────────────────────────────────────────
// RemoteClient Trait
// ─────────────────────────────────────────────────────────────────

/// A single connection to the remote device server
///
/// Every async method may fail with [`crate::error::Error::RemoteOperation`].
/// Implementations must be object-safe; the manager holds them as
/// `Arc<dyn RemoteClient>`.
#[async_trait]
pub trait RemoteClient: Send + Sync {
    /// Open the connection to the server at `address`
    async fn connect(&self, address: &Url) -> Result<()>;

    /// Ask the server to start discovering devices
    async fn start_scanning(&self) -> Result<()>;

    /// Devices currently known to this client
    fn devices(&self) -> Vec<DeviceHandle>;

    /// Vibrate one device at `intensity` (0.0..=1.0)
    async fn send_vibration(&self, device: &DeviceHandle, intensity: f64) -> Result<()>;

    /// Stop every device attached to the server
    async fn stop_all_devices(&self) -> Result<()>;

    /// Stop device discovery
    async fn stop_scanning(&self) -> Result<()>;

    /// Close the connection
    async fn disconnect(&self) -> Result<()>;
}

/// Creates a fresh client for every connection attempt
pub trait ClientFactory: Send + Sync {
    /// Build a new, unconnected client announcing itself as `client_name`
    fn create(&self, client_name: &str) -> Arc<dyn RemoteClient>;
}
