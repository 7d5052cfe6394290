//! Simulated device server
//!
//! Provides an in-process implementation of [`RemoteClient`] for tests and
//! the `simulate` command. Every call is journaled so callers can verify
//! exactly what reached the "server" and in which order.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use tracing::trace;
use url::Url;

use crate::error::{Error, Result};

use super::{ClientFactory, DeviceHandle, RemoteClient, RemoteOperation};

// ─────────────────────────────────────────────────────────────────
// Mock Configuration
// ─────────────────────────────────────────────────────────────────

/// Configuration for simulated server behavior
#[derive(Debug, Clone)]
pub struct MockConfig {
    /// Simulated round-trip latency of every call
    pub latency: Duration,

    /// Number of devices announced once scanning starts
    pub device_count: usize,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            latency: Duration::from_millis(10),
            device_count: 1,
        }
    }
}

// ─────────────────────────────────────────────────────────────────
// Call Journal
// ─────────────────────────────────────────────────────────────────

/// A call that reached the simulated server
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteCall {
    Connect(String),
    StartScanning,
    SendVibration { device: u32, intensity: f64 },
    StopAllDevices,
    StopScanning,
    Disconnect,
}

impl RemoteCall {
    /// The operation this call performed
    pub fn operation(&self) -> RemoteOperation {
        match self {
            RemoteCall::Connect(_) => RemoteOperation::Connect,
            RemoteCall::StartScanning => RemoteOperation::StartScanning,
            RemoteCall::SendVibration { .. } => RemoteOperation::SendVibration,
            RemoteCall::StopAllDevices => RemoteOperation::StopAllDevices,
            RemoteCall::StopScanning => RemoteOperation::StopScanning,
            RemoteCall::Disconnect => RemoteOperation::Disconnect,
        }
    }
}

/// State shared by the server and every client it hands out
#[derive(Debug, Default)]
struct Journal {
    calls: Mutex<Vec<RemoteCall>>,
    failing: RwLock<HashSet<RemoteOperation>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    clients_created: AtomicUsize,
}

/// Decrements the in-flight counter even if the calling future is dropped
struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

// ─────────────────────────────────────────────────────────────────
// Mock Server
// ─────────────────────────────────────────────────────────────────

/// Simulated device server; hands out [`MockClient`]s
#[derive(Debug, Clone, Default)]
pub struct MockServer {
    config: MockConfig,
    journal: Arc<Journal>,
}

impl MockServer {
    /// Create a server with default behavior
    pub fn new() -> Self {
        Self::with_config(MockConfig::default())
    }

    /// Create a server with custom behavior
    pub fn with_config(config: MockConfig) -> Self {
        Self {
            config,
            journal: Arc::new(Journal::default()),
        }
    }

    /// Make every future call of `operation` fail
    pub fn fail(&self, operation: RemoteOperation) {
        self.journal.failing.write().insert(operation);
    }

    /// Let `operation` succeed again
    pub fn recover(&self, operation: RemoteOperation) {
        self.journal.failing.write().remove(&operation);
    }

    /// All calls received so far, in arrival order
    pub fn calls(&self) -> Vec<RemoteCall> {
        self.journal.calls.lock().clone()
    }

    /// Operations received so far, in arrival order
    pub fn operations(&self) -> Vec<RemoteOperation> {
        self.journal
            .calls
            .lock()
            .iter()
            .map(RemoteCall::operation)
            .collect()
    }

    /// Number of calls of one operation
    pub fn count(&self, operation: RemoteOperation) -> usize {
        self.journal
            .calls
            .lock()
            .iter()
            .filter(|c| c.operation() == operation)
            .count()
    }

    /// Intensities sent so far as `(device index, intensity)` pairs
    pub fn vibrations(&self) -> Vec<(u32, f64)> {
        self.journal
            .calls
            .lock()
            .iter()
            .filter_map(|c| match c {
                RemoteCall::SendVibration { device, intensity } => Some((*device, *intensity)),
                _ => None,
            })
            .collect()
    }

    /// Forget all journaled calls
    pub fn clear_calls(&self) {
        self.journal.calls.lock().clear();
    }

    /// Highest number of calls that were ever in progress at once
    pub fn max_concurrent_calls(&self) -> usize {
        self.journal.max_in_flight.load(Ordering::SeqCst)
    }

    /// Number of clients handed out
    pub fn clients_created(&self) -> usize {
        self.journal.clients_created.load(Ordering::SeqCst)
    }
}

impl ClientFactory for MockServer {
    fn create(&self, client_name: &str) -> Arc<dyn RemoteClient> {
        self.journal.clients_created.fetch_add(1, Ordering::SeqCst);
        Arc::new(MockClient {
            name: client_name.to_string(),
            config: self.config.clone(),
            journal: self.journal.clone(),
            connected: AtomicBool::new(false),
            devices: RwLock::new(Vec::new()),
        })
    }
}

// ─────────────────────────────────────────────────────────────────
// Mock Client
// ─────────────────────────────────────────────────────────────────

/// One simulated connection
pub struct MockClient {
    name: String,
    config: MockConfig,
    journal: Arc<Journal>,
    connected: AtomicBool,
    devices: RwLock<Vec<DeviceHandle>>,
}

impl MockClient {
    /// Journal the call, wait out the latency, then apply the failure switch
    async fn call(&self, call: RemoteCall) -> Result<()> {
        let operation = call.operation();
        trace!(client = %self.name, operation = %operation, "Simulated call");

        let now = self.journal.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        let _guard = InFlight(&self.journal.in_flight);
        self.journal.max_in_flight.fetch_max(now, Ordering::SeqCst);
        self.journal.calls.lock().push(call);

        if !self.config.latency.is_zero() {
            tokio::time::sleep(self.config.latency).await;
        }

        if self.journal.failing.read().contains(&operation) {
            return Err(Error::remote(operation, "simulated failure"));
        }
        Ok(())
    }

    fn ensure_connected(&self, operation: RemoteOperation) -> Result<()> {
        if self.connected.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(Error::remote(operation, "client is not connected"))
        }
    }
}

#[async_trait]
impl RemoteClient for MockClient {
    async fn connect(&self, address: &Url) -> Result<()> {
        if self.connected.load(Ordering::SeqCst) {
            return Err(Error::remote(RemoteOperation::Connect, "client is already connected"));
        }
        self.call(RemoteCall::Connect(address.to_string())).await?;
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn start_scanning(&self) -> Result<()> {
        self.ensure_connected(RemoteOperation::StartScanning)?;
        self.call(RemoteCall::StartScanning).await?;

        let devices = (0..self.config.device_count)
            .map(|i| DeviceHandle::new(i as u32, format!("Simulated Vibrator {}", i + 1)))
            .collect();
        *self.devices.write() = devices;
        Ok(())
    }

    fn devices(&self) -> Vec<DeviceHandle> {
        self.devices.read().clone()
    }

    async fn send_vibration(&self, device: &DeviceHandle, intensity: f64) -> Result<()> {
        self.ensure_connected(RemoteOperation::SendVibration)?;
        self.call(RemoteCall::SendVibration {
            device: device.index,
            intensity,
        })
        .await
    }

    async fn stop_all_devices(&self) -> Result<()> {
        self.ensure_connected(RemoteOperation::StopAllDevices)?;
        self.call(RemoteCall::StopAllDevices).await
    }

    async fn stop_scanning(&self) -> Result<()> {
        self.ensure_connected(RemoteOperation::StopScanning)?;
        self.call(RemoteCall::StopScanning).await
    }

    async fn disconnect(&self) -> Result<()> {
        self.ensure_connected(RemoteOperation::Disconnect)?;
        self.call(RemoteCall::Disconnect).await?;
        self.connected.store(false, Ordering::SeqCst);
        self.devices.write().clear();
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn instant_server(devices: usize) -> MockServer {
        MockServer::with_config(MockConfig {
            latency: Duration::ZERO,
            device_count: devices,
        })
    }

    fn address() -> Url {
        Url::parse("ws://127.0.0.1:12345").unwrap()
    }

    #[tokio::test]
    async fn test_scanning_announces_devices() {
        let server = instant_server(2);
        let client = server.create("test");

        client.connect(&address()).await.unwrap();
        assert!(client.devices().is_empty());

        client.start_scanning().await.unwrap();
        let devices = client.devices();
        assert_eq!(devices.len(), 2);
        assert_eq!(devices[1].index, 1);
        assert_eq!(server.clients_created(), 1);
    }

    #[tokio::test]
    async fn test_failure_switch() {
        let server = instant_server(1);
        let client = server.create("test");

        server.fail(RemoteOperation::Connect);
        let err = client.connect(&address()).await.unwrap_err();
        assert!(matches!(
            err,
            Error::RemoteOperation { operation: RemoteOperation::Connect, .. }
        ));
        // The attempt still reached the server
        assert_eq!(server.count(RemoteOperation::Connect), 1);

        server.recover(RemoteOperation::Connect);
        client.connect(&address()).await.unwrap();
    }

    #[tokio::test]
    async fn test_commands_require_connection() {
        let server = instant_server(1);
        let client = server.create("test");
        let device = DeviceHandle::new(0, "d");

        assert!(client.send_vibration(&device, 0.5).await.is_err());
        assert!(client.stop_all_devices().await.is_err());
        assert!(server.calls().is_empty());
    }

    #[tokio::test]
    async fn test_journal_records_vibrations() {
        let server = instant_server(1);
        let client = server.create("test");
        client.connect(&address()).await.unwrap();
        client.start_scanning().await.unwrap();

        let device = client.devices()[0].clone();
        client.send_vibration(&device, 0.25).await.unwrap();
        client.disconnect().await.unwrap();

        assert_eq!(server.vibrations(), vec![(0, 0.25)]);
        assert_eq!(
            server.operations(),
            vec![
                RemoteOperation::Connect,
                RemoteOperation::StartScanning,
                RemoteOperation::SendVibration,
                RemoteOperation::Disconnect,
            ]
        );
        assert!(client.devices().is_empty());
        assert_eq!(server.max_concurrent_calls(), 1);
    }
}
