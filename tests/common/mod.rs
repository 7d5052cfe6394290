//! Common test utilities and fixtures
//!
//! Shared by the integration test binaries; not every binary uses every helper.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use haptic_link::connection::{ConnectionManager, ManagerConfig};
use haptic_link::remote::{MockConfig, MockServer};
use tokio::runtime::Handle;
use url::Url;

/// Get the path to the test fixtures directory
pub fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
}

/// Get a path to a specific fixture file
pub fn fixture_path(name: &str) -> PathBuf {
    fixtures_dir().join(name)
}

/// Get the valid config fixture path
pub fn valid_config_fixture() -> PathBuf {
    fixture_path("valid_config.toml")
}

/// Get the invalid config fixture path
pub fn invalid_config_fixture() -> PathBuf {
    fixture_path("invalid_config.toml")
}

/// Simulated server with `devices` devices and 10ms latency per call
pub fn mock_server(devices: usize) -> MockServer {
    MockServer::with_config(MockConfig {
        latency: Duration::from_millis(10),
        device_count: devices,
    })
}

/// Manager wired to `server` on the current runtime
pub fn manager_for(server: &MockServer) -> ConnectionManager {
    ConnectionManager::new(
        ManagerConfig {
            client_name: "Integration Test".to_string(),
        },
        Arc::new(server.clone()),
        Handle::current(),
    )
}

/// Default server address
pub fn address() -> Url {
    Url::parse("ws://127.0.0.1:12345").unwrap()
}

/// A second, different server address
pub fn other_address() -> Url {
    Url::parse("ws://10.0.0.7:12345").unwrap()
}
