//! Connection manager
//!
//! Serializes every operation against the device server connection. Public
//! operations only edit the pending queue under the lock and then kick the
//! drain; at most one task body runs at a time, and each finished task
//! drains the next one.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::FutureExt;
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};
use url::Url;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::remote::ClientFactory;

use super::{ActiveClient, ConnectionState, ConnectionStateMachine, Task, TaskKind, TaskQueue};

// ─────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────

/// Configuration for the connection manager
#[derive(Debug, Clone)]
pub struct ManagerConfig {
    /// Name the client announces to the device server
    pub client_name: String,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            client_name: "Haptic Link".to_string(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────
// Shared State
// ─────────────────────────────────────────────────────────────────

/// Everything guarded by the manager lock
#[derive(Debug, Default)]
struct Shared {
    machine: ConnectionStateMachine,
    queue: TaskQueue,
    /// Kind of the task currently executing
    current: Option<TaskKind>,
    /// One-way shutdown latch
    shutdown: bool,
}

/// Outcome of a public request
enum Submission {
    Queued,
    Latched,
    Dropped(ConnectionState),
}

struct Inner {
    config: ManagerConfig,
    factory: Arc<dyn ClientFactory>,
    runtime: Handle,
    shared: Mutex<Shared>,
    /// Mirrors `current.is_some()`
    busy_tx: watch::Sender<bool>,
    /// Mirrors `machine.state()`
    state_tx: watch::Sender<ConnectionState>,
}

// ─────────────────────────────────────────────────────────────────
// Connection Manager
// ─────────────────────────────────────────────────────────────────

/// Owns the connection to the device server and the queue of work against it
///
/// Cloning is cheap; all clones drive the same connection.
#[derive(Clone)]
pub struct ConnectionManager {
    inner: Arc<Inner>,
}

impl ConnectionManager {
    /// Create a manager that builds clients with `factory` and runs task
    /// bodies on `runtime`
    pub fn new(config: ManagerConfig, factory: Arc<dyn ClientFactory>, runtime: Handle) -> Self {
        let (busy_tx, _) = watch::channel(false);
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);

        Self {
            inner: Arc::new(Inner {
                config,
                factory,
                runtime,
                shared: Mutex::new(Shared::default()),
                busy_tx,
                state_tx,
            }),
        }
    }

    // ─────────────────────────────────────────────────────────────
    // Requests
    // ─────────────────────────────────────────────────────────────

    /// Replace all pending work with a (re)connect to `address`
    pub fn connect(&self, address: Url) {
        info!(address = %address, "Connect requested");
        let outcome = self.inner.locked(|shared| {
            if shared.shutdown {
                return Submission::Latched;
            }
            shared.queue.clear();
            if shared.machine.state().is_live() {
                shared.queue.push(Task::Disconnect);
            }
            shared.queue.push(Task::Connect(address));
            Submission::Queued
        });
        self.inner.submit(outcome, TaskKind::Connect);
    }

    /// Replace all pending work with a disconnect
    pub fn disconnect(&self) {
        info!("Disconnect requested");
        let outcome = self.inner.locked(|shared| {
            if shared.shutdown {
                return Submission::Latched;
            }
            shared.queue.clear();
            if shared.machine.state().is_live() {
                shared.queue.push(Task::Disconnect);
            }
            Submission::Queued
        });
        self.inner.submit(outcome, TaskKind::Disconnect);
    }

    /// Vibrate every device at `intensity`, superseding any unsent intensity
    ///
    /// Dropped unless the connection is connecting or connected.
    pub fn send_intensity(&self, intensity: f64) {
        if !intensity.is_finite() {
            warn!(intensity, "Ignoring non-finite intensity");
            return;
        }
        let intensity = intensity.clamp(0.0, 1.0);
        let outcome = self.inner.locked(|shared| {
            if shared.shutdown {
                return Submission::Latched;
            }
            let state = shared.machine.state();
            if !state.is_live() {
                return Submission::Dropped(state);
            }
            shared.queue.replace_send_command(intensity);
            Submission::Queued
        });
        self.inner.submit(outcome, TaskKind::SendCommand);
    }

    /// Stop every device, superseding any unsent intensity or stop
    ///
    /// Dropped unless the connection is connecting or connected.
    pub fn stop_all(&self) {
        let outcome = self.inner.locked(|shared| {
            if shared.shutdown {
                return Submission::Latched;
            }
            let state = shared.machine.state();
            if !state.is_live() {
                return Submission::Dropped(state);
            }
            shared.queue.replace_clear_all();
            Submission::Queued
        });
        self.inner.submit(outcome, TaskKind::ClearAll);
    }

    /// Latch the manager, let the in-flight task finish, then disconnect
    ///
    /// Safe to call more than once. Returns the failure of the final
    /// disconnect, if any; the connection is reset either way.
    pub async fn shutdown(&self) -> Result<()> {
        let first = self.inner.locked(|shared| {
            let first = !shared.shutdown;
            shared.shutdown = true;
            shared.queue.clear();
            first
        });
        if first {
            info!("Shutting down connection manager");
        }

        let mut busy_rx = self.inner.busy_tx.subscribe();
        loop {
            busy_rx
                .wait_for(|busy| !*busy)
                .await
                .map_err(|_| Error::Internal("connection manager dropped".to_string()))?;

            let claimed = self.inner.locked(|shared| {
                if shared.current.is_some() {
                    return None;
                }
                if !shared.machine.state().is_live() {
                    return Some(false);
                }
                shared.current = Some(TaskKind::Disconnect);
                Some(true)
            });

            match claimed {
                Some(true) => break,
                Some(false) => {
                    debug!("Connection manager shut down");
                    return Ok(());
                }
                None => continue,
            }
        }

        info!("Disconnecting before shutdown");
        let result = self.inner.execute(Task::Disconnect).await;
        self.inner.locked(|shared| {
            if result.is_err() {
                shared.machine.force_reset();
            }
            shared.current = None;
        });

        match &result {
            Ok(()) => info!("Connection manager shut down"),
            Err(e) => warn!(error = %e.format_for_log(), "Disconnect during shutdown failed"),
        }
        result
    }

    // ─────────────────────────────────────────────────────────────
    // Observation
    // ─────────────────────────────────────────────────────────────

    /// Current connection state
    pub fn state(&self) -> ConnectionState {
        self.inner.shared.lock().machine.state()
    }

    /// Whether a client handle currently exists
    pub fn has_active_client(&self) -> bool {
        self.inner.shared.lock().machine.client().is_some()
    }

    /// Session id of the current client handle
    pub fn session(&self) -> Option<Uuid> {
        self.inner
            .shared
            .lock()
            .machine
            .client()
            .map(ActiveClient::session)
    }

    /// Kind of the task currently executing
    pub fn current_task(&self) -> Option<TaskKind> {
        self.inner.shared.lock().current
    }

    /// Tasks waiting to run, head first
    pub fn pending_tasks(&self) -> Vec<Task> {
        self.inner.shared.lock().queue.iter().cloned().collect()
    }

    /// Whether [`shutdown`](Self::shutdown) has been called
    pub fn is_shut_down(&self) -> bool {
        self.inner.shared.lock().shutdown
    }

    /// Receiver that observes every state change
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state_tx.subscribe()
    }

    /// Wait until the connection reaches `state`
    pub async fn wait_for_state(&self, state: ConnectionState) {
        let mut state_rx = self.watch_state();
        // The sender lives as long as `self`
        let _ = state_rx.wait_for(|s| *s == state).await;
    }

    /// Wait until no task is running and nothing is left to run
    pub async fn wait_idle(&self) {
        let mut busy_rx = self.inner.busy_tx.subscribe();
        loop {
            let _ = busy_rx.borrow_and_update();
            let idle = self.inner.locked(|shared| {
                shared.current.is_none() && (shared.queue.is_empty() || shared.shutdown)
            });
            if idle || busy_rx.changed().await.is_err() {
                return;
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────
// Drain & Task Bodies
// ─────────────────────────────────────────────────────────────────

impl Inner {
    /// Run `f` under the lock, then publish state and busy changes
    fn locked<R>(&self, f: impl FnOnce(&mut Shared) -> R) -> R {
        let mut shared = self.shared.lock();
        let out = f(&mut shared);

        let state = shared.machine.state();
        let busy = shared.current.is_some();
        self.state_tx.send_if_modified(|s| replace_if_changed(s, state));
        self.busy_tx.send_if_modified(|b| replace_if_changed(b, busy));
        out
    }

    /// Log a request outcome and drain if it queued anything
    fn submit(self: &Arc<Self>, outcome: Submission, kind: TaskKind) {
        match outcome {
            Submission::Queued => self.update_task_queue(),
            Submission::Latched => debug!(task = %kind, "Ignoring request after shutdown"),
            Submission::Dropped(state) => {
                debug!(task = %kind, state = %state, "Dropping request while not connected")
            }
        }
    }

    /// Start the head task unless one is running or the manager is latched
    fn update_task_queue(self: &Arc<Self>) {
        let next = self.locked(|shared| {
            if shared.shutdown || shared.current.is_some() {
                return None;
            }
            let task = shared.queue.pop()?;
            shared.current = Some(task.kind());
            Some(task)
        });
        let Some(task) = next else {
            return;
        };

        let inner = Arc::clone(self);
        self.runtime.spawn(async move {
            let kind = task.kind();
            if let Err(e) = inner.execute(task).await {
                warn!(task = %kind, error = %e.format_for_log(), "Task failed");
            }
            inner.locked(|shared| shared.current = None);
            inner.update_task_queue();
        });
    }

    /// Run one task body, turning a panic into a reset and an error
    async fn execute(&self, task: Task) -> Result<()> {
        let kind = task.kind();
        debug!(task = %kind, "Running task");

        match AssertUnwindSafe(self.run_task(task)).catch_unwind().await {
            Ok(result) => result,
            Err(_) => {
                error!(task = %kind, "Task panicked, dropping connection");
                self.locked(|shared| {
                    shared.queue.clear();
                    shared.machine.force_reset();
                });
                Err(Error::Internal(format!("{kind} task panicked")))
            }
        }
    }

    async fn run_task(&self, task: Task) -> Result<()> {
        match task {
            Task::Connect(address) => self.connect_task(address).await,
            Task::Disconnect => self.disconnect_task().await,
            Task::SendCommand(intensity) => self.send_command_task(intensity).await,
            Task::ClearAll => self.clear_all_task().await,
        }
    }

    async fn connect_task(&self, address: Url) -> Result<()> {
        // Stored before the first await so the handle outlives the attempt
        let active = ActiveClient::new(self.factory.create(&self.config.client_name));
        let session = active.session();
        self.locked(|shared| shared.machine.begin_connect(active.clone()))?;

        info!(session = %session, address = %address, "Connecting to device server");
        let outcome = async {
            active.client().connect(&address).await?;
            info!(session = %session, "Connected, starting device scan");
            active.client().start_scanning().await?;
            info!(session = %session, "Device scan started");
            Ok::<_, Error>(())
        }
        .await;

        if let Err(e) = outcome {
            error!(
                session = %session,
                address = %address,
                error = %e.format_for_log(),
                "Connection attempt failed"
            );
            self.locked(|shared| {
                shared.queue.clear();
                shared.machine.connect_failed();
            });
            return Err(e);
        }

        self.locked(|shared| shared.machine.connect_succeeded())?;
        info!(session = %session, "Connection ready");
        Ok(())
    }

    async fn disconnect_task(&self) -> Result<()> {
        let active = self.locked(|shared| shared.machine.begin_disconnect())?;
        let session = active.session();

        let outcome = async {
            info!(session = %session, "Stopping devices");
            active.client().stop_all_devices().await?;
            info!(session = %session, "Stopping device scan");
            active.client().stop_scanning().await?;
            info!(session = %session, "Closing connection");
            active.client().disconnect().await?;
            Ok::<_, Error>(())
        }
        .await;

        match outcome {
            Ok(()) => {
                self.locked(|shared| shared.machine.disconnect_completed())?;
                info!(session = %session, "Disconnected");
                Ok(())
            }
            Err(e) => {
                error!(
                    session = %session,
                    error = %e.format_for_log(),
                    "Disconnect failed, dropping connection"
                );
                self.locked(|shared| {
                    shared.machine.force_reset();
                });
                Err(e)
            }
        }
    }

    async fn send_command_task(&self, intensity: f64) -> Result<()> {
        let active = self.locked(|shared| shared.machine.connected_client(TaskKind::SendCommand))?;
        let devices = active.client().devices();

        debug!(session = %active.session(), intensity, devices = devices.len(), "Sending intensity");
        for device in &devices {
            active.client().send_vibration(device, intensity).await?;
        }
        Ok(())
    }

    async fn clear_all_task(&self) -> Result<()> {
        let active = self.locked(|shared| shared.machine.connected_client(TaskKind::ClearAll))?;

        debug!(session = %active.session(), "Stopping all devices");
        active.client().stop_all_devices().await
    }
}

fn replace_if_changed<T: PartialEq + Copy>(slot: &mut T, value: T) -> bool {
    if *slot == value {
        false
    } else {
        *slot = value;
        true
    }
}

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::remote::{MockConfig, MockServer, RemoteOperation};

    fn manager_with(server: &MockServer) -> ConnectionManager {
        ConnectionManager::new(
            ManagerConfig::default(),
            Arc::new(server.clone()),
            Handle::current(),
        )
    }

    fn server() -> MockServer {
        MockServer::with_config(MockConfig {
            latency: Duration::from_millis(10),
            device_count: 2,
        })
    }

    fn address() -> Url {
        Url::parse("ws://127.0.0.1:12345").unwrap()
    }

    #[test]
    fn test_manager_config_default() {
        assert_eq!(ManagerConfig::default().client_name, "Haptic Link");
    }

    #[tokio::test(start_paused = true)]
    async fn test_new_manager_is_idle() {
        let manager = manager_with(&server());
        assert_eq!(manager.state(), ConnectionState::Disconnected);
        assert!(!manager.has_active_client());
        assert!(manager.current_task().is_none());
        assert!(manager.pending_tasks().is_empty());
        assert!(!manager.is_shut_down());
        manager.wait_idle().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_then_disconnect() {
        let server = server();
        let manager = manager_with(&server);

        manager.connect(address());
        manager.wait_idle().await;
        assert_eq!(manager.state(), ConnectionState::Connected);
        assert!(manager.session().is_some());

        manager.disconnect();
        manager.wait_idle().await;
        assert_eq!(manager.state(), ConnectionState::Disconnected);
        assert!(manager.session().is_none());
        assert_eq!(
            server.operations(),
            vec![
                RemoteOperation::Connect,
                RemoteOperation::StartScanning,
                RemoteOperation::StopAllDevices,
                RemoteOperation::StopScanning,
                RemoteOperation::Disconnect,
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_current_task_visible_while_running() {
        let manager = manager_with(&server());

        manager.connect(address());
        manager.wait_for_state(ConnectionState::Connecting).await;
        assert_eq!(manager.current_task(), Some(TaskKind::Connect));

        manager.wait_idle().await;
        assert!(manager.current_task().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_finite_intensity_is_ignored() {
        let server = server();
        let manager = manager_with(&server);
        manager.connect(address());
        manager.wait_idle().await;

        manager.send_intensity(f64::NAN);
        manager.wait_idle().await;
        assert!(server.vibrations().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_intensity_is_clamped() {
        let server = server();
        let manager = manager_with(&server);
        manager.connect(address());
        manager.wait_idle().await;

        manager.send_intensity(1.7);
        manager.wait_idle().await;
        assert_eq!(server.vibrations(), vec![(0, 1.0), (1, 1.0)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_requests_after_shutdown_are_ignored() {
        let server = server();
        let manager = manager_with(&server);

        manager.shutdown().await.unwrap();
        manager.connect(address());
        manager.disconnect();
        manager.wait_idle().await;

        assert!(manager.is_shut_down());
        assert!(manager.pending_tasks().is_empty());
        assert_eq!(server.clients_created(), 0);
    }

    #[test]
    fn test_replace_if_changed() {
        let mut slot = 1;
        assert!(!replace_if_changed(&mut slot, 1));
        assert!(replace_if_changed(&mut slot, 2));
        assert_eq!(slot, 2);
    }
}
