//! Connection state machine
//!
//! Guards the single active client handle and its state tag. Every
//! transition checks its precondition and applies atomically; callers are
//! expected to hold the manager's lock while calling into it.

use std::fmt;
use std::sync::Arc;

use uuid::Uuid;

use crate::error::{Error, Result};
use crate::remote::RemoteClient;

use super::TaskKind;

// ─────────────────────────────────────────────────────────────────
// Connection State
// ─────────────────────────────────────────────────────────────────

/// Lifecycle of the single connection to the device server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// No client exists
    #[default]
    Disconnected,
    /// A client exists and is connecting / starting its scan
    Connecting,
    /// Connected and scanning for devices
    Connected,
    /// Stopping devices and closing the connection
    Disconnecting,
}

impl ConnectionState {
    /// Whether new commands should be accepted in this state
    pub fn is_live(&self) -> bool {
        matches!(self, ConnectionState::Connecting | ConnectionState::Connected)
    }

    /// Whether a client handle must exist in this state
    pub fn holds_client(&self) -> bool {
        !matches!(self, ConnectionState::Disconnected)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Disconnecting => "disconnecting",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─────────────────────────────────────────────────────────────────
// Active Client
// ─────────────────────────────────────────────────────────────────

/// Handle to the live connection, tagged with a session id for logging
#[derive(Clone)]
pub struct ActiveClient {
    session: Uuid,
    client: Arc<dyn RemoteClient>,
}

impl ActiveClient {
    /// Wrap a freshly created client in a new session
    pub fn new(client: Arc<dyn RemoteClient>) -> Self {
        Self {
            session: Uuid::new_v4(),
            client,
        }
    }

    /// Session id of this connection
    pub fn session(&self) -> Uuid {
        self.session
    }

    /// The underlying remote client
    pub fn client(&self) -> &dyn RemoteClient {
        self.client.as_ref()
    }
}

impl fmt::Debug for ActiveClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActiveClient")
            .field("session", &self.session)
            .finish_non_exhaustive()
    }
}

// ─────────────────────────────────────────────────────────────────
// State Machine
// ─────────────────────────────────────────────────────────────────

/// Owns the `(state, client)` pair
///
/// Invariant: `client.is_some() == state.holds_client()`.
#[derive(Debug, Default)]
pub struct ConnectionStateMachine {
    state: ConnectionState,
    client: Option<ActiveClient>,
}

impl ConnectionStateMachine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state tag
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Current client handle, if any
    pub fn client(&self) -> Option<&ActiveClient> {
        self.client.as_ref()
    }

    /// Whether the client/state invariant holds
    pub fn is_consistent(&self) -> bool {
        self.client.is_some() == self.state.holds_client()
    }

    /// `Disconnected` → `Connecting`, storing the new client
    pub fn begin_connect(&mut self, client: ActiveClient) -> Result<()> {
        if self.client.is_some() {
            return Err(Error::state_conflict(
                TaskKind::Connect,
                "an existing client already exists",
            ));
        }
        if self.state != ConnectionState::Disconnected {
            return Err(Error::state_conflict(
                TaskKind::Connect,
                format!("expected disconnected, found {}", self.state),
            ));
        }
        self.client = Some(client);
        self.state = ConnectionState::Connecting;
        debug_assert!(self.is_consistent());
        Ok(())
    }

    /// `Connecting` → `Connected`
    pub fn connect_succeeded(&mut self) -> Result<()> {
        if self.state != ConnectionState::Connecting {
            return Err(Error::state_conflict(
                TaskKind::Connect,
                format!("expected connecting, found {}", self.state),
            ));
        }
        self.state = ConnectionState::Connected;
        Ok(())
    }

    /// Any → `Disconnected`, dropping the client
    pub fn connect_failed(&mut self) -> Option<ActiveClient> {
        self.force_reset()
    }

    /// `Connected` → `Disconnecting`, returning the client to tear down
    pub fn begin_disconnect(&mut self) -> Result<ActiveClient> {
        let Some(client) = self.client.clone() else {
            return Err(Error::state_conflict(TaskKind::Disconnect, "no client to disconnect"));
        };
        if self.state != ConnectionState::Connected {
            return Err(Error::state_conflict(
                TaskKind::Disconnect,
                format!("expected connected, found {}", self.state),
            ));
        }
        self.state = ConnectionState::Disconnecting;
        Ok(client)
    }

    /// `Disconnecting` → `Disconnected`, dropping the client
    pub fn disconnect_completed(&mut self) -> Result<()> {
        if self.state != ConnectionState::Disconnecting {
            return Err(Error::state_conflict(
                TaskKind::Disconnect,
                format!("expected disconnecting, found {}", self.state),
            ));
        }
        self.client = None;
        self.state = ConnectionState::Disconnected;
        Ok(())
    }

    /// Unconditionally return to `Disconnected`
    pub fn force_reset(&mut self) -> Option<ActiveClient> {
        self.state = ConnectionState::Disconnected;
        self.client.take()
    }

    /// Snapshot the client for a command task; requires `Connected`
    pub fn connected_client(&self, task: TaskKind) -> Result<ActiveClient> {
        let Some(client) = self.client.clone() else {
            return Err(Error::state_conflict(task, "no client to send command to"));
        };
        if self.state != ConnectionState::Connected {
            return Err(Error::state_conflict(
                task,
                format!("expected connected, found {}", self.state),
            ));
        }
        Ok(client)
    }
}

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::{ClientFactory, MockServer};

    fn new_client() -> ActiveClient {
        ActiveClient::new(MockServer::new().create("test"))
    }

    fn connected_machine() -> ConnectionStateMachine {
        let mut machine = ConnectionStateMachine::new();
        machine.begin_connect(new_client()).unwrap();
        machine.connect_succeeded().unwrap();
        machine
    }

    fn is_conflict(result: Result<impl Sized>, task: TaskKind) -> bool {
        matches!(result, Err(Error::StateConflict { task: t, .. }) if t == task)
    }

    #[test]
    fn test_initial_state() {
        let machine = ConnectionStateMachine::new();
        assert_eq!(machine.state(), ConnectionState::Disconnected);
        assert!(machine.client().is_none());
        assert!(machine.is_consistent());
    }

    #[test]
    fn test_full_lifecycle() {
        let mut machine = ConnectionStateMachine::new();

        machine.begin_connect(new_client()).unwrap();
        assert_eq!(machine.state(), ConnectionState::Connecting);
        assert!(machine.is_consistent());

        machine.connect_succeeded().unwrap();
        assert_eq!(machine.state(), ConnectionState::Connected);
        assert!(machine.is_consistent());

        let session = machine.client().unwrap().session();
        let client = machine.begin_disconnect().unwrap();
        assert_eq!(client.session(), session);
        assert_eq!(machine.state(), ConnectionState::Disconnecting);
        assert!(machine.is_consistent());

        machine.disconnect_completed().unwrap();
        assert_eq!(machine.state(), ConnectionState::Disconnected);
        assert!(machine.client().is_none());
        assert!(machine.is_consistent());
    }

    #[test]
    fn test_begin_connect_rejects_existing_client() {
        let mut machine = connected_machine();
        let session = machine.client().unwrap().session();

        assert!(is_conflict(machine.begin_connect(new_client()), TaskKind::Connect));
        // The original client is untouched
        assert_eq!(machine.client().unwrap().session(), session);
        assert_eq!(machine.state(), ConnectionState::Connected);
    }

    #[test]
    fn test_connect_succeeded_requires_connecting() {
        let mut machine = ConnectionStateMachine::new();
        assert!(is_conflict(machine.connect_succeeded(), TaskKind::Connect));
        assert_eq!(machine.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn test_connect_failed_clears_client() {
        let mut machine = ConnectionStateMachine::new();
        machine.begin_connect(new_client()).unwrap();

        assert!(machine.connect_failed().is_some());
        assert_eq!(machine.state(), ConnectionState::Disconnected);
        assert!(machine.is_consistent());
    }

    #[test]
    fn test_begin_disconnect_requires_connected() {
        let mut machine = ConnectionStateMachine::new();
        assert!(is_conflict(machine.begin_disconnect(), TaskKind::Disconnect));

        machine.begin_connect(new_client()).unwrap();
        assert!(is_conflict(machine.begin_disconnect(), TaskKind::Disconnect));
        assert_eq!(machine.state(), ConnectionState::Connecting);
    }

    #[test]
    fn test_disconnect_completed_requires_disconnecting() {
        let mut machine = connected_machine();
        assert!(is_conflict(machine.disconnect_completed(), TaskKind::Disconnect));
        assert!(machine.client().is_some());
    }

    #[test]
    fn test_force_reset_from_disconnecting() {
        let mut machine = connected_machine();
        machine.begin_disconnect().unwrap();

        assert!(machine.force_reset().is_some());
        assert_eq!(machine.state(), ConnectionState::Disconnected);
        assert!(machine.is_consistent());
        assert!(machine.force_reset().is_none());
    }

    #[test]
    fn test_connected_client_snapshot() {
        let mut machine = ConnectionStateMachine::new();
        assert!(is_conflict(
            machine.connected_client(TaskKind::SendCommand),
            TaskKind::SendCommand
        ));

        machine.begin_connect(new_client()).unwrap();
        assert!(is_conflict(
            machine.connected_client(TaskKind::ClearAll),
            TaskKind::ClearAll
        ));

        machine.connect_succeeded().unwrap();
        assert!(machine.connected_client(TaskKind::SendCommand).is_ok());
    }

    #[test]
    fn test_state_predicates() {
        assert!(!ConnectionState::Disconnected.is_live());
        assert!(ConnectionState::Connecting.is_live());
        assert!(ConnectionState::Connected.is_live());
        assert!(!ConnectionState::Disconnecting.is_live());
        assert!(ConnectionState::Disconnecting.holds_client());
        assert_eq!(ConnectionState::Connected.to_string(), "connected");
    }
}
