//! Haptic coordinator
//!
//! Turns game events into intensities for the connection manager. Pulses are
//! folded by a [`PulseAccumulator`]; only changes are forwarded.

use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, warn};
use url::Url;

use crate::connection::ConnectionManager;
use crate::error::{Error, Result};

use super::{HapticSettings, NoteEvent, PulseAccumulator, StrengthContext};

/// Front end for everything that wants to make the devices vibrate
pub struct HapticCoordinator {
    manager: ConnectionManager,
    settings: RwLock<HapticSettings>,
    pulses: Mutex<PulseAccumulator>,
}

impl HapticCoordinator {
    pub fn new(manager: ConnectionManager, settings: HapticSettings) -> Self {
        Self {
            manager,
            settings: RwLock::new(settings),
            pulses: Mutex::new(PulseAccumulator::new()),
        }
    }

    /// The underlying connection manager
    pub fn manager(&self) -> &ConnectionManager {
        &self.manager
    }

    pub fn settings(&self) -> HapticSettings {
        self.settings.read().clone()
    }

    pub fn set_settings(&self, settings: HapticSettings) {
        *self.settings.write() = settings;
    }

    /// Connect to the server at `server`
    ///
    /// Only `ws://` and `wss://` addresses are accepted.
    pub fn connect(&self, server: &str) -> Result<()> {
        let address = Url::parse(server)
            .map_err(|e| e.to_string())
            .and_then(|url| match url.scheme() {
                "ws" | "wss" => Ok(url),
                other => Err(format!("unsupported scheme '{other}', expected ws or wss")),
            })
            .map_err(|message| {
                warn!(address = server, error = %message, "Invalid device server address");
                Error::invalid_address(server, message)
            })?;
        self.manager.connect(address);
        Ok(())
    }

    pub fn disconnect(&self) {
        self.manager.disconnect();
    }

    /// Send an intensity directly, bypassing the pulses
    pub fn set_intensity(&self, intensity: f64) {
        self.manager.send_intensity(intensity);
    }

    pub fn stop_all(&self) {
        self.manager.stop_all();
    }

    /// Start a pulse of `intensity` lasting `duration`
    pub fn pulse(&self, intensity: f64, duration: Duration) {
        let changed = self.pulses.lock().add(intensity, duration);
        self.forward(changed);
    }

    /// Advance the pulses by `elapsed`
    pub fn tick(&self, elapsed: Duration) {
        let changed = self.pulses.lock().tick(elapsed);
        self.forward(changed);
    }

    /// Current pulse intensity
    pub fn intensity(&self) -> f64 {
        self.pulses.lock().intensity()
    }

    /// React to a note; returns whether it produced a pulse
    pub fn on_note(&self, event: NoteEvent, context: &StrengthContext) -> bool {
        let settings = self.settings.read().clone();
        if !settings.enabled || !settings.pulse_mode.pulses_on(event) {
            return false;
        }

        let strength = settings.strength(context);
        debug!(event = ?event, strength, "Note pulse");
        self.pulse(strength, settings.pulse_length());
        true
    }

    /// Pulse once at max strength if previews are enabled
    pub fn preview(&self) -> bool {
        let settings = self.settings.read().clone();
        if !settings.preview_enabled {
            return false;
        }
        self.pulse(settings.max_intensity(), settings.pulse_length());
        true
    }

    /// Drop all pulses and shut the connection down
    pub async fn shutdown(&self) -> Result<()> {
        self.pulses.lock().clear();
        self.manager.shutdown().await
    }

    fn forward(&self, changed: Option<f64>) {
        if let Some(intensity) = changed {
            self.manager.send_intensity(intensity);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tokio::runtime::Handle;

    use super::*;
    use crate::connection::ManagerConfig;
    use crate::haptics::{PulseMode, StrengthMode};
    use crate::remote::MockServer;

    fn coordinator(settings: HapticSettings) -> (HapticCoordinator, MockServer) {
        let server = MockServer::new();
        let manager = ConnectionManager::new(
            ManagerConfig::default(),
            Arc::new(server.clone()),
            Handle::current(),
        );
        (HapticCoordinator::new(manager, settings), server)
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_address_is_rejected() {
        let (haptics, server) = coordinator(HapticSettings::default());

        let err = haptics.connect("not a url").unwrap_err();
        assert!(matches!(err, Error::InvalidAddress { .. }));
        haptics.manager().wait_idle().await;
        assert_eq!(server.clients_created(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_websocket_address_is_rejected() {
        let (haptics, server) = coordinator(HapticSettings::default());

        for address in ["http://127.0.0.1:12345", "mailto:x"] {
            let err = haptics.connect(address).unwrap_err();
            assert!(matches!(err, Error::InvalidAddress { .. }));
        }
        haptics.manager().wait_idle().await;
        assert_eq!(server.clients_created(), 0);
        assert_eq!(
            haptics.manager().state(),
            crate::connection::ConnectionState::Disconnected
        );

        assert!(haptics.connect("wss://127.0.0.1:12345").is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_on_note_honours_pulse_mode() {
        let (haptics, _server) = coordinator(HapticSettings {
            pulse_mode: PulseMode::NoteHit,
            strength_mode: StrengthMode::Disabled,
            ..Default::default()
        });
        let ctx = StrengthContext::default();

        assert!(!haptics.on_note(NoteEvent::Miss, &ctx));
        assert_eq!(haptics.intensity(), 0.0);

        assert!(haptics.on_note(NoteEvent::Hit, &ctx));
        assert_eq!(haptics.intensity(), 1.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_disabled_settings_suppress_pulses() {
        let (haptics, _server) = coordinator(HapticSettings {
            enabled: false,
            pulse_mode: PulseMode::EveryNote,
            ..Default::default()
        });
        assert!(!haptics.on_note(NoteEvent::Miss, &StrengthContext::default()));
        assert!(!haptics.preview());
    }

    #[tokio::test(start_paused = true)]
    async fn test_pulse_decays_on_tick() {
        let (haptics, _server) = coordinator(HapticSettings::default());

        haptics.pulse(0.6, Duration::from_millis(100));
        assert_eq!(haptics.intensity(), 0.6);

        haptics.tick(Duration::from_millis(60));
        assert_eq!(haptics.intensity(), 0.6);
        haptics.tick(Duration::from_millis(60));
        assert_eq!(haptics.intensity(), 0.0);
    }
}
