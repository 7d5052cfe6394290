//! Pulse and strength policy
//!
//! Decides whether a note event produces a pulse and how strong it is.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

// ─────────────────────────────────────────────────────────────────
// Modes
// ─────────────────────────────────────────────────────────────────

/// Which note events produce a pulse
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PulseMode {
    Disabled,
    #[default]
    NoteMiss,
    NoteHit,
    EveryNote,
}

impl PulseMode {
    pub const ALL: [PulseMode; 4] = [
        PulseMode::Disabled,
        PulseMode::NoteMiss,
        PulseMode::NoteHit,
        PulseMode::EveryNote,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PulseMode::Disabled => "disabled",
            PulseMode::NoteMiss => "note-miss",
            PulseMode::NoteHit => "note-hit",
            PulseMode::EveryNote => "every-note",
        }
    }

    /// Whether `event` should pulse under this mode
    pub fn pulses_on(&self, event: NoteEvent) -> bool {
        match self {
            PulseMode::Disabled => false,
            PulseMode::NoteMiss => event == NoteEvent::Miss,
            PulseMode::NoteHit => event == NoteEvent::Hit,
            PulseMode::EveryNote => true,
        }
    }
}

impl fmt::Display for PulseMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PulseMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|mode| mode.as_str() == s.to_lowercase())
            .ok_or_else(|| {
                Error::config_field_invalid("pulse_mode", format!("unknown pulse mode '{s}'"))
            })
    }
}

/// What scales the pulse strength between the configured min and max
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StrengthMode {
    /// Always the maximum
    Disabled,
    /// Proportional to battery level
    #[default]
    Battery,
    /// Inversely proportional to battery level
    InverseBattery,
    /// Grows as the song progresses
    SongTime,
}

impl StrengthMode {
    pub const ALL: [StrengthMode; 4] = [
        StrengthMode::Disabled,
        StrengthMode::Battery,
        StrengthMode::InverseBattery,
        StrengthMode::SongTime,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StrengthMode::Disabled => "disabled",
            StrengthMode::Battery => "battery",
            StrengthMode::InverseBattery => "inverse-battery",
            StrengthMode::SongTime => "song-time",
        }
    }

    /// Scale factor in `0.0..=1.0` for the given context
    pub fn factor(&self, context: &StrengthContext) -> f64 {
        let factor = match self {
            StrengthMode::Disabled => 1.0,
            StrengthMode::Battery => unit(context.battery),
            StrengthMode::InverseBattery => 1.0 - unit(context.battery),
            StrengthMode::SongTime => unit(context.song_progress),
        };
        factor.clamp(0.0, 1.0)
    }
}

impl fmt::Display for StrengthMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StrengthMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|mode| mode.as_str() == s.to_lowercase())
            .ok_or_else(|| {
                Error::config_field_invalid("strength_mode", format!("unknown strength mode '{s}'"))
            })
    }
}

// ─────────────────────────────────────────────────────────────────
// Events & Context
// ─────────────────────────────────────────────────────────────────

/// Outcome of a single note
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoteEvent {
    Hit,
    Miss,
}

/// Game values the strength modes scale with
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StrengthContext {
    /// Battery (energy) level, `0.0..=1.0`
    pub battery: f64,
    /// Fraction of the song played, `0.0..=1.0`
    pub song_progress: f64,
}

impl Default for StrengthContext {
    fn default() -> Self {
        Self {
            battery: 0.5,
            song_progress: 0.0,
        }
    }
}

fn unit(value: f64) -> f64 {
    if value.is_finite() {
        value.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

// ─────────────────────────────────────────────────────────────────
// Settings
// ─────────────────────────────────────────────────────────────────

/// Haptic feedback settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HapticSettings {
    /// Master switch for note pulses
    pub enabled: bool,

    /// Pulse once at max strength when settings are previewed
    pub preview_enabled: bool,

    /// Which note events pulse
    pub pulse_mode: PulseMode,

    /// Length of one pulse in milliseconds
    pub pulse_length_ms: u64,

    /// What scales the pulse strength
    pub strength_mode: StrengthMode,

    /// Maximum strength in percent (0-100)
    pub max_strength: u8,

    /// Minimum strength in percent (0-100)
    pub min_strength: u8,

    /// Interval between pulse updates in milliseconds
    pub tick_interval_ms: u64,
}

impl Default for HapticSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            preview_enabled: false,
            pulse_mode: PulseMode::default(),
            pulse_length_ms: 300,
            strength_mode: StrengthMode::default(),
            max_strength: 100,
            min_strength: 0,
            tick_interval_ms: 20,
        }
    }
}

impl HapticSettings {
    pub fn pulse_length(&self) -> Duration {
        Duration::from_millis(self.pulse_length_ms)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    /// Maximum strength as an intensity
    pub fn max_intensity(&self) -> f64 {
        percent(self.max_strength)
    }

    /// Minimum strength as an intensity
    pub fn min_intensity(&self) -> f64 {
        percent(self.min_strength)
    }

    /// Pulse intensity for the given context
    pub fn strength(&self, context: &StrengthContext) -> f64 {
        let (min, max) = (self.min_intensity(), self.max_intensity());
        (min + (max - min) * self.strength_mode.factor(context)).clamp(0.0, 1.0)
    }
}

fn percent(value: u8) -> f64 {
    f64::from(value.min(100)) / 100.0
}
