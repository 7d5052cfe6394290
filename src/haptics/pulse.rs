//! Pulse accumulator
//!
//! Tracks short-lived vibration pulses and folds them into one intensity:
//! the strongest pulse still running wins.

use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq)]
struct Pulse {
    intensity: f64,
    remaining: Duration,
}

/// Set of active pulses plus the last intensity reported for them
#[derive(Debug, Default)]
pub struct PulseAccumulator {
    pulses: Vec<Pulse>,
    intensity: f64,
}

impl PulseAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a pulse and re-evaluate
    ///
    /// Returns the new intensity if it changed.
    pub fn add(&mut self, intensity: f64, duration: Duration) -> Option<f64> {
        if intensity.is_finite() && !duration.is_zero() {
            self.pulses.push(Pulse {
                intensity: intensity.clamp(0.0, 1.0),
                remaining: duration,
            });
        }
        self.tick(Duration::ZERO)
    }

    /// Advance every pulse by `elapsed`, drop the expired ones and re-evaluate
    ///
    /// Returns the new intensity if it changed.
    pub fn tick(&mut self, elapsed: Duration) -> Option<f64> {
        for pulse in &mut self.pulses {
            pulse.remaining = pulse.remaining.saturating_sub(elapsed);
        }
        self.pulses.retain(|p| !p.remaining.is_zero());

        let strongest = self
            .pulses
            .iter()
            .map(|p| p.intensity)
            .fold(0.0, f64::max);

        if strongest == self.intensity {
            None
        } else {
            self.intensity = strongest;
            Some(strongest)
        }
    }

    /// Last intensity reported
    pub fn intensity(&self) -> f64 {
        self.intensity
    }

    /// Number of pulses still running
    pub fn active_count(&self) -> usize {
        self.pulses.len()
    }

    /// Drop every pulse; the reported intensity falls back to zero
    pub fn clear(&mut self) -> Option<f64> {
        self.pulses.clear();
        self.tick(Duration::ZERO)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn test_empty_accumulator_is_silent() {
        let mut pulses = PulseAccumulator::new();
        assert_eq!(pulses.tick(ms(16)), None);
        assert_eq!(pulses.intensity(), 0.0);
    }

    #[test]
    fn test_add_reports_immediately() {
        let mut pulses = PulseAccumulator::new();
        assert_eq!(pulses.add(0.6, ms(300)), Some(0.6));
        assert_eq!(pulses.active_count(), 1);
    }

    #[test]
    fn test_strongest_pulse_wins() {
        let mut pulses = PulseAccumulator::new();
        pulses.add(0.3, ms(500));
        assert_eq!(pulses.add(0.8, ms(100)), Some(0.8));

        // Weaker pulse added while a stronger one runs changes nothing
        assert_eq!(pulses.add(0.5, ms(200)), None);

        // Strong pulse expires, next strongest takes over
        assert_eq!(pulses.tick(ms(100)), Some(0.5));
        assert_eq!(pulses.tick(ms(100)), Some(0.3));
        assert_eq!(pulses.tick(ms(300)), Some(0.0));
        assert_eq!(pulses.active_count(), 0);
    }

    #[test]
    fn test_tick_without_change_reports_nothing() {
        let mut pulses = PulseAccumulator::new();
        pulses.add(0.4, ms(100));
        assert_eq!(pulses.tick(ms(50)), None);
        assert_eq!(pulses.intensity(), 0.4);
    }

    #[test]
    fn test_invalid_pulses_are_ignored() {
        let mut pulses = PulseAccumulator::new();
        assert_eq!(pulses.add(f64::NAN, ms(100)), None);
        assert_eq!(pulses.add(0.5, Duration::ZERO), None);
        assert_eq!(pulses.active_count(), 0);
    }

    #[test]
    fn test_intensity_is_clamped() {
        let mut pulses = PulseAccumulator::new();
        assert_eq!(pulses.add(2.5, ms(100)), Some(1.0));
    }

    #[test]
    fn test_clear() {
        let mut pulses = PulseAccumulator::new();
        pulses.add(0.7, ms(100));
        assert_eq!(pulses.clear(), Some(0.0));
        assert_eq!(pulses.clear(), None);
    }
}
