//! Per-player tension model: discrete events raise a [0,1] scalar, the
//! periodic tick bleeds it back down once the inhibition window has passed.

use bevy::prelude::{Component, Query, Res};

use crate::{
    clock::MissionClock,
    config::{DirectorConfigHandle, IntensityConfig},
};

/// Event magnitude categories. `Maximum` pins the value to the ceiling no
/// matter the global multiplier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntensityCategory {
    Mild,
    Moderate,
    High,
    Extreme,
    Maximum,
}

impl IntensityCategory {
    pub fn base_magnitude(&self) -> f32 {
        match self {
            IntensityCategory::Mild => 0.05,
            IntensityCategory::Moderate => 0.2,
            IntensityCategory::High => 0.5,
            IntensityCategory::Extreme | IntensityCategory::Maximum => 1.0,
        }
    }
}

/// Tension tracker attached to each player-controlled unit.
#[derive(Component, Debug, Clone, Copy)]
pub struct Intensity {
    value: f32,
    decay_inhibited_until: f64,
}

impl Default for Intensity {
    fn default() -> Self {
        Self {
            value: 0.0,
            decay_inhibited_until: 0.0,
        }
    }
}

impl Intensity {
    pub fn current(&self) -> f32 {
        self.value
    }

    /// Apply one discrete event. Pushes the inhibition window forward but
    /// never shortens one already in flight.
    pub fn increase(&mut self, category: IntensityCategory, now: f64, cfg: &IntensityConfig) {
        if category == IntensityCategory::Maximum {
            self.value = 1.0;
        } else {
            let magnitude = category.base_magnitude() * cfg.multiplier();
            self.value = (self.value + magnitude).clamp(0.0, 1.0);
        }
        let inhibit_until = now + cfg.inhibit_delay();
        if inhibit_until > self.decay_inhibited_until {
            self.decay_inhibited_until = inhibit_until;
        }
    }

    /// Periodic decay. A no-op while inhibited.
    pub fn update(&mut self, dt: f64, now: f64, cfg: &IntensityConfig) {
        if now < self.decay_inhibited_until {
            return;
        }
        let decay = (dt / cfg.decay_duration()) as f32;
        self.value = (self.value - decay).max(0.0);
    }

    /// Immediate zero, independent of inhibition.
    pub fn reset(&mut self) {
        self.value = 0.0;
    }

    /// Re-arm the inhibition window without changing the value.
    pub fn inhibit_decay(&mut self, now: f64, cfg: &IntensityConfig) {
        let inhibit_until = now + cfg.inhibit_delay();
        if inhibit_until > self.decay_inhibited_until {
            self.decay_inhibited_until = inhibit_until;
        }
    }
}

/// Ticks every player's intensity.
pub fn update_intensity(
    clock: Res<MissionClock>,
    config: Res<DirectorConfigHandle>,
    mut players: Query<&mut Intensity>,
) {
    let cfg = config.get();
    let now = clock.now();
    let dt = clock.dt;
    for mut intensity in players.iter_mut() {
        intensity.update(dt, now, cfg.intensity());
    }
}

/// Maximum intensity across all players; 0 when no players are alive.
pub fn max_intensity(players: &Query<&Intensity>) -> f32 {
    players
        .iter()
        .map(|i| i.current())
        .fold(0.0_f32, f32::max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DirectorConfig;

    fn cfg() -> DirectorConfig {
        DirectorConfig::from_json_str("{}").unwrap()
    }

    #[test]
    fn increase_clamps_to_unit_interval() {
        let config = cfg();
        let mut intensity = Intensity::default();
        for _ in 0..8 {
            intensity.increase(IntensityCategory::Extreme, 0.0, config.intensity());
        }
        assert_eq!(intensity.current(), 1.0);

        intensity.increase(IntensityCategory::Maximum, 0.0, config.intensity());
        assert_eq!(intensity.current(), 1.0);
    }

    #[test]
    fn maximum_pins_to_one_even_with_zero_multiplier() {
        let config = DirectorConfig::from_json_str(r#"{ "intensity": { "multiplier": 0.0 } }"#)
            .unwrap();
        let mut intensity = Intensity::default();
        intensity.increase(IntensityCategory::Maximum, 0.0, config.intensity());
        assert_eq!(intensity.current(), 1.0);
        assert!(intensity.current().is_finite());

        // Other categories become no-ops under a zero multiplier, never NaN.
        intensity.reset();
        intensity.increase(IntensityCategory::Extreme, 0.0, config.intensity());
        assert_eq!(intensity.current(), 0.0);
    }

    #[test]
    fn high_event_is_half_then_holds_through_inhibition() {
        // Scenario: value 0.0, High with multiplier 1.0 -> 0.5, and an update
        // inside the inhibit window leaves it untouched.
        let config = cfg();
        let mut intensity = Intensity::default();
        intensity.increase(IntensityCategory::High, 10.0, config.intensity());
        assert!((intensity.current() - 0.5).abs() < f32::EPSILON);

        intensity.update(1.0, 10.5, config.intensity());
        assert!((intensity.current() - 0.5).abs() < f32::EPSILON);
    }

    #[test]
    fn decays_once_inhibition_passes() {
        let config = cfg();
        let mut intensity = Intensity::default();
        intensity.increase(IntensityCategory::High, 0.0, config.intensity());

        let after_inhibit = config.intensity().inhibit_delay() + 1.0;
        intensity.update(6.0, after_inhibit, config.intensity());
        let once = intensity.current();
        assert!(once < 0.5);

        intensity.update(6.0, after_inhibit + 6.0, config.intensity());
        assert!(intensity.current() < once);
    }

    #[test]
    fn decay_floors_at_zero() {
        let config = cfg();
        let mut intensity = Intensity::default();
        intensity.increase(IntensityCategory::Mild, 0.0, config.intensity());
        intensity.update(10_000.0, 1_000.0, config.intensity());
        assert_eq!(intensity.current(), 0.0);
    }

    #[test]
    fn reset_zeroes_regardless_of_inhibition() {
        let config = cfg();
        let mut intensity = Intensity::default();
        intensity.increase(IntensityCategory::Extreme, 5.0, config.intensity());
        intensity.reset();
        assert_eq!(intensity.current(), 0.0);
    }

    #[test]
    fn later_increase_never_shortens_inhibition() {
        let config = cfg();
        let mut intensity = Intensity::default();
        intensity.increase(IntensityCategory::Moderate, 10.0, config.intensity());
        let held = intensity.decay_inhibited_until;
        // An earlier-now increase (same tick reordering) must not pull the
        // window back.
        intensity.increase(IntensityCategory::Mild, 8.0, config.intensity());
        assert!(intensity.decay_inhibited_until >= held);
    }
}
