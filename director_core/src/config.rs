use std::{
    env, fs, io,
    path::{Path, PathBuf},
    sync::Arc,
};

use bevy::prelude::Resource;
use serde::Deserialize;
use thiserror::Error;

pub const BUILTIN_DIRECTOR_CONFIG: &str = include_str!("data/director_config.json");

/// All pacing tunables, loaded once at app construction. Every accessor
/// clamps to a safe range at the read site; an out-of-range value in the
/// file can skew pacing but never abort a mission.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DirectorConfig {
    mission: MissionConfig,
    intensity: IntensityConfig,
    pacing: PacingConfig,
    hordes: HordeConfig,
    wanderers: WandererConfig,
    spawning: SpawningConfig,
}

impl DirectorConfig {
    pub fn builtin() -> Arc<Self> {
        Arc::new(
            serde_json::from_str(BUILTIN_DIRECTOR_CONFIG)
                .expect("builtin director config should parse"),
        )
    }

    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn from_file(path: &Path) -> Result<Self, DirectorConfigError> {
        let contents =
            fs::read_to_string(path).map_err(|source| DirectorConfigError::ReadFailed {
                path: path.to_path_buf(),
                source,
            })?;
        let config = DirectorConfig::from_json_str(&contents)?;
        Ok(config)
    }

    pub fn mission(&self) -> &MissionConfig {
        &self.mission
    }

    pub fn intensity(&self) -> &IntensityConfig {
        &self.intensity
    }

    pub fn pacing(&self) -> &PacingConfig {
        &self.pacing
    }

    pub fn hordes(&self) -> &HordeConfig {
        &self.hordes
    }

    pub fn wanderers(&self) -> &WandererConfig {
        &self.wanderers
    }

    pub fn spawning(&self) -> &SpawningConfig {
        &self.spawning
    }
}

#[derive(Debug, Error)]
pub enum DirectorConfigError {
    #[error("failed to parse director config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("failed to read director config from {path:?}: {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MissionConfig {
    seed: u64,
    tick_dt: f64,
    hordes_enabled: bool,
    wanderers_enabled: bool,
    control_static_spawners: bool,
    missions_per_difficulty: u32,
}

impl MissionConfig {
    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn tick_dt(&self) -> f64 {
        self.tick_dt.max(0.01)
    }

    pub fn hordes_enabled(&self) -> bool {
        self.hordes_enabled
    }

    pub fn wanderers_enabled(&self) -> bool {
        self.wanderers_enabled
    }

    pub fn control_static_spawners(&self) -> bool {
        self.control_static_spawners
    }

    pub fn missions_per_difficulty(&self) -> u32 {
        self.missions_per_difficulty.max(1)
    }
}

impl Default for MissionConfig {
    fn default() -> Self {
        Self {
            seed: 0x5EED_D1EC,
            tick_dt: 0.1,
            hordes_enabled: true,
            wanderers_enabled: true,
            control_static_spawners: false,
            missions_per_difficulty: 2,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IntensityConfig {
    multiplier: f32,
    decay_duration: f64,
    inhibit_delay: f64,
    kill_radius: f32,
}

impl IntensityConfig {
    pub fn multiplier(&self) -> f32 {
        self.multiplier.max(0.0)
    }

    pub fn decay_duration(&self) -> f64 {
        self.decay_duration.max(1.0)
    }

    pub fn inhibit_delay(&self) -> f64 {
        self.inhibit_delay.max(0.0)
    }

    /// Radius inside which a kill is close enough to raise a player's tension.
    pub fn kill_radius(&self) -> f32 {
        self.kill_radius.max(1.0)
    }
}

impl Default for IntensityConfig {
    fn default() -> Self {
        Self {
            multiplier: 1.0,
            decay_duration: 60.0,
            inhibit_delay: 4.0,
            kill_radius: 30.0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PacingConfig {
    initial_wait: f64,
    relaxed_min: f64,
    relaxed_max: f64,
    peak_min: f64,
    peak_max: f64,
}

impl PacingConfig {
    pub fn initial_wait(&self) -> f64 {
        self.initial_wait.max(0.01)
    }

    pub fn relaxed_range(&self) -> (f64, f64) {
        ordered_range(self.relaxed_min, self.relaxed_max, 0.01)
    }

    pub fn peak_range(&self) -> (f64, f64) {
        ordered_range(self.peak_min, self.peak_max, 0.01)
    }
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            initial_wait: 45.0,
            relaxed_min: 15.0,
            relaxed_max: 30.0,
            peak_min: 3.0,
            peak_max: 6.0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HordeConfig {
    interval_min: f64,
    interval_max: f64,
    finale_interval_min: f64,
    finale_interval_max: f64,
    retry_delay_min: f64,
    retry_delay_max: f64,
    cooldown_delay: f64,
    interaction_lead_min: f64,
    interaction_lead_max: f64,
    size_min: u32,
    size_max: u32,
    max_size: u32,
    awake_cap: u32,
    spawn_distance_min: f32,
    spawn_distance_max: f32,
    search_attempts: u32,
    batch_retry_delay: f64,
}

impl HordeConfig {
    pub fn interval_range(&self, finale: bool) -> (f64, f64) {
        if finale {
            ordered_range(self.finale_interval_min, self.finale_interval_max, 0.01)
        } else {
            ordered_range(self.interval_min, self.interval_max, 0.01)
        }
    }

    pub fn retry_range(&self) -> (f64, f64) {
        ordered_range(self.retry_delay_min, self.retry_delay_max, 0.01)
    }

    pub fn cooldown_delay(&self) -> f64 {
        self.cooldown_delay.max(0.01)
    }

    /// Horde-timer window forced when a key interaction begins.
    pub fn interaction_lead_range(&self) -> (f64, f64) {
        ordered_range(self.interaction_lead_min, self.interaction_lead_max, 0.01)
    }

    pub fn size_range(&self) -> (u32, u32) {
        let min = self.size_min.max(1);
        (min, self.size_max.max(min))
    }

    pub fn max_size(&self) -> u32 {
        self.max_size.max(1)
    }

    pub fn awake_cap(&self) -> u32 {
        self.awake_cap.max(1)
    }

    pub fn spawn_distance_range(&self) -> (f32, f32) {
        let min = self.spawn_distance_min.max(1.0);
        (min, self.spawn_distance_max.max(min))
    }

    /// Search attempts per request; bounded so a request never spins within
    /// one tick.
    pub fn search_attempts(&self) -> u32 {
        self.search_attempts.clamp(1, 64)
    }

    pub fn batch_retry_delay(&self) -> f64 {
        self.batch_retry_delay.max(0.01)
    }
}

impl Default for HordeConfig {
    fn default() -> Self {
        Self {
            interval_min: 90.0,
            interval_max: 150.0,
            finale_interval_min: 20.0,
            finale_interval_max: 35.0,
            retry_delay_min: 4.0,
            retry_delay_max: 8.0,
            cooldown_delay: 25.0,
            interaction_lead_min: 5.0,
            interaction_lead_max: 10.0,
            size_min: 6,
            size_max: 12,
            max_size: 24,
            awake_cap: 30,
            spawn_distance_min: 20.0,
            spawn_distance_max: 45.0,
            search_attempts: 12,
            batch_retry_delay: 1.5,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WandererConfig {
    initial_min: f64,
    initial_max: f64,
    change_min: f64,
    change_max: f64,
    interval_floor: f64,
    awake_cap: u32,
    melee_awake_cap: u32,
}

impl WandererConfig {
    pub fn initial_range(&self) -> (f64, f64) {
        ordered_range(self.initial_min, self.initial_max, 0.01)
    }

    /// Multiplicative shrink factor per spawn, kept strictly below 1 so the
    /// trickle always accelerates toward the floor.
    pub fn change_range(&self) -> (f64, f64) {
        let min = self.change_min.clamp(0.01, 0.99);
        let max = self.change_max.clamp(min, 0.99);
        (min, max)
    }

    pub fn interval_floor(&self) -> f64 {
        self.interval_floor.max(0.1)
    }

    pub fn awake_cap(&self) -> u32 {
        self.awake_cap.max(1)
    }

    /// Melee saturation point; a wanderer draw at or over it is diverted to
    /// a ranged class.
    pub fn melee_awake_cap(&self) -> u32 {
        self.melee_awake_cap.max(1)
    }
}

impl Default for WandererConfig {
    fn default() -> Self {
        Self {
            initial_min: 10.0,
            initial_max: 20.0,
            change_min: 0.85,
            change_max: 0.95,
            interval_floor: 2.0,
            awake_cap: 20,
            melee_awake_cap: 12,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SpawningConfig {
    candidate_refresh_interval: f64,
    candidate_split_distance: f32,
    min_open_area: u32,
    jitter_radius: f32,
    min_player_distance: f32,
    ground_extent: f32,
}

impl SpawningConfig {
    pub fn candidate_refresh_interval(&self) -> f64 {
        self.candidate_refresh_interval.max(0.5)
    }

    /// Distance from the nearest player that splits candidate nodes into the
    /// frontier set (far, preferred for hordes) and the interior set.
    pub fn candidate_split_distance(&self) -> f32 {
        self.candidate_split_distance.max(1.0)
    }

    pub fn min_open_area(&self) -> u32 {
        self.min_open_area.max(1)
    }

    pub fn jitter_radius(&self) -> f32 {
        self.jitter_radius.max(0.0)
    }

    pub fn min_player_distance(&self) -> f32 {
        self.min_player_distance.max(0.0)
    }

    pub fn ground_extent(&self) -> f32 {
        self.ground_extent.max(0.1)
    }
}

impl Default for SpawningConfig {
    fn default() -> Self {
        Self {
            candidate_refresh_interval: 10.0,
            candidate_split_distance: 25.0,
            min_open_area: 6,
            jitter_radius: 2.5,
            min_player_distance: 12.0,
            ground_extent: 3.0,
        }
    }
}

fn ordered_range(min: f64, max: f64, floor: f64) -> (f64, f64) {
    let min = min.max(floor);
    (min, max.max(min))
}

#[derive(Resource, Debug, Clone)]
pub struct DirectorConfigHandle(Arc<DirectorConfig>);

impl DirectorConfigHandle {
    pub fn new(config: Arc<DirectorConfig>) -> Self {
        Self(config)
    }

    pub fn get(&self) -> Arc<DirectorConfig> {
        Arc::clone(&self.0)
    }

    pub fn config(&self) -> &DirectorConfig {
        &self.0
    }
}

pub fn load_director_config_from_env() -> Arc<DirectorConfig> {
    let override_path = env::var("DIRECTOR_CONFIG_PATH").ok().map(PathBuf::from);

    if let Some(path) = override_path {
        match DirectorConfig::from_file(&path) {
            Ok(config) => {
                tracing::info!(
                    target: "horde_director::config",
                    path = %path.display(),
                    "director_config.loaded=file"
                );
                return Arc::new(config);
            }
            Err(err) => {
                tracing::warn!(
                    target: "horde_director::config",
                    path = %path.display(),
                    error = %err,
                    "director_config.load_failed"
                );
            }
        }
    }

    tracing::info!(
        target: "horde_director::config",
        "director_config.loaded=builtin"
    );
    DirectorConfig::builtin()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_config_parses() {
        let config = DirectorConfig::builtin();
        assert!(config.mission().hordes_enabled());
        let (min, max) = config.hordes().interval_range(false);
        assert!(min <= max);
    }

    #[test]
    fn missing_sections_fall_back_to_defaults() {
        let config = DirectorConfig::from_json_str("{}").unwrap();
        assert!(config.pacing().initial_wait() > 0.0);
        assert!(config.wanderers().interval_floor() > 0.0);
    }

    #[test]
    fn out_of_range_values_clamp_at_read_site() {
        let config = DirectorConfig::from_json_str(
            r#"{
                "intensity": { "decay_duration": -10.0 },
                "hordes": { "interval_min": 50.0, "interval_max": 5.0, "search_attempts": 10000 },
                "wanderers": { "change_min": 1.8, "change_max": 2.5 }
            }"#,
        )
        .unwrap();
        assert!(config.intensity().decay_duration() >= 1.0);
        let (min, max) = config.hordes().interval_range(false);
        assert!(min <= max);
        assert!(config.hordes().search_attempts() <= 64);
        let (cmin, cmax) = config.wanderers().change_range();
        assert!(cmin <= cmax && cmax < 1.0);
    }
}
