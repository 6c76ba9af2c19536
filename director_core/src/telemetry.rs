use bevy::prelude::{Query, Res, ResMut, Resource};

use crate::{
    clock::MissionClock, director::DirectorState, intensity::Intensity, spawner::SpawnManager,
    units::PlayerUnit,
};

/// Rolling pacing metrics, refreshed at the end of every tick. Gameplay
/// never reads it.
#[derive(Resource, Default, Debug, Clone)]
pub struct DirectorTelemetry {
    pub tick: u64,
    pub spawning_aliens: bool,
    pub reached_peak: bool,
    pub finale_active: bool,
    pub max_intensity: f32,
    pub avg_intensity: f32,
    pub lowest_health_fraction: f32,
    pub awake_units: u32,
    pub awake_melee_units: u32,
    pub hordes_launched: u32,
    pub horde_requests_failed: u32,
    pub horde_cooldowns: u32,
    pub wanderers_spawned: u32,
    pub units_spawned: u32,
    pub static_spawns_granted: u32,
    pub static_spawns_denied: u32,
}

pub fn collect_telemetry(
    clock: Res<MissionClock>,
    state: Res<DirectorState>,
    manager: Res<SpawnManager>,
    players: Query<(&PlayerUnit, &Intensity)>,
    mut telemetry: ResMut<DirectorTelemetry>,
) {
    telemetry.tick = clock.tick;
    telemetry.spawning_aliens = state.spawning_aliens;
    telemetry.reached_peak = state.reached_intensity_peak;
    telemetry.finale_active = state.finale_active;
    telemetry.awake_units = manager.awake_units();
    telemetry.awake_melee_units = manager.awake_melee_units();

    let mut max = 0.0_f32;
    let mut sum = 0.0_f32;
    let mut lowest_health = 1.0_f32;
    let mut count = 0u32;
    for (player, intensity) in players.iter() {
        let value = intensity.current();
        max = max.max(value);
        sum += value;
        lowest_health = lowest_health.min(player.health_fraction());
        count += 1;
    }
    telemetry.max_intensity = max;
    telemetry.avg_intensity = if count > 0 { sum / count as f32 } else { 0.0 };
    telemetry.lowest_health_fraction = if count > 0 { lowest_health } else { 1.0 };
}
