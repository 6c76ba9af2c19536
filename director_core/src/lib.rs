//! Adaptive pacing engine for the cooperative horde-survival prototype.
//!
//! Decides when, where, and how many hostile units enter a mission. One
//! simulation tick is resolved per [`run_tick`] call; all waiting is stored
//! deadlines checked on later ticks, never blocked calls.

pub mod clock;
pub mod config;
pub mod director;
pub mod intensity;
pub mod nav;
pub mod spawn_point;
pub mod spawner;
pub mod telemetry;
pub mod units;

use std::sync::Arc;

use bevy::prelude::*;

pub use clock::{CountdownTimer, MissionClock};
pub use config::{
    load_director_config_from_env, DirectorConfig, DirectorConfigError, DirectorConfigHandle,
};
pub use director::{
    can_spawn_alien, difficulty_tier, on_mission_ended, on_mission_started, DirectorRng,
    DirectorState, FinaleTriggered, MissionProgress, PacingPhase,
};
pub use intensity::{Intensity, IntensityCategory};
pub use nav::{GridNavMesh, NavNodeId, NavQuery, NavService, OpenArea};
pub use spawn_point::{SpawnPointState, StaticSpawnDied, StaticSpawnPoint};
pub use spawner::SpawnManager;
pub use telemetry::DirectorTelemetry;
pub use units::{
    DangerRating, HostileUnit, KeyInteractionStarted, PlayerDamaged, PlayerUnit,
    SpawnPointTriggered, UnitClass, UnitKilled, UnitSlept, UnitWoke,
};

/// Construct a headless Bevy [`App`] wired with the director tick pipeline.
/// The host replaces the default [`NavService`] with its own navigation
/// graph; the grid arena installed here covers tests and the demo runner.
pub fn build_mission_app() -> App {
    let config = load_director_config_from_env();
    build_mission_app_with_config(config)
}

/// [`build_mission_app`] with an explicit config.
pub fn build_mission_app_with_config(config: Arc<DirectorConfig>) -> App {
    let mut app = App::new();

    let seed = config.mission().seed();
    let clock = MissionClock::with_dt(config.mission().tick_dt());
    let state = DirectorState::from_config(&config);

    app.insert_resource(DirectorConfigHandle::new(config))
        .insert_resource(clock)
        .insert_resource(state)
        .insert_resource(SpawnManager::from_seed(seed))
        .insert_resource(DirectorRng::from_seed(seed))
        .insert_resource(MissionProgress::default())
        .insert_resource(DirectorTelemetry::default())
        .insert_resource(NavService::new(Arc::new(GridNavMesh::arena(48, 48, 1.0))))
        .add_event::<UnitWoke>()
        .add_event::<UnitSlept>()
        .add_event::<UnitKilled>()
        .add_event::<PlayerDamaged>()
        .add_event::<KeyInteractionStarted>()
        .add_event::<SpawnPointTriggered>()
        .add_event::<StaticSpawnDied>()
        .add_event::<FinaleTriggered>()
        .add_plugins(MinimalPlugins)
        .add_systems(
            Update,
            (
                clock::advance_clock,
                units::activate_units,
                director::apply_combat_events,
                intensity::update_intensity,
                spawner::spawn_manager_tick,
                director::schedule_hordes,
                director::update_pacing,
                director::schedule_wanderers,
                spawn_point::update_static_spawn_points,
                telemetry::collect_telemetry,
            )
                .chain(),
        );

    app
}

/// Execute a single simulation tick: the chained systems from
/// [`build_mission_app`], in their fixed order.
pub fn run_tick(app: &mut App) {
    app.update();
}
