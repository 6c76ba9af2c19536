//! Headless demo mission: two players wander a grid arena while the director
//! paces hordes and wanderers around them. Useful for eyeballing pacing logs
//! (`RUST_LOG=horde_director=debug`).

use bevy::math::Vec3;
use tracing::info;

use director_core::{
    build_mission_app, on_mission_started, run_tick, DirectorTelemetry, FinaleTriggered,
    Intensity, MissionClock, PlayerUnit, StaticSpawnPoint, UnitClass,
};

const MISSION_TICKS: u64 = 6_000;
const FINALE_AT_TICK: u64 = 5_000;
const REPORT_EVERY: u64 = 250;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let mut app = build_mission_app();

    app.world.spawn((
        PlayerUnit::new(Vec3::new(8.5, 0.0, 8.5), 100.0),
        Intensity::default(),
    ));
    app.world.spawn((
        PlayerUnit::new(Vec3::new(10.5, 0.0, 9.5), 100.0),
        Intensity::default(),
    ));

    let now = app.world.resource::<MissionClock>().now();
    let mut door_guard = StaticSpawnPoint::new(UnitClass::Skulk, Vec3::new(40.5, 0.0, 40.5), 12.0)
        .with_budget(6);
    door_guard.begin(now);
    app.world.spawn(door_guard);

    on_mission_started(&mut app.world);
    info!(target: "horde_director::demo", ticks = MISSION_TICKS, "demo.mission.begin");

    for tick in 0..MISSION_TICKS {
        if tick == FINALE_AT_TICK {
            app.world.send_event(FinaleTriggered);
        }
        run_tick(&mut app);

        if tick % REPORT_EVERY == 0 {
            let telemetry = app.world.resource::<DirectorTelemetry>().clone();
            info!(
                target: "horde_director::demo",
                tick = telemetry.tick,
                spawning = telemetry.spawning_aliens,
                finale = telemetry.finale_active,
                max_intensity = telemetry.max_intensity,
                awake = telemetry.awake_units,
                hordes = telemetry.hordes_launched,
                wanderers = telemetry.wanderers_spawned,
                "demo.pacing.report"
            );
        }
    }

    let telemetry = app.world.resource::<DirectorTelemetry>().clone();
    info!(
        target: "horde_director::demo",
        units_spawned = telemetry.units_spawned,
        hordes = telemetry.hordes_launched,
        horde_failures = telemetry.horde_requests_failed,
        wanderers = telemetry.wanderers_spawned,
        static_granted = telemetry.static_spawns_granted,
        "demo.mission.end"
    );
}
