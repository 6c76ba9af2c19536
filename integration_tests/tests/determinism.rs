//! Two missions with the same seed must make identical pacing decisions and
//! place identical units.

use std::sync::Arc;

use bevy::math::Vec3;

use director_core::{
    build_mission_app_with_config, run_tick, DirectorConfig, DirectorTelemetry, HostileUnit,
    Intensity, PlayerUnit,
};

fn config() -> Arc<DirectorConfig> {
    Arc::new(
        DirectorConfig::from_json_str(
            r#"{
                "mission": { "seed": 777 },
                "pacing": { "initial_wait": 1.0, "relaxed_min": 1.0, "relaxed_max": 2.0 },
                "hordes": { "interval_min": 3.0, "interval_max": 5.0 },
                "wanderers": { "initial_min": 1.0, "initial_max": 2.0 }
            }"#,
        )
        .unwrap(),
    )
}

fn run_mission(ticks: usize) -> (DirectorTelemetry, Vec<(u32, u32, u32)>) {
    let mut app = build_mission_app_with_config(config());
    app.world.spawn((
        PlayerUnit::new(Vec3::new(8.5, 0.0, 8.5), 100.0),
        Intensity::default(),
    ));
    for _ in 0..ticks {
        run_tick(&mut app);
    }
    let telemetry = app.world.resource::<DirectorTelemetry>().clone();
    let mut query = app.world.query::<&HostileUnit>();
    let mut positions: Vec<(u32, u32, u32)> = query
        .iter(&app.world)
        .map(|unit| {
            (
                unit.position.x.to_bits(),
                unit.position.z.to_bits(),
                unit.facing.to_bits(),
            )
        })
        .collect();
    positions.sort_unstable();
    (telemetry, positions)
}

#[test]
fn same_seed_same_mission() {
    let (telemetry_a, positions_a) = run_mission(600);
    let (telemetry_b, positions_b) = run_mission(600);

    assert_eq!(telemetry_a.tick, telemetry_b.tick);
    assert_eq!(telemetry_a.hordes_launched, telemetry_b.hordes_launched);
    assert_eq!(telemetry_a.wanderers_spawned, telemetry_b.wanderers_spawned);
    assert_eq!(telemetry_a.units_spawned, telemetry_b.units_spawned);
    assert_eq!(telemetry_a.spawning_aliens, telemetry_b.spawning_aliens);
    assert_eq!(positions_a, positions_b);
}
