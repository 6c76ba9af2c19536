use bevy::math::Vec3;

use director_core::{
    build_mission_app_with_config, run_tick, DirectorConfig, DirectorTelemetry, Intensity,
    PlayerUnit,
};

#[test]
fn app_initializes_and_ticks() {
    let mut app = build_mission_app_with_config(DirectorConfig::builtin());
    // A tick with no players must not panic; the director just idles.
    run_tick(&mut app);

    app.world.spawn((
        PlayerUnit::new(Vec3::new(8.5, 0.0, 8.5), 100.0),
        Intensity::default(),
    ));
    for _ in 0..10 {
        run_tick(&mut app);
    }
    let telemetry = app.world.resource::<DirectorTelemetry>();
    assert_eq!(telemetry.tick, 11);
    assert_eq!(telemetry.max_intensity, 0.0);
}
