//! Static spawn points: mapper-placed objects that create one unit type on
//! their own interval, optionally deferring to the director for permission.

use bevy::{
    math::Vec3,
    prelude::{
        Commands, Component, Entity, Event, EventReader, Query, Res, ResMut,
    },
};
use tracing::{debug, info};

use crate::{
    clock::{CountdownTimer, MissionClock},
    config::DirectorConfigHandle,
    director::{can_spawn_alien, DirectorState},
    nav::NavService,
    spawner::SpawnManager,
    telemetry::DirectorTelemetry,
    units::{sample_players, HostileUnit, PlayerUnit, SpawnPointTriggered, UnitClass},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpawnPointState {
    Idle,
    Spawning,
    WaitingForSignal,
    /// Terminal; the transition is one-way.
    Finished,
}

/// Fired by the host when one of a spawn point's live units dies.
#[derive(Event, Debug, Clone, Copy)]
pub struct StaticSpawnDied {
    pub spawn_point: Entity,
}

#[derive(Component, Debug, Clone)]
pub struct StaticSpawnPoint {
    pub class: UnitClass,
    pub position: Vec3,
    pub facing: f32,
    pub interval: f64,
    pub max_concurrent_live: u32,
    /// `None` spawns forever.
    pub remaining: Option<u32>,
    pub exclusion_distance: f32,
    pub state: SpawnPointState,
    pub live_spawned: u32,
    timer: CountdownTimer,
}

impl StaticSpawnPoint {
    pub fn new(class: UnitClass, position: Vec3, interval: f64) -> Self {
        Self {
            class,
            position,
            facing: 0.0,
            interval: interval.max(0.1),
            max_concurrent_live: 3,
            remaining: None,
            exclusion_distance: 8.0,
            state: SpawnPointState::Idle,
            live_spawned: 0,
            timer: CountdownTimer::Inactive,
        }
    }

    pub fn with_budget(mut self, remaining: u32) -> Self {
        self.remaining = Some(remaining);
        self
    }

    pub fn waiting_for_signal(mut self) -> Self {
        self.state = SpawnPointState::WaitingForSignal;
        self
    }

    pub fn begin(&mut self, now: f64) {
        if self.state == SpawnPointState::Idle {
            self.state = SpawnPointState::Spawning;
            self.timer.start(now, self.interval);
        }
    }

    fn budget_exhausted(&self) -> bool {
        self.remaining == Some(0)
    }

    fn finish(&mut self) {
        self.state = SpawnPointState::Finished;
        self.timer.invalidate();
    }
}

/// Every active spawn point asks the director for permission, then re-checks
/// its own local preconditions before creating exactly one unit.
#[allow(clippy::too_many_arguments)]
pub fn update_static_spawn_points(
    clock: Res<MissionClock>,
    config: Res<DirectorConfigHandle>,
    state: Res<DirectorState>,
    nav: Res<NavService>,
    mut points: Query<(Entity, &mut StaticSpawnPoint)>,
    players: Query<(Entity, &PlayerUnit)>,
    mut triggered: EventReader<SpawnPointTriggered>,
    mut died: EventReader<StaticSpawnDied>,
    mut telemetry: ResMut<DirectorTelemetry>,
    mut commands: Commands,
) {
    let cfg = config.get();
    let now = clock.now();

    for event in died.read() {
        if let Ok((_, mut point)) = points.get_mut(event.spawn_point) {
            point.live_spawned = point.live_spawned.saturating_sub(1);
        }
    }

    for event in triggered.read() {
        if let Ok((entity, mut point)) = points.get_mut(event.spawn_point) {
            if point.state == SpawnPointState::WaitingForSignal {
                point.state = SpawnPointState::Spawning;
                let interval = point.interval;
                point.timer.start(now, interval);
                debug!(
                    target: "horde_director::spawn_point",
                    point = ?entity,
                    "spawn_point.signal.received"
                );
            }
        }
    }

    let samples = sample_players(&players);

    for (entity, mut point) in points.iter_mut() {
        if point.state != SpawnPointState::Spawning {
            continue;
        }
        if !point.timer.is_pending() {
            let interval = point.interval;
            point.timer.start(now, interval);
            continue;
        }
        if !point.timer.elapsed(now) {
            continue;
        }
        let interval = point.interval;
        point.timer.start(now, interval);

        if !can_spawn_alien(&state) {
            telemetry.static_spawns_denied += 1;
            continue;
        }
        if point.live_spawned >= point.max_concurrent_live || point.budget_exhausted() {
            continue;
        }
        let hull = point.class.hull_radius();
        if !SpawnManager::validate_spawn_point(
            point.position,
            hull,
            hull,
            true,
            point.exclusion_distance,
            &samples,
            nav.query(),
            cfg.spawning().ground_extent(),
        ) {
            continue;
        }

        commands.spawn(HostileUnit::dormant(
            point.class,
            point.position,
            point.facing,
        ));
        telemetry.static_spawns_granted += 1;
        telemetry.units_spawned += 1;
        point.live_spawned += 1;
        if let Some(remaining) = point.remaining.as_mut() {
            *remaining -= 1;
        }
        if point.budget_exhausted() {
            point.finish();
            info!(
                target: "horde_director::spawn_point",
                point = ?entity,
                "spawn_point.budget.exhausted"
            );
        }
    }
}
