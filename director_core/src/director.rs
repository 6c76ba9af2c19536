//! Pacing state machine: Relaxed, SpawningNotPeaked, SpawningPeaked, with a
//! one-way finale override. The systems here run in a fixed order each tick
//! (see `build_mission_app`); the order is part of the contract.

use bevy::prelude::{
    Commands, Entity, Event, EventReader, Query, Res, ResMut, Resource, World,
};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info};

use crate::{
    clock::{CountdownTimer, MissionClock},
    config::{DirectorConfig, DirectorConfigHandle},
    intensity::{max_intensity, Intensity, IntensityCategory},
    nav::NavService,
    spawner::{flush_spawns, SpawnManager},
    telemetry::DirectorTelemetry,
    units::{
        sample_players, DangerRating, HostileUnit, KeyInteractionStarted, PlayerDamaged,
        PlayerUnit, UnitClass, UnitKilled,
    },
};

/// Mission RNG. Seeded once per mission so a run is reproducible per seed.
#[derive(Resource)]
pub struct DirectorRng(ChaCha8Rng);

impl DirectorRng {
    pub fn from_seed(seed: u64) -> Self {
        Self(ChaCha8Rng::seed_from_u64(seed))
    }

    pub fn duration_in(&mut self, range: (f64, f64)) -> f64 {
        let (min, max) = range;
        if max > min {
            self.0.gen_range(min..=max)
        } else {
            min
        }
    }

    pub fn count_in(&mut self, range: (u32, u32)) -> u32 {
        let (min, max) = range;
        self.0.gen_range(min..=max.max(min))
    }

    pub fn inner(&mut self) -> &mut ChaCha8Rng {
        &mut self.0
    }
}

/// Campaign progress fed in by the host; drives horde difficulty scaling.
#[derive(Resource, Debug, Clone, Copy, Default)]
pub struct MissionProgress {
    pub missions_completed: u32,
}

/// Pacing phase derived from the two state bits; at most one holds at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacingPhase {
    Relaxed,
    SpawningNotPeaked,
    SpawningPeaked,
}

impl PacingPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            PacingPhase::Relaxed => "relaxed",
            PacingPhase::SpawningNotPeaked => "spawning",
            PacingPhase::SpawningPeaked => "peaked",
        }
    }
}

/// Director mission state. Mission-scoped, never global.
#[derive(Resource, Debug, Clone)]
pub struct DirectorState {
    pub spawning_aliens: bool,
    pub reached_intensity_peak: bool,
    pub in_initial_wait: bool,
    pub sustain_timer: CountdownTimer,
    pub horde_timer: CountdownTimer,
    pub wanderer_timer: CountdownTimer,
    pub time_between_wanderer_spawns: f64,
    pub horde_in_progress: bool,
    pub finale_active: bool,
    pub wanderers_enabled: bool,
    pub hordes_enabled: bool,
    pub controls_static_spawners: bool,
}

impl DirectorState {
    pub fn from_config(cfg: &DirectorConfig) -> Self {
        Self {
            spawning_aliens: false,
            reached_intensity_peak: false,
            in_initial_wait: true,
            sustain_timer: CountdownTimer::Inactive,
            horde_timer: CountdownTimer::Inactive,
            wanderer_timer: CountdownTimer::Inactive,
            time_between_wanderer_spawns: 0.0,
            horde_in_progress: false,
            finale_active: false,
            wanderers_enabled: cfg.mission().wanderers_enabled(),
            hordes_enabled: cfg.mission().hordes_enabled(),
            controls_static_spawners: cfg.mission().control_static_spawners(),
        }
    }

    pub fn reset(&mut self, cfg: &DirectorConfig) {
        *self = DirectorState::from_config(cfg);
    }

    pub fn pacing_phase(&self) -> PacingPhase {
        if !self.spawning_aliens {
            PacingPhase::Relaxed
        } else if self.reached_intensity_peak {
            PacingPhase::SpawningPeaked
        } else {
            PacingPhase::SpawningNotPeaked
        }
    }
}

/// Permission check for static spawn points: granted unless the director
/// controls static spawners, in which case the point follows the pacing
/// cycle.
pub fn can_spawn_alien(state: &DirectorState) -> bool {
    !state.controls_static_spawners || state.spawning_aliens
}

/// Horde-size multiplier from campaign progress. Floor division; the tier
/// only steps up when a full difficulty band of missions is complete.
pub fn difficulty_tier(missions_completed: u32, missions_per_difficulty: u32) -> u32 {
    1 + missions_completed / missions_per_difficulty.max(1)
}

/// Fired by the host when the mission's terminal phase begins. One-way.
#[derive(Event, Debug, Clone, Copy, Default)]
pub struct FinaleTriggered;

fn danger_category(danger: DangerRating) -> IntensityCategory {
    match danger {
        DangerRating::Low => IntensityCategory::Mild,
        DangerRating::Moderate => IntensityCategory::Moderate,
        DangerRating::High => IntensityCategory::High,
    }
}

fn damage_category(fraction: f32) -> IntensityCategory {
    if fraction < 0.1 {
        IntensityCategory::Mild
    } else if fraction < 0.25 {
        IntensityCategory::Moderate
    } else if fraction < 0.5 {
        IntensityCategory::High
    } else {
        IntensityCategory::Extreme
    }
}

/// Fold event-driven inputs into intensity and the horde timer before
/// anything reads them.
#[allow(clippy::too_many_arguments)]
pub fn apply_combat_events(
    clock: Res<MissionClock>,
    config: Res<DirectorConfigHandle>,
    mut state: ResMut<DirectorState>,
    mut rng: ResMut<DirectorRng>,
    mut kills: EventReader<UnitKilled>,
    mut damage: EventReader<PlayerDamaged>,
    mut interactions: EventReader<KeyInteractionStarted>,
    mut finales: EventReader<FinaleTriggered>,
    mut players: Query<(Entity, &mut PlayerUnit, &mut Intensity)>,
) {
    let cfg = config.get();
    let now = clock.now();

    for kill in kills.read() {
        let category = danger_category(kill.class.danger());
        for (_, player, mut intensity) in players.iter_mut() {
            if player.position.distance(kill.position) <= cfg.intensity().kill_radius() {
                intensity.increase(category, now, cfg.intensity());
            }
        }
    }

    for hit in damage.read() {
        for (entity, mut player, mut intensity) in players.iter_mut() {
            if entity != hit.player {
                continue;
            }
            let category = if hit.friendly_fire {
                IntensityCategory::Mild
            } else {
                let max_health = player.max_health.max(1.0);
                damage_category(hit.damage / max_health)
            };
            player.health = (player.health - hit.damage).max(0.0);
            intensity.increase(category, now, cfg.intensity());
        }
    }

    for interaction in interactions.read() {
        // A big scripted moment gets a horde behind it instead of dead air:
        // drop the pressure reading, hold the valve shut, and pull the next
        // horde in close.
        for (_, _, mut intensity) in players.iter_mut() {
            intensity.reset();
            intensity.inhibit_decay(now, cfg.intensity());
        }
        let lead = rng.duration_in(cfg.hordes().interaction_lead_range());
        state.horde_timer.fast_forward(now, lead);
        info!(
            target: "horde_director::pacing",
            player = ?interaction.player,
            lead,
            "pacing.interaction.horde_forced"
        );
    }

    for _ in finales.read() {
        if !state.finale_active {
            state.finale_active = true;
            state.hordes_enabled = true;
            state.wanderers_enabled = true;
            state.spawning_aliens = true;
            let lead = rng.duration_in(cfg.hordes().interaction_lead_range());
            state.horde_timer.fast_forward(now, lead);
            info!(target: "horde_director::pacing", "pacing.finale.started");
        }
    }
}

#[allow(clippy::too_many_arguments)]
pub fn schedule_hordes(
    clock: Res<MissionClock>,
    config: Res<DirectorConfigHandle>,
    progress: Res<MissionProgress>,
    mut state: ResMut<DirectorState>,
    mut rng: ResMut<DirectorRng>,
    mut manager: ResMut<SpawnManager>,
    nav: Res<NavService>,
    players: Query<(Entity, &PlayerUnit)>,
    mut telemetry: ResMut<DirectorTelemetry>,
    mut commands: Commands,
) {
    let cfg = config.get();
    let now = clock.now();

    if state.horde_in_progress && !manager.horde_active() {
        state.horde_in_progress = false;
        info!(target: "horde_director::pacing", "pacing.horde.finished");
    }
    if !state.hordes_enabled || state.horde_in_progress {
        return;
    }
    if !state.horde_timer.is_pending() {
        let duration = rng.duration_in(cfg.hordes().interval_range(state.finale_active));
        state.horde_timer.start(now, duration);
        return;
    }
    if !state.horde_timer.elapsed(now) {
        return;
    }

    if manager.awake_units() >= cfg.hordes().awake_cap() {
        // Population is saturated; let things die down before the next push.
        state.horde_timer.start(now, cfg.hordes().cooldown_delay());
        telemetry.horde_cooldowns += 1;
        debug!(
            target: "horde_director::pacing",
            awake = manager.awake_units(),
            "pacing.horde.cooldown"
        );
        return;
    }

    let tier = difficulty_tier(
        progress.missions_completed,
        cfg.mission().missions_per_difficulty(),
    );
    let base = rng.count_in(cfg.hordes().size_range());
    let size = base.saturating_mul(tier).min(cfg.hordes().max_size());
    let samples = sample_players(&players);

    if manager.request_horde(size, now, &samples, nav.query(), cfg.hordes(), cfg.spawning()) {
        state.horde_in_progress = true;
        state.horde_timer.invalidate();
        telemetry.hordes_launched += 1;
        info!(
            target: "horde_director::pacing",
            size,
            tier,
            "pacing.horde.launched"
        );
        flush_spawns(&mut manager, &mut telemetry, &mut commands);
    } else {
        let delay = rng.duration_in(cfg.hordes().retry_range());
        state.horde_timer.start(now, delay);
        telemetry.horde_requests_failed += 1;
        debug!(
            target: "horde_director::pacing",
            retry_in = delay,
            "pacing.horde.request_failed"
        );
    }
}

/// The relaxed/spawning/peaked transition. Finale short-circuits to "always
/// spawning".
pub fn update_pacing(
    clock: Res<MissionClock>,
    config: Res<DirectorConfigHandle>,
    mut state: ResMut<DirectorState>,
    mut rng: ResMut<DirectorRng>,
    players: Query<&Intensity>,
) {
    let cfg = config.get();
    let now = clock.now();

    if state.finale_active {
        state.spawning_aliens = true;
        return;
    }

    let max = max_intensity(&players);
    match state.pacing_phase() {
        PacingPhase::Relaxed => {
            if !state.sustain_timer.is_pending() {
                if max < 1.0 {
                    let duration = if state.in_initial_wait {
                        state.in_initial_wait = false;
                        cfg.pacing().initial_wait()
                    } else {
                        rng.duration_in(cfg.pacing().relaxed_range())
                    };
                    state.sustain_timer.start(now, duration);
                }
            } else if state.sustain_timer.elapsed(now) {
                state.spawning_aliens = true;
                state.reached_intensity_peak = false;
                // Forces the wanderer loop to draw a fresh initial interval.
                state.time_between_wanderer_spawns = 0.0;
                state.wanderer_timer.invalidate();
                state.sustain_timer.invalidate();
                info!(target: "horde_director::pacing", "pacing.state.spawning");
            }
        }
        PacingPhase::SpawningNotPeaked => {
            if max >= 1.0 {
                state.reached_intensity_peak = true;
                state.sustain_timer.invalidate();
                info!(target: "horde_director::pacing", "pacing.state.peaked");
            }
        }
        PacingPhase::SpawningPeaked => {
            if !state.sustain_timer.is_pending() {
                let duration = rng.duration_in(cfg.pacing().peak_range());
                state.sustain_timer.start(now, duration);
            } else if state.sustain_timer.elapsed(now) {
                state.spawning_aliens = false;
                state.sustain_timer.invalidate();
                info!(target: "horde_director::pacing", "pacing.state.relaxed");
            }
        }
    }
}

/// Wanderer trickle while the machine says "spawning". The interval shrinks
/// multiplicatively each spawn, floored by config.
#[allow(clippy::too_many_arguments)]
pub fn schedule_wanderers(
    clock: Res<MissionClock>,
    config: Res<DirectorConfigHandle>,
    mut state: ResMut<DirectorState>,
    mut rng: ResMut<DirectorRng>,
    mut manager: ResMut<SpawnManager>,
    nav: Res<NavService>,
    players: Query<(Entity, &PlayerUnit)>,
    mut telemetry: ResMut<DirectorTelemetry>,
    mut commands: Commands,
) {
    if !state.wanderers_enabled || !state.spawning_aliens {
        return;
    }
    let cfg = config.get();
    let now = clock.now();

    if state.wanderer_timer.is_pending() && !state.wanderer_timer.elapsed(now) {
        return;
    }

    let interval = if state.time_between_wanderer_spawns <= 0.0 {
        rng.duration_in(cfg.wanderers().initial_range())
    } else {
        let factor = rng.duration_in(cfg.wanderers().change_range());
        (state.time_between_wanderer_spawns * factor).max(cfg.wanderers().interval_floor())
    };
    state.time_between_wanderer_spawns = interval;
    state.wanderer_timer.start(now, interval);

    if manager.awake_units() >= cfg.wanderers().awake_cap() {
        return;
    }
    let mut class = UnitClass::sample_wanderer(rng.inner());
    if class.is_melee() && manager.awake_melee_units() >= cfg.wanderers().melee_awake_cap() {
        class = UnitClass::Spitter;
    }
    let samples = sample_players(&players);
    if manager.request_single_unit(class, &samples, nav.query(), cfg.hordes(), cfg.spawning()) {
        telemetry.wanderers_spawned += 1;
        flush_spawns(&mut manager, &mut telemetry, &mut commands);
    }
}

/// Reset every mission-scoped resource and clear leftover hostiles. A second
/// call is a no-op beyond re-zeroing already-zeroed state.
pub fn on_mission_started(world: &mut World) {
    let cfg = world.resource::<DirectorConfigHandle>().get();
    let seed = cfg.mission().seed();
    world.resource_mut::<MissionClock>().reset();
    world.resource_mut::<DirectorState>().reset(&cfg);
    world.resource_mut::<SpawnManager>().reset(seed);
    *world.resource_mut::<DirectorRng>() = DirectorRng::from_seed(seed);
    *world.resource_mut::<DirectorTelemetry>() = DirectorTelemetry::default();
    despawn_hostiles(world);
    let mut players = world.query::<&mut Intensity>();
    for mut intensity in players.iter_mut(world) {
        intensity.reset();
    }
    info!(target: "horde_director::pacing", seed, "pacing.mission.started");
}

/// Mission teardown: abandon in-flight spawn work and drop all hostiles.
pub fn on_mission_ended(world: &mut World) {
    let cfg = world.resource::<DirectorConfigHandle>().get();
    let seed = cfg.mission().seed();
    world.resource_mut::<SpawnManager>().reset(seed);
    world.resource_mut::<DirectorState>().reset(&cfg);
    despawn_hostiles(world);
    info!(target: "horde_director::pacing", "pacing.mission.ended");
}

fn despawn_hostiles(world: &mut World) {
    let mut query = world.query_filtered::<Entity, bevy::prelude::With<HostileUnit>>();
    let hostiles: Vec<Entity> = query.iter(world).collect();
    for entity in hostiles {
        world.despawn(entity);
    }
}
