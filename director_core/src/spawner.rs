//! Spawn manager: turns spawn requests into validated world placements.
//! Every spatial operation fails soft; callers carry a retry policy.

use std::collections::{HashSet, VecDeque};
use std::f32::consts::TAU;

use bevy::{
    math::Vec3,
    prelude::{Commands, Entity, EventReader, Query, Res, ResMut, Resource},
};
use rand::{rngs::SmallRng, Rng, SeedableRng};
use tracing::{debug, info};

use crate::{
    clock::{CountdownTimer, MissionClock},
    config::{DirectorConfigHandle, HordeConfig, SpawningConfig},
    nav::{NavNodeId, NavQuery, NavService, OpenArea},
    telemetry::DirectorTelemetry,
    units::{HostileUnit, PlayerSample, PlayerUnit, UnitClass, UnitSlept, UnitWoke},
};

/// Nodes visited per open-area flood fill; bounds the per-request cost.
const OPEN_AREA_HORIZON: usize = 64;

/// A validated placement waiting to become an entity.
#[derive(Debug, Clone, Copy)]
pub struct QueuedSpawn {
    pub class: UnitClass,
    pub position: Vec3,
    pub facing: f32,
}

#[derive(Debug, Clone, Copy)]
struct PendingHorde {
    origin: Vec3,
    facing: f32,
    class: UnitClass,
    units_remaining: u32,
    retry_timer: CountdownTimer,
}

#[derive(Resource)]
pub struct SpawnManager {
    awake_units: u32,
    awake_melee_units: u32,
    frontier_nodes: Vec<NavNodeId>,
    interior_nodes: Vec<NavNodeId>,
    refresh_timer: CountdownTimer,
    pending_horde: Option<PendingHorde>,
    queued: Vec<QueuedSpawn>,
    rng: SmallRng,
}

impl SpawnManager {
    pub fn from_seed(seed: u64) -> Self {
        Self {
            awake_units: 0,
            awake_melee_units: 0,
            frontier_nodes: Vec::new(),
            interior_nodes: Vec::new(),
            refresh_timer: CountdownTimer::Inactive,
            pending_horde: None,
            queued: Vec::new(),
            rng: SmallRng::seed_from_u64(seed ^ 0x9E37_79B9_7F4A_7C15),
        }
    }

    pub fn reset(&mut self, seed: u64) {
        *self = SpawnManager::from_seed(seed);
    }

    pub fn awake_units(&self) -> u32 {
        self.awake_units
    }

    pub fn awake_melee_units(&self) -> u32 {
        self.awake_melee_units
    }

    /// A horde is in progress while units remain to place or a placement
    /// retry is pending.
    pub fn horde_active(&self) -> bool {
        self.pending_horde.is_some()
    }

    pub fn on_unit_woke(&mut self, melee: bool) {
        self.awake_units += 1;
        if melee {
            self.awake_melee_units += 1;
        }
    }

    pub fn on_unit_slept(&mut self, melee: bool) {
        self.awake_units = self.awake_units.saturating_sub(1);
        if melee {
            self.awake_melee_units = self.awake_melee_units.saturating_sub(1);
        }
    }

    pub fn take_queued(&mut self) -> Vec<QueuedSpawn> {
        std::mem::take(&mut self.queued)
    }

    /// Rebuild the regional candidate sets. Amortized behind an interval
    /// timer.
    pub fn refresh_candidate_nodes(
        &mut self,
        nav: &dyn NavQuery,
        players: &[PlayerSample],
        cfg: &SpawningConfig,
    ) {
        self.frontier_nodes.clear();
        self.interior_nodes.clear();
        let split = cfg.candidate_split_distance();
        for id in 0..nav.node_count() {
            let node = NavNodeId(id);
            let Some(position) = nav.node_position(node) else {
                continue;
            };
            let nearest = players
                .iter()
                .map(|p| p.position.distance(position))
                .fold(f32::INFINITY, f32::min);
            if nearest >= split {
                self.frontier_nodes.push(node);
            } else {
                self.interior_nodes.push(node);
            }
        }
        debug!(
            target: "horde_director::spawner",
            frontier = self.frontier_nodes.len(),
            interior = self.interior_nodes.len(),
            "spawner.candidates.refreshed"
        );
    }

    /// Flood out from the node nearest `origin` and score the reachable
    /// neighbourhood against the configured threshold.
    pub fn find_open_area(
        &self,
        origin: Vec3,
        min_hull: f32,
        nav: &dyn NavQuery,
        cfg: &SpawningConfig,
    ) -> Option<OpenArea> {
        let seed = nav.nearest_node(origin, min_hull.max(1.0) * 6.0)?;
        let mut visited: HashSet<NavNodeId> = HashSet::with_capacity(OPEN_AREA_HORIZON);
        let mut frontier = VecDeque::new();
        visited.insert(seed);
        frontier.push_back(seed);
        let mut area_score = 0u32;
        while let Some(node) = frontier.pop_front() {
            if let Some(position) = nav.node_position(node) {
                if nav.hull_fits(position, min_hull) {
                    area_score += 1;
                }
            }
            if visited.len() >= OPEN_AREA_HORIZON {
                break;
            }
            for neighbor in nav.neighbors(node) {
                if visited.insert(neighbor) {
                    frontier.push_back(neighbor);
                }
            }
        }
        if area_score < cfg.min_open_area() {
            return None;
        }
        let position = nav.node_position(seed)?;
        Some(OpenArea {
            node: seed,
            position,
            area_score,
        })
    }

    /// Pure placement predicate: player exclusion (when nonzero), hull fit,
    /// and optional ground presence. No side effects.
    pub fn validate_spawn_point(
        position: Vec3,
        hull_min: f32,
        hull_max: f32,
        check_ground: bool,
        min_player_distance: f32,
        players: &[PlayerSample],
        nav: &dyn NavQuery,
        ground_extent: f32,
    ) -> bool {
        if min_player_distance > 0.0
            && players
                .iter()
                .any(|p| p.position.distance(position) < min_player_distance)
        {
            return false;
        }
        if !nav.hull_fits(position, hull_min.max(hull_max)) {
            return false;
        }
        if check_ground && !nav.has_ground(position, ground_extent) {
            return false;
        }
        true
    }

    /// Queue up to `count` units of `class` around `origin` with per-unit
    /// jitter, each placement validated. Returns the number actually queued;
    /// the caller owns rescheduling the remainder.
    #[allow(clippy::too_many_arguments)]
    pub fn spawn_batch(
        &mut self,
        class: UnitClass,
        count: u32,
        origin: Vec3,
        facing: f32,
        min_player_distance: f32,
        players: &[PlayerSample],
        nav: &dyn NavQuery,
        cfg: &SpawningConfig,
    ) -> u32 {
        let hull = class.hull_radius();
        let mut spawned = 0;
        for _ in 0..count {
            let jitter = cfg.jitter_radius();
            let offset = Vec3::new(
                self.rng.gen_range(-jitter..=jitter),
                0.0,
                self.rng.gen_range(-jitter..=jitter),
            );
            let position = origin + offset;
            if !Self::validate_spawn_point(
                position,
                hull,
                hull,
                true,
                min_player_distance,
                players,
                nav,
                cfg.ground_extent(),
            ) {
                continue;
            }
            self.queued.push(QueuedSpawn {
                class,
                position,
                facing,
            });
            spawned += 1;
        }
        spawned
    }

    /// Place a horde of `size` units in an open area between the configured
    /// min and max distance from the player centroid, line of sight blocked.
    /// A `false` return queues nothing and touches no counters.
    pub fn request_horde(
        &mut self,
        size: u32,
        now: f64,
        players: &[PlayerSample],
        nav: &dyn NavQuery,
        hordes: &HordeConfig,
        spawning: &SpawningConfig,
    ) -> bool {
        if players.is_empty() || size == 0 {
            return false;
        }
        let centroid = player_centroid(players);
        let (dist_min, dist_max) = hordes.spawn_distance_range();
        let class = if self.rng.gen_range(0..6) == 0 {
            UnitClass::Brute
        } else {
            UnitClass::Skulk
        };
        for _ in 0..hordes.search_attempts() {
            let theta = self.rng.gen_range(0.0..TAU);
            let dist = self.rng.gen_range(dist_min..=dist_max);
            let seed = centroid + Vec3::new(theta.cos(), 0.0, theta.sin()) * dist;
            let Some(area) = self.find_open_area(seed, class.hull_radius(), nav, spawning) else {
                continue;
            };
            // Hordes must not be visible the instant they appear.
            if players
                .iter()
                .any(|p| nav.line_of_sight(p.position, area.position))
            {
                continue;
            }
            if !Self::validate_spawn_point(
                area.position,
                class.hull_radius(),
                class.hull_radius(),
                true,
                dist_min,
                players,
                nav,
                spawning.ground_extent(),
            ) {
                continue;
            }
            let to_players = centroid - area.position;
            let facing = to_players.z.atan2(to_players.x);
            let spawned = self.spawn_batch(
                class,
                size,
                area.position,
                facing,
                0.0,
                players,
                nav,
                spawning,
            );
            let remaining = size - spawned;
            let mut retry_timer = CountdownTimer::Inactive;
            if remaining > 0 {
                retry_timer.start(now, hordes.batch_retry_delay());
            }
            self.pending_horde = Some(PendingHorde {
                origin: area.position,
                facing,
                class,
                units_remaining: remaining,
                retry_timer,
            });
            info!(
                target: "horde_director::spawner",
                size,
                spawned,
                class = class.display_label(),
                area_score = area.area_score,
                "spawner.horde.placed"
            );
            return true;
        }
        debug!(
            target: "horde_director::spawner",
            size,
            attempts = hordes.search_attempts(),
            "spawner.horde.no_area"
        );
        false
    }

    /// Wanderer trickle: one unit through the same validation path as a
    /// horde, biased toward frontier candidate nodes.
    pub fn request_single_unit(
        &mut self,
        class: UnitClass,
        players: &[PlayerSample],
        nav: &dyn NavQuery,
        hordes: &HordeConfig,
        spawning: &SpawningConfig,
    ) -> bool {
        if players.is_empty() {
            return false;
        }
        let centroid = player_centroid(players);
        let (dist_min, dist_max) = hordes.spawn_distance_range();
        for _ in 0..hordes.search_attempts() {
            let position = if !self.frontier_nodes.is_empty() && self.rng.gen_bool(0.75) {
                let idx = self.rng.gen_range(0..self.frontier_nodes.len());
                match nav.node_position(self.frontier_nodes[idx]) {
                    Some(pos) => pos,
                    None => continue,
                }
            } else {
                let theta = self.rng.gen_range(0.0..TAU);
                let dist = self.rng.gen_range(dist_min..=dist_max);
                centroid + Vec3::new(theta.cos(), 0.0, theta.sin()) * dist
            };
            if players
                .iter()
                .any(|p| nav.line_of_sight(p.position, position))
            {
                continue;
            }
            if !Self::validate_spawn_point(
                position,
                class.hull_radius(),
                class.hull_radius(),
                true,
                spawning.min_player_distance(),
                players,
                nav,
                spawning.ground_extent(),
            ) {
                continue;
            }
            let to_players = centroid - position;
            self.queued.push(QueuedSpawn {
                class,
                position,
                facing: to_players.z.atan2(to_players.x),
            });
            debug!(
                target: "horde_director::spawner",
                class = class.display_label(),
                "spawner.wanderer.placed"
            );
            return true;
        }
        false
    }

    /// Per-tick servicing of the in-flight horde batch: once the retry timer
    /// elapses, place what we can and either finish the horde or re-arm.
    pub fn service_pending_horde(
        &mut self,
        now: f64,
        players: &[PlayerSample],
        nav: &dyn NavQuery,
        hordes: &HordeConfig,
        spawning: &SpawningConfig,
    ) {
        let Some(mut pending) = self.pending_horde.take() else {
            return;
        };
        if pending.units_remaining == 0 {
            // Fully placed; the horde ends once its batch drains.
            return;
        }
        if pending.retry_timer.is_pending() && !pending.retry_timer.elapsed(now) {
            self.pending_horde = Some(pending);
            return;
        }
        let spawned = self.spawn_batch(
            pending.class,
            pending.units_remaining,
            pending.origin,
            pending.facing,
            0.0,
            players,
            nav,
            spawning,
        );
        pending.units_remaining -= spawned;
        if pending.units_remaining > 0 {
            pending.retry_timer.start(now, hordes.batch_retry_delay());
            self.pending_horde = Some(pending);
        } else {
            info!(
                target: "horde_director::spawner",
                "spawner.horde.batch_complete"
            );
        }
    }
}

fn player_centroid(players: &[PlayerSample]) -> Vec3 {
    let sum: Vec3 = players.iter().map(|p| p.position).sum();
    sum / players.len() as f32
}

/// Per-tick bookkeeping: drain wake/sleep events before any admission check,
/// refresh candidate nodes, service the in-flight horde, materialize queued
/// placements.
#[allow(clippy::too_many_arguments)]
pub fn spawn_manager_tick(
    clock: Res<MissionClock>,
    config: Res<DirectorConfigHandle>,
    nav: Res<NavService>,
    mut manager: ResMut<SpawnManager>,
    mut woke: EventReader<UnitWoke>,
    mut slept: EventReader<UnitSlept>,
    players: Query<(Entity, &PlayerUnit)>,
    mut telemetry: ResMut<DirectorTelemetry>,
    mut commands: Commands,
) {
    for event in woke.read() {
        manager.on_unit_woke(event.melee);
    }
    for event in slept.read() {
        manager.on_unit_slept(event.melee);
    }

    let cfg = config.get();
    let now = clock.now();
    let samples = crate::units::sample_players(&players);

    if !manager.refresh_timer.is_pending() || manager.refresh_timer.elapsed(now) {
        manager.refresh_candidate_nodes(nav.query(), &samples, cfg.spawning());
        let interval = cfg.spawning().candidate_refresh_interval();
        manager.refresh_timer.start(now, interval);
    }

    manager.service_pending_horde(now, &samples, nav.query(), cfg.hordes(), cfg.spawning());

    flush_spawns(&mut manager, &mut telemetry, &mut commands);
}

/// Turn queued placements into dormant hostile entities; placements never
/// outlive their tick.
pub fn flush_spawns(
    manager: &mut SpawnManager,
    telemetry: &mut DirectorTelemetry,
    commands: &mut Commands,
) {
    for spawn in manager.take_queued() {
        commands.spawn(HostileUnit::dormant(
            spawn.class,
            spawn.position,
            spawn.facing,
        ));
        telemetry.units_spawned += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DirectorConfig;

    fn cfg() -> DirectorConfig {
        DirectorConfig::from_json_str(
            r#"{
                "hordes": { "spawn_distance_min": 4.0, "spawn_distance_max": 10.0 },
                "spawning": { "min_open_area": 3, "jitter_radius": 1.0, "min_player_distance": 3.0 }
            }"#,
        )
        .unwrap()
    }

    fn corridor_mesh() -> crate::nav::GridNavMesh {
        // Players on the left, a wall with no gaps, open space on the right.
        crate::nav::GridNavMesh::from_ascii(
            &[
                "####################",
                "#.......##.........#",
                "#.......##.........#",
                "#.......##.........#",
                "#.......##.........#",
                "#.......##.........#",
                "#.......##.........#",
                "####################",
            ],
            1.0,
        )
    }

    fn players_at(positions: &[Vec3]) -> Vec<PlayerSample> {
        positions
            .iter()
            .enumerate()
            .map(|(i, &position)| PlayerSample {
                entity: Entity::from_raw(i as u32 + 1),
                position,
            })
            .collect()
    }

    #[test]
    fn sleep_never_underflows_counts() {
        let mut manager = SpawnManager::from_seed(1);
        manager.on_unit_slept(true);
        assert_eq!(manager.awake_units(), 0);
        assert_eq!(manager.awake_melee_units(), 0);

        manager.on_unit_woke(true);
        manager.on_unit_woke(false);
        manager.on_unit_slept(true);
        assert_eq!(manager.awake_units(), 1);
        assert_eq!(manager.awake_melee_units(), 0);
    }

    #[test]
    fn validate_rejects_near_players() {
        let mesh = corridor_mesh();
        let players = players_at(&[Vec3::new(2.5, 0.0, 3.5)]);
        let near = Vec3::new(3.5, 0.0, 3.5);
        assert!(!SpawnManager::validate_spawn_point(
            near, 0.4, 0.4, true, 5.0, &players, &mesh, 1.0
        ));
        // Distance check off -> same point passes.
        assert!(SpawnManager::validate_spawn_point(
            near, 0.4, 0.4, true, 0.0, &players, &mesh, 1.0
        ));
    }

    #[test]
    fn candidate_sets_are_disjoint_and_cover_open_nodes() {
        let mesh = corridor_mesh();
        let config = cfg();
        let players = players_at(&[Vec3::new(2.5, 0.0, 2.5)]);
        let mut manager = SpawnManager::from_seed(2);
        manager.refresh_candidate_nodes(&mesh, &players, config.spawning());
        let frontier: HashSet<_> = manager.frontier_nodes.iter().copied().collect();
        for node in &manager.interior_nodes {
            assert!(!frontier.contains(node));
        }
        let open_nodes = (0..mesh.node_count())
            .filter(|&id| mesh.node_position(NavNodeId(id)).is_some())
            .count();
        assert_eq!(
            manager.frontier_nodes.len() + manager.interior_nodes.len(),
            open_nodes
        );
    }

    #[test]
    fn horde_request_fails_soft_when_everything_is_visible() {
        // One open room: every candidate has line of sight to the player.
        let mesh = crate::nav::GridNavMesh::from_ascii(
            &[
                "############",
                "#..........#",
                "#..........#",
                "#..........#",
                "############",
            ],
            1.0,
        );
        let config = cfg();
        let players = players_at(&[Vec3::new(6.0, 0.0, 2.5)]);
        let mut manager = SpawnManager::from_seed(3);
        manager.refresh_candidate_nodes(&mesh, &players, config.spawning());

        let ok = manager.request_horde(
            8,
            0.0,
            &players,
            &mesh,
            config.hordes(),
            config.spawning(),
        );
        assert!(!ok);
        assert!(!manager.horde_active());
        assert!(manager.take_queued().is_empty());
        assert_eq!(manager.awake_units(), 0);
    }

    #[test]
    fn horde_places_behind_the_wall() {
        let mesh = corridor_mesh();
        let config = cfg();
        let players = players_at(&[Vec3::new(2.5, 0.0, 3.5), Vec3::new(4.5, 0.0, 2.5)]);
        let mut manager = SpawnManager::from_seed(4);
        manager.refresh_candidate_nodes(&mesh, &players, config.spawning());

        let mut placed = false;
        for _ in 0..8 {
            if manager.request_horde(
                6,
                0.0,
                &players,
                &mesh,
                config.hordes(),
                config.spawning(),
            ) {
                placed = true;
                break;
            }
        }
        assert!(placed, "expected at least one placement behind the wall");
        let queued = manager.take_queued();
        assert!(!queued.is_empty());
        for spawn in &queued {
            for player in &players {
                assert!(
                    !mesh.line_of_sight(player.position, spawn.position)
                        || player.position.distance(spawn.position) >= 4.0
                );
            }
        }
    }

    #[test]
    fn pending_horde_retries_then_completes() {
        let mesh = corridor_mesh();
        let config = cfg();
        let players = players_at(&[Vec3::new(2.5, 0.0, 3.5)]);
        let mut manager = SpawnManager::from_seed(5);
        manager.pending_horde = Some(PendingHorde {
            origin: Vec3::new(14.5, 0.0, 3.5),
            facing: 0.0,
            class: UnitClass::Skulk,
            units_remaining: 3,
            retry_timer: CountdownTimer::Inactive,
        });

        manager.service_pending_horde(0.0, &players, &mesh, config.hordes(), config.spawning());
        let first_wave = manager.take_queued().len();
        assert!(first_wave > 0);
        if manager.horde_active() {
            // Retry timer armed; before it elapses nothing more is placed.
            manager.service_pending_horde(
                0.1,
                &players,
                &mesh,
                config.hordes(),
                config.spawning(),
            );
            assert!(manager.take_queued().is_empty());
        }
    }

    #[test]
    fn single_unit_respects_exclusion_distance() {
        let mesh = corridor_mesh();
        let config = cfg();
        let players = players_at(&[Vec3::new(2.5, 0.0, 3.5)]);
        let mut manager = SpawnManager::from_seed(6);
        manager.refresh_candidate_nodes(&mesh, &players, config.spawning());

        for _ in 0..8 {
            manager.request_single_unit(
                UnitClass::Skulk,
                &players,
                &mesh,
                config.hordes(),
                config.spawning(),
            );
        }
        for spawn in manager.take_queued() {
            assert!(players[0].position.distance(spawn.position) >= 3.0);
        }
    }
}
