use bevy::{
    math::Vec3,
    prelude::{Component, Entity, Event, EventWriter, Query},
};
use rand::Rng;

/// Danger classification, scales the tension bump a death hands to nearby
/// players.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DangerRating {
    Low,
    Moderate,
    High,
}

/// Closed set of hostile unit archetypes the director can introduce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitClass {
    Skulk,
    Spitter,
    Brute,
    Drone,
}

impl UnitClass {
    pub fn display_label(&self) -> &'static str {
        match self {
            UnitClass::Skulk => "Skulk",
            UnitClass::Spitter => "Spitter",
            UnitClass::Brute => "Brute",
            UnitClass::Drone => "Drone",
        }
    }

    pub fn is_melee(&self) -> bool {
        matches!(self, UnitClass::Skulk | UnitClass::Brute)
    }

    pub fn danger(&self) -> DangerRating {
        match self {
            UnitClass::Drone => DangerRating::Low,
            UnitClass::Skulk | UnitClass::Spitter => DangerRating::Moderate,
            UnitClass::Brute => DangerRating::High,
        }
    }

    /// Horizontal clearance the unit needs at a spawn point.
    pub fn hull_radius(&self) -> f32 {
        match self {
            UnitClass::Drone => 0.4,
            UnitClass::Skulk => 0.6,
            UnitClass::Spitter => 0.8,
            UnitClass::Brute => 1.4,
        }
    }

    /// Weighted wanderer pick; heavies stay horde-only.
    pub fn sample_wanderer<R: Rng>(rng: &mut R) -> Self {
        match rng.gen_range(0..4) {
            0 => UnitClass::Spitter,
            1 => UnitClass::Drone,
            _ => UnitClass::Skulk,
        }
    }
}

/// A player-controlled unit as seen by the director.
#[derive(Component, Debug, Clone, Copy)]
pub struct PlayerUnit {
    pub position: Vec3,
    pub health: f32,
    pub max_health: f32,
}

impl PlayerUnit {
    pub fn new(position: Vec3, max_health: f32) -> Self {
        Self {
            position,
            health: max_health,
            max_health,
        }
    }

    pub fn health_fraction(&self) -> f32 {
        if self.max_health <= 0.0 {
            return 0.0;
        }
        (self.health / self.max_health).clamp(0.0, 1.0)
    }
}

/// A spawned hostile unit. Created dormant; [`UnitWoke`] on a later tick is
/// the only path that touches the spawn manager's population counters.
#[derive(Component, Debug, Clone, Copy)]
pub struct HostileUnit {
    pub class: UnitClass,
    pub position: Vec3,
    pub facing: f32,
    pub awake: bool,
}

impl HostileUnit {
    pub fn dormant(class: UnitClass, position: Vec3, facing: f32) -> Self {
        Self {
            class,
            position,
            facing,
            awake: false,
        }
    }
}

#[derive(Event, Debug, Clone, Copy)]
pub struct UnitWoke {
    pub unit: Entity,
    pub melee: bool,
}

#[derive(Event, Debug, Clone, Copy)]
pub struct UnitSlept {
    pub unit: Entity,
    pub melee: bool,
}

#[derive(Event, Debug, Clone, Copy)]
pub struct UnitKilled {
    pub class: UnitClass,
    pub position: Vec3,
}

#[derive(Event, Debug, Clone, Copy)]
pub struct PlayerDamaged {
    pub player: Entity,
    pub damage: f32,
    pub friendly_fire: bool,
}

/// A player has begun a lengthy high-stakes interaction (door hack, vault
/// unlock). The director backs the moment with a horde.
#[derive(Event, Debug, Clone, Copy)]
pub struct KeyInteractionStarted {
    pub player: Entity,
}

/// External trigger that releases a static spawn point waiting for a signal.
#[derive(Event, Debug, Clone, Copy)]
pub struct SpawnPointTriggered {
    pub spawn_point: Entity,
}

/// Stands in for each dormant unit's AI activation hook. Runs at the head of
/// the tick so population counters settle before any admission check.
pub fn activate_units(
    mut units: Query<(Entity, &mut HostileUnit)>,
    mut woke: EventWriter<UnitWoke>,
) {
    for (entity, mut unit) in units.iter_mut() {
        if !unit.awake {
            unit.awake = true;
            woke.send(UnitWoke {
                unit: entity,
                melee: unit.class.is_melee(),
            });
        }
    }
}

/// Player state sampled once per tick for spatial checks.
#[derive(Debug, Clone, Copy)]
pub struct PlayerSample {
    pub entity: Entity,
    pub position: Vec3,
}

pub fn sample_players(players: &Query<(Entity, &PlayerUnit)>) -> Vec<PlayerSample> {
    players
        .iter()
        .map(|(entity, player)| PlayerSample {
            entity,
            position: player.position,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::SmallRng, SeedableRng};

    #[test]
    fn melee_classification_matches_archetype() {
        assert!(UnitClass::Skulk.is_melee());
        assert!(UnitClass::Brute.is_melee());
        assert!(!UnitClass::Spitter.is_melee());
        assert!(!UnitClass::Drone.is_melee());
    }

    #[test]
    fn wanderer_sampling_never_picks_heavies() {
        let mut rng = SmallRng::seed_from_u64(7);
        for _ in 0..64 {
            assert_ne!(UnitClass::sample_wanderer(&mut rng), UnitClass::Brute);
        }
    }

    #[test]
    fn health_fraction_clamps() {
        let mut player = PlayerUnit::new(Vec3::ZERO, 100.0);
        player.health = 150.0;
        assert_eq!(player.health_fraction(), 1.0);
        player.health = -20.0;
        assert_eq!(player.health_fraction(), 0.0);
    }
}
