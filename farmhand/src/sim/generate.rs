//! Seeded random worlds.

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use super::world::SimulatedWorld;
use crate::gateway::{Loadout, Resources, Village};
use crate::target::{Coord, PlayerId, Target, TargetId, VillageId};

/// Player owning every generated village.
pub const SIM_PLAYER: PlayerId = PlayerId(1);

/// Shape of a generated world.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorldSpec {
    pub villages: usize,
    pub targets: usize,
    pub seed: u64,
}

/// Builds a world with villages spread around the origin and targets
/// scattered around them. The same spec always yields the same world.
pub fn generate_world(spec: &WorldSpec) -> SimulatedWorld {
    let mut rng = SmallRng::seed_from_u64(spec.seed);
    let world = SimulatedWorld::new().with_secs_per_field(30.0);

    for i in 0..spec.villages {
        let id = VillageId(i as u32 + 1);
        let village = Village {
            id,
            name: format!("Village {:03}", i + 1),
            coord: Coord::new(rng.gen_range(480..=520), rng.gen_range(480..=520)),
            owner: SIM_PLAYER,
            groups: Vec::new(),
        };
        world.add_village(
            village,
            [("spear", rng.gen_range(50..=200)), ("light", rng.gen_range(10..=60))],
        );
        world.set_resources(
            id,
            Resources::new(
                rng.gen_range(1_000..=20_000),
                rng.gen_range(1_000..=20_000),
                rng.gen_range(1_000..=20_000),
            ),
            400_000,
        );
    }

    for i in 0..spec.targets {
        let mut target = Target::unclaimed(
            TargetId(i as u32 + 1_000),
            Coord::new(rng.gen_range(470..=530), rng.gen_range(470..=530)),
            rng.gen_range(26..=3_000),
        );
        // A few targets belong to other players.
        if rng.gen_bool(0.1) {
            target = target.with_owner(PlayerId(rng.gen_range(2..=50)));
        }
        let protected = rng.gen_bool(0.05);
        let id = target.id;
        world.add_target(target);
        if protected {
            world.set_protected(id, true);
        }
    }

    world.set_loadouts(vec![
        Loadout::new("light cavalry", 800).with_units("light", 10),
        Loadout::new("spears", 500).with_units("spear", 20),
    ]);
    world
}
