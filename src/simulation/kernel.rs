//! Update and respawn kernel
//!
//! Positions follow closed-form projectile motion from the particle's age,
//! recomputed each tick rather than integrated:
//!
//! ```text
//! x(t) = origin.x + wind.x * v.x * t
//! y(t) = origin.y + wind.y * v.y * t + gravity * t^2
//! z(t) = origin.z + wind.z * v.z * t
//! ```
//!
//! The respawn test runs after the position update in the same tick, so a
//! particle that drops below the emitter is back at the origin on that frame.

use super::particle::{ParticleChunk, ParticleMut};
use super::random::{ParticleSeeder, VelocityDistribution};
use cgmath::Vector3;

/// Logical tick length used by the original fountain.
pub const DEFAULT_TICK: f32 = 0.05;
pub const DEFAULT_GRAVITY: f32 = -9.0;
/// How far below the origin a particle may fall before it respawns.
pub const RESPAWN_EPSILON: f32 = 0.01;
pub const DEFAULT_MAX_AGE: f32 = 1.0;

/// When a particle's life ends.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub enum RespawnRule {
    /// Falls to `origin.y - RESPAWN_EPSILON` or below.
    #[default]
    BelowOrigin,
    /// Age exceeds the limit.
    MaxAge(f32),
    /// Whichever of the two happens first.
    BelowOriginOrMaxAge(f32),
}

impl RespawnRule {
    pub fn should_respawn(&self, origin_y: f32, y: f32, age: f32) -> bool {
        let below = y <= origin_y - RESPAWN_EPSILON;
        match *self {
            Self::BelowOrigin => below,
            Self::MaxAge(max_age) => age > max_age,
            Self::BelowOriginOrMaxAge(max_age) => below || age > max_age,
        }
    }

    /// Encoding shared with the compute kernel: bit 0 tests height, bit 1 age.
    pub fn flags(&self) -> u32 {
        match self {
            Self::BelowOrigin => 0b01,
            Self::MaxAge(_) => 0b10,
            Self::BelowOriginOrMaxAge(_) => 0b11,
        }
    }

    pub fn max_age(&self) -> f32 {
        match *self {
            Self::BelowOrigin => f32::INFINITY,
            Self::MaxAge(max_age) | Self::BelowOriginOrMaxAge(max_age) => max_age,
        }
    }
}

/// Environment for one update pass, snapshotted once before any particle
/// is touched.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct KernelParams {
    pub origin: Vector3<f32>,
    pub wind: Vector3<f32>,
    pub gravity: f32,
    pub dt: f32,
    pub respawn: RespawnRule,
}

/// Closed-form position at `age`.
#[inline]
pub fn projectile_position(
    origin: [f32; 3],
    wind: [f32; 3],
    gravity: f32,
    velocity: [f32; 3],
    age: f32,
) -> [f32; 3] {
    [
        origin[0] + wind[0] * velocity[0] * age,
        origin[1] + wind[1] * velocity[1] * age + gravity * (age * age),
        origin[2] + wind[2] * velocity[2] * age,
    ]
}

/// The per-particle update shared by every execution strategy.
#[derive(Clone, Copy)]
pub struct UpdateKernel<'a> {
    params: KernelParams,
    distribution: &'a VelocityDistribution,
    seeder: &'a ParticleSeeder,
}

impl<'a> UpdateKernel<'a> {
    pub fn new(
        params: KernelParams,
        distribution: &'a VelocityDistribution,
        seeder: &'a ParticleSeeder,
    ) -> Self {
        Self {
            params,
            distribution,
            seeder,
        }
    }

    pub fn params(&self) -> &KernelParams {
        &self.params
    }

    /// Advances one particle; returns true if it respawned.
    #[inline]
    pub fn step(&self, index: usize, p: ParticleMut<'_>) -> bool {
        let KernelParams {
            origin,
            wind,
            gravity,
            dt,
            respawn,
        } = self.params;

        *p.age += dt;
        let position = projectile_position(origin.into(), wind.into(), gravity, *p.velocity, *p.age);

        if respawn.should_respawn(origin.y, position[1], *p.age) {
            self.respawn(index, p);
            true
        } else {
            *p.position = position;
            false
        }
    }

    /// Starts a new life: age zero, at the origin, with a fresh velocity.
    pub fn respawn(&self, index: usize, p: ParticleMut<'_>) {
        *p.age = 0.0;
        *p.generation = p.generation.wrapping_add(1);
        *p.position = self.params.origin.into();
        *p.velocity = self.redraw(index, *p.generation);
    }

    /// Velocity for particle `index` in its `generation`-th life.
    pub fn redraw(&self, index: usize, generation: u32) -> [f32; 3] {
        self.seeder
            .velocity(self.distribution, index, generation)
            .into()
    }

    /// Runs the kernel over a chunk; returns the number of respawns.
    pub fn run(&self, mut chunk: ParticleChunk<'_>) -> usize {
        let mut respawned = 0;
        chunk.for_each_mut(|i, p| {
            if self.step(i, p) {
                respawned += 1;
            }
        });
        respawned
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::particle::ParticleStore;

    fn params(wind: [f32; 3], respawn: RespawnRule) -> KernelParams {
        KernelParams {
            origin: Vector3::new(0.0, 0.0, 0.0),
            wind: wind.into(),
            gravity: DEFAULT_GRAVITY,
            dt: DEFAULT_TICK,
            respawn,
        }
    }

    fn single(velocity: [f32; 3]) -> ParticleStore {
        let mut store = ParticleStore::initialize(
            Vector3::new(0.0, 0.0, 0.0),
            1,
            &VelocityDistribution::default(),
            &ParticleSeeder::new(5),
        )
        .unwrap();
        store.for_each_mut(|_, p| *p.velocity = velocity);
        store
    }

    #[test]
    fn first_tick_matches_closed_form() {
        let distribution = VelocityDistribution::default();
        let seeder = ParticleSeeder::new(5);
        let kernel = UpdateKernel::new(
            params([1.0, 1.0, 1.0], RespawnRule::BelowOrigin),
            &distribution,
            &seeder,
        );
        let mut store = single([2.5, 8.5, 2.5]);

        assert_eq!(kernel.run(store.as_chunk()), 0);

        let p = store.particle(0).unwrap();
        assert!((p.age - 0.05).abs() < 1e-7);
        assert!((p.position.x - 0.125).abs() < 1e-6);
        assert!((p.position.y - 0.4025).abs() < 1e-6);
        assert!((p.position.z - 0.125).abs() < 1e-6);
    }

    #[test]
    fn falling_below_origin_respawns_in_the_same_tick() {
        let distribution = VelocityDistribution::default();
        let seeder = ParticleSeeder::new(5);
        let kernel = UpdateKernel::new(
            params([1.0, 1.0, 1.0], RespawnRule::BelowOrigin),
            &distribution,
            &seeder,
        );
        // With v.y = 1 the particle peaks early and lands once 9t^2 > t.
        let mut store = single([1.0, 1.0, 1.0]);

        let mut ticks = 0;
        while kernel.run(store.as_chunk()) == 0 {
            ticks += 1;
            assert!(ticks < 100, "particle never landed");
        }

        let p = store.particle(0).unwrap();
        assert_eq!(p.age, 0.0);
        assert_eq!(p.position, Vector3::new(0.0, 0.0, 0.0));
        assert_eq!(store.generations()[0], 1);
        assert_eq!(p.velocity, seeder.velocity(&distribution, 0, 1));
    }

    #[test]
    fn max_age_rule_ignores_height() {
        let rule = RespawnRule::MaxAge(DEFAULT_MAX_AGE);
        assert!(!rule.should_respawn(0.0, -50.0, 0.5));
        assert!(rule.should_respawn(0.0, 50.0, 1.01));

        let either = RespawnRule::BelowOriginOrMaxAge(DEFAULT_MAX_AGE);
        assert!(either.should_respawn(0.0, -0.02, 0.1));
        assert!(either.should_respawn(0.0, 3.0, 1.5));
        assert!(!either.should_respawn(0.0, 3.0, 0.5));
    }

    #[test]
    fn epsilon_band_does_not_respawn() {
        let rule = RespawnRule::BelowOrigin;
        assert!(!rule.should_respawn(1.0, 0.995, 0.3));
        assert!(rule.should_respawn(1.0, 0.99, 0.3));
    }

    #[test]
    fn zero_wind_keeps_particles_at_origin() {
        let distribution = VelocityDistribution::default();
        let seeder = ParticleSeeder::new(5);
        for gravity in [0.0, DEFAULT_GRAVITY] {
            let kernel = UpdateKernel::new(
                KernelParams {
                    gravity,
                    ..params([0.0, 0.0, 0.0], RespawnRule::BelowOrigin)
                },
                &distribution,
                &seeder,
            );
            let mut store = single([3.0, 4.0, 5.0]);
            for _ in 0..40 {
                kernel.run(store.as_chunk());
                assert_eq!(store.positions()[0], [0.0, 0.0, 0.0]);
            }
        }
    }

    #[test]
    fn empty_chunk_is_a_no_op() {
        let distribution = VelocityDistribution::default();
        let seeder = ParticleSeeder::new(5);
        let kernel = UpdateKernel::new(
            params([1.0, 1.0, 1.0], RespawnRule::BelowOrigin),
            &distribution,
            &seeder,
        );
        let mut store = ParticleStore::default();
        assert_eq!(kernel.run(store.as_chunk()), 0);
    }
}
