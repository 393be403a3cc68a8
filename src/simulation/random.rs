//! Random velocity sources for emission and respawn
//!
//! Velocities are drawn from per-particle streams keyed on
//! `(seed, index, generation)`. A particle's redraw therefore never depends on
//! which worker visited it or in what order, which keeps every execution
//! strategy on the same trajectory for a given seed.

use cgmath::Vector3;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

/// The two primitives the emitter needs from a random generator.
pub trait RandomSource {
    /// Uniform value in `[-range, range]`.
    fn symmetric(&mut self, range: f32) -> f32;

    /// Uniform value in `[0, range]`.
    fn positive(&mut self, range: f32) -> f32;
}

impl<R: Rng + ?Sized> RandomSource for R {
    fn symmetric(&mut self, range: f32) -> f32 {
        if range <= 0.0 {
            return 0.0;
        }
        self.random_range(-range..=range)
    }

    fn positive(&mut self, range: f32) -> f32 {
        if range <= 0.0 {
            return 0.0;
        }
        self.random_range(0.0..=range)
    }
}

/// Shape of the emission velocity distribution.
///
/// Horizontal components spread both ways around `bias + offset`; the
/// vertical component is never below `bias.y + offset`, which keeps the
/// fountain ejecting upwards.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VelocityDistribution {
    pub horizontal_range: f32,
    pub vertical_range: f32,
    pub offset: f32,
    /// Added to every draw; aims the spray toward a target direction.
    pub bias: Vector3<f32>,
}

impl Default for VelocityDistribution {
    fn default() -> Self {
        Self {
            horizontal_range: 5.0,
            vertical_range: 10.0,
            offset: 0.5,
            bias: Vector3::new(0.0, 0.0, 0.0),
        }
    }
}

impl VelocityDistribution {
    /// Narrower horizontal spread used when the spray is aimed at an
    /// [`OrbitTarget`].
    pub fn aimed() -> Self {
        Self {
            horizontal_range: 2.0,
            ..Self::default()
        }
    }

    /// Aims the spray at `target` as seen from `origin`.
    pub fn aimed_at(mut self, origin: Vector3<f32>, target: Vector3<f32>) -> Self {
        self.bias = target - origin;
        self
    }

    /// Draws one velocity.
    pub fn sample<R: RandomSource + ?Sized>(&self, rng: &mut R) -> Vector3<f32> {
        Vector3::new(
            self.bias.x + rng.symmetric(self.horizontal_range) + self.offset,
            self.bias.y + rng.positive(self.vertical_range) + self.offset,
            self.bias.z + rng.symmetric(self.horizontal_range) + self.offset,
        )
    }
}

/// Point circling the vertical axis that an aimed fountain sprays toward
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct OrbitTarget {
    pub radius: f32,
    pub height: f32,
    pub angle_degrees: f32,
    /// Degrees added to the angle every tick.
    pub speed_degrees: f32,
}

impl Default for OrbitTarget {
    fn default() -> Self {
        Self {
            radius: 4.0,
            height: 2.0,
            angle_degrees: 0.0,
            speed_degrees: 0.0,
        }
    }
}

impl OrbitTarget {
    /// Current target position in world space.
    pub fn position(&self) -> Vector3<f32> {
        let (sin, cos) = self.angle_degrees.to_radians().sin_cos();
        Vector3::new(cos * self.radius, self.height, sin * self.radius)
    }

    /// Moves the target one tick along its circle.
    pub fn advance(&mut self) {
        self.angle_degrees = (self.angle_degrees + self.speed_degrees) % 360.0;
    }

    pub fn is_finite(&self) -> bool {
        [self.radius, self.height, self.angle_degrees, self.speed_degrees]
            .iter()
            .all(|v| v.is_finite())
    }
}

/// Derives an independent, reproducible stream for each particle life.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ParticleSeeder {
    seed: u64,
}

impl ParticleSeeder {
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }

    /// Seeder with a seed taken from the thread-local generator.
    pub fn from_entropy() -> Self {
        Self::new(rand::rng().random())
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Stream for particle `index` in its `generation`-th life.
    pub fn stream(&self, index: usize, generation: u32) -> SmallRng {
        let key = self.seed
            ^ (index as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15)
            ^ (generation as u64).wrapping_mul(0xC2B2_AE3D_27D4_EB4F);
        SmallRng::seed_from_u64(splitmix64(key))
    }

    /// Convenience: draw the velocity for `index` at `generation`.
    pub fn velocity(
        &self,
        distribution: &VelocityDistribution,
        index: usize,
        generation: u32,
    ) -> Vector3<f32> {
        distribution.sample(&mut self.stream(index, generation))
    }
}

fn splitmix64(mut z: u64) -> u64 {
    z = z.wrapping_add(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}
