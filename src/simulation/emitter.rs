//! # Fountain Emitter
//!
//! The emitter owns a fixed-size particle store, the emission origin and
//! gravity, and reads a wind vector shared with the surrounding scene. Each
//! call to [`Emitter::update`] runs one pass of the update kernel through the
//! configured execution strategy.
//!
//! ## Examples
//!
//! ```no_run
//! use fountain::simulation::emitter::{EmitterBuilder, StrategyKind, Wind};
//! use fountain::simulation::cpu::Partition;
//! use cgmath::Vector3;
//!
//! let wind = Wind::default();
//! let mut emitter = EmitterBuilder::new()
//!     .with_count(10_000)
//!     .with_origin(Vector3::new(0.0, 1.0, 0.0))
//!     .with_seed(42)
//!     .with_strategy(StrategyKind::ForkJoin { workers: 0, partition: Partition::Static })
//!     .build(wind.clone())?;
//!
//! emitter.update(0.05)?;
//! wind.nudge(Vector3::new(0.1, 0.0, 0.0));
//! emitter.update(0.05)?;
//! # Ok::<(), fountain::error::SimulationError>(())
//! ```

use super::cpu::{ForkJoinStrategy, Partition, SequentialStrategy};
use super::gpu::{HostBackend, OffloadedStrategy};
use super::kernel::{KernelParams, RespawnRule, UpdateKernel, DEFAULT_GRAVITY};
use super::low_level::WgpuBackend;
use super::particle::{Particle, ParticleStore};
use super::random::{OrbitTarget, ParticleSeeder, VelocityDistribution};
use super::render::SharedPositions;
use super::traits::{ExecutionStrategy, PassStats};
use crate::error::{SimulationError, SimulationResult};
use crate::performance::UpdateTimer;
use cgmath::Vector3;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Instant;

/// Wind step applied by [`Wind::nudge_axis`].
pub const WIND_STEP: f32 = 0.1;

/// Shared, externally owned wind vector
///
/// Cloning the handle shares the same value. Emitters read it once per
/// pass, so every particle in a pass sees the same wind.
#[derive(Clone, Debug)]
pub struct Wind(Arc<RwLock<Vector3<f32>>>);

impl Wind {
    pub fn new(value: Vector3<f32>) -> Self {
        Self(Arc::new(RwLock::new(value)))
    }

    /// Current value.
    pub fn snapshot(&self) -> Vector3<f32> {
        *self.0.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set(&self, value: Vector3<f32>) {
        *self.0.write().unwrap_or_else(PoisonError::into_inner) = value;
    }

    /// Adds `delta` to the current value.
    pub fn nudge(&self, delta: Vector3<f32>) {
        *self.0.write().unwrap_or_else(PoisonError::into_inner) += delta;
    }

    /// Moves one axis (0 = x, 1 = y, 2 = z) by `steps * WIND_STEP`.
    pub fn nudge_axis(&self, axis: usize, steps: f32) {
        let unit = match axis {
            0 => Vector3::unit_x(),
            1 => Vector3::unit_y(),
            2 => Vector3::unit_z(),
            _ => return,
        };
        self.nudge(unit * (steps * WIND_STEP));
    }

    /// Back to calm `(1, 1, 1)`.
    pub fn reset(&self) {
        self.set(Vector3::new(1.0, 1.0, 1.0));
    }
}

impl Default for Wind {
    fn default() -> Self {
        Self::new(Vector3::new(1.0, 1.0, 1.0))
    }
}

/// Compute backend for the offloaded strategy
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum BackendKind {
    /// GPU through wgpu compute.
    #[default]
    Wgpu,
    /// Batch kernel on the host.
    Host,
}

/// Which execution strategy an emitter is built with
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum StrategyKind {
    #[default]
    Sequential,
    /// `workers == 0` means one per logical CPU.
    ForkJoin { workers: usize, partition: Partition },
    Offloaded { backend: BackendKind },
}

impl StrategyKind {
    /// Creates the strategy, acquiring any pool or device it needs.
    pub fn build(self) -> SimulationResult<Box<dyn ExecutionStrategy>> {
        let strategy: Box<dyn ExecutionStrategy> = match self {
            Self::Sequential => Box::new(SequentialStrategy::new()),
            Self::ForkJoin { workers, partition } => {
                if let Partition::Dynamic { chunk_size: 0 } = partition {
                    return Err(SimulationError::InvalidConfig(
                        "dynamic partition chunk size must be positive".into(),
                    ));
                }
                Box::new(ForkJoinStrategy::new(workers, partition)?)
            }
            Self::Offloaded {
                backend: BackendKind::Wgpu,
            } => Box::new(OffloadedStrategy::new(WgpuBackend::new()?)),
            Self::Offloaded {
                backend: BackendKind::Host,
            } => Box::new(OffloadedStrategy::new(HostBackend::new())),
        };
        Ok(strategy)
    }
}

/// Emitter configuration
#[derive(Clone, Debug)]
pub struct EmitterSettings {
    pub count: usize,
    pub origin: Vector3<f32>,
    pub gravity: f32,
    /// `None` seeds from entropy.
    pub seed: Option<u64>,
    pub respawn: RespawnRule,
    pub distribution: VelocityDistribution,
    /// Sprays toward a target circling the emitter when set.
    pub aim: Option<OrbitTarget>,
    pub strategy: StrategyKind,
    /// Fall back to the sequential strategy when an offloaded backend
    /// cannot be created or fails mid-run.
    pub fallback_to_sequential: bool,
}

impl Default for EmitterSettings {
    fn default() -> Self {
        Self {
            count: 1000,
            origin: Vector3::new(0.0, 0.0, 0.0),
            gravity: DEFAULT_GRAVITY,
            seed: None,
            respawn: RespawnRule::default(),
            distribution: VelocityDistribution::default(),
            aim: None,
            strategy: StrategyKind::default(),
            fallback_to_sequential: true,
        }
    }
}

impl EmitterSettings {
    fn validate(&self) -> SimulationResult<()> {
        let finite = |v: Vector3<f32>| v.x.is_finite() && v.y.is_finite() && v.z.is_finite();

        if !finite(self.origin) {
            return Err(SimulationError::InvalidConfig(format!(
                "origin must be finite, got {:?}",
                self.origin
            )));
        }
        if !self.gravity.is_finite() {
            return Err(SimulationError::InvalidConfig(format!(
                "gravity must be finite, got {}",
                self.gravity
            )));
        }
        if let RespawnRule::MaxAge(max_age) | RespawnRule::BelowOriginOrMaxAge(max_age) =
            self.respawn
        {
            if max_age.is_nan() || max_age <= 0.0 {
                return Err(SimulationError::InvalidConfig(format!(
                    "max age must be positive, got {max_age}"
                )));
            }
        }
        let distribution = &self.distribution;
        for (name, range) in [
            ("horizontal range", distribution.horizontal_range),
            ("vertical range", distribution.vertical_range),
        ] {
            if !range.is_finite() || range < 0.0 {
                return Err(SimulationError::InvalidConfig(format!(
                    "velocity {name} must be finite and non-negative, got {range}"
                )));
            }
        }
        if !distribution.offset.is_finite() {
            return Err(SimulationError::InvalidConfig(format!(
                "velocity offset must be finite, got {}",
                distribution.offset
            )));
        }
        if !finite(distribution.bias) {
            return Err(SimulationError::InvalidConfig(
                "velocity bias must be finite".into(),
            ));
        }
        if let Some(aim) = &self.aim {
            if !aim.is_finite() {
                return Err(SimulationError::InvalidConfig(format!(
                    "aim target must be finite, got {aim:?}"
                )));
            }
        }
        Ok(())
    }
}

/// Fluent builder for [`Emitter`]
#[derive(Clone, Debug, Default)]
pub struct EmitterBuilder {
    settings: EmitterSettings,
}

impl EmitterBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_count(mut self, count: usize) -> Self {
        self.settings.count = count;
        self
    }

    pub fn with_origin(mut self, origin: Vector3<f32>) -> Self {
        self.settings.origin = origin;
        self
    }

    pub fn with_gravity(mut self, gravity: f32) -> Self {
        self.settings.gravity = gravity;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.settings.seed = Some(seed);
        self
    }

    pub fn with_respawn(mut self, respawn: RespawnRule) -> Self {
        self.settings.respawn = respawn;
        self
    }

    pub fn with_distribution(mut self, distribution: VelocityDistribution) -> Self {
        self.settings.distribution = distribution;
        self
    }

    /// Aim every draw at a target circling the emitter
    ///
    /// # Arguments
    /// * `target` - Orbit the spray follows; pair with
    ///   [`VelocityDistribution::aimed`] for the narrow aimed spread
    pub fn with_aim(mut self, target: OrbitTarget) -> Self {
        self.settings.aim = Some(target);
        self
    }

    pub fn with_strategy(mut self, strategy: StrategyKind) -> Self {
        self.settings.strategy = strategy;
        self
    }

    pub fn with_fallback(mut self, fallback_to_sequential: bool) -> Self {
        self.settings.fallback_to_sequential = fallback_to_sequential;
        self
    }

    pub fn settings(&self) -> &EmitterSettings {
        &self.settings
    }

    /// Allocates the store and starts the strategy.
    ///
    /// # Arguments
    /// * `wind` - Handle shared with whatever adjusts the wind
    ///
    /// # Returns
    /// The emitter, or the first invalid setting or startup failure
    pub fn build(self, wind: Wind) -> SimulationResult<Emitter> {
        let started = Instant::now();
        let settings = self.settings;
        settings.validate()?;

        let seeder = settings
            .seed
            .map(ParticleSeeder::new)
            .unwrap_or_else(ParticleSeeder::from_entropy);

        let store = ParticleStore::initialize(
            settings.origin,
            settings.count,
            &aim_distribution(settings.distribution, settings.aim, settings.origin),
            &seeder,
        )?;

        let strategy: Box<dyn ExecutionStrategy> = match settings.strategy.build() {
            Ok(strategy) => strategy,
            Err(err)
                if settings.fallback_to_sequential
                    && matches!(settings.strategy, StrategyKind::Offloaded { .. }) =>
            {
                log::warn!("{err}; falling back to the sequential strategy");
                Box::new(SequentialStrategy::new())
            }
            Err(err) => return Err(err),
        };

        log::info!(
            "Emitter ready: {} particles, {} strategy, seed {} ({:.2?})",
            store.len(),
            strategy.name(),
            seeder.seed(),
            started.elapsed()
        );

        Ok(Emitter {
            store,
            origin: settings.origin,
            gravity: settings.gravity,
            wind,
            respawn: settings.respawn,
            distribution: settings.distribution,
            aim: settings.aim,
            seeder,
            strategy,
            fallback_to_sequential: settings.fallback_to_sequential,
            timer: UpdateTimer::new(),
            last_stats: PassStats::default(),
        })
    }
}

/// A fountain of `N` particles
pub struct Emitter {
    store: ParticleStore,
    origin: Vector3<f32>,
    gravity: f32,
    wind: Wind,
    respawn: RespawnRule,
    distribution: VelocityDistribution,
    aim: Option<OrbitTarget>,
    seeder: ParticleSeeder,
    strategy: Box<dyn ExecutionStrategy>,
    fallback_to_sequential: bool,
    timer: UpdateTimer,
    last_stats: PassStats,
}

impl Emitter {
    /// `count` particles at `origin`, sequential strategy, entropy seed.
    pub fn new(origin: Vector3<f32>, count: usize, wind: Wind) -> SimulationResult<Self> {
        EmitterBuilder::new()
            .with_origin(origin)
            .with_count(count)
            .build(wind)
    }

    /// Advances every particle by one tick of length `dt`.
    ///
    /// If an offloaded pass fails and fallback is enabled, the pass is
    /// rerun sequentially and the emitter stays sequential afterwards.
    ///
    /// # Arguments
    /// * `dt` - Logical tick length; must be finite and positive
    ///
    /// # Returns
    /// Particle and respawn counts for the pass
    pub fn update(&mut self, dt: f32) -> SimulationResult<PassStats> {
        if !dt.is_finite() || dt <= 0.0 {
            return Err(SimulationError::InvalidConfig(format!(
                "tick must be finite and positive, got {dt}"
            )));
        }

        let params = KernelParams {
            origin: self.origin,
            wind: self.wind.snapshot(),
            gravity: self.gravity,
            dt,
            respawn: self.respawn,
        };
        // Aim follows the current origin and target for this pass only.
        let distribution = aim_distribution(self.distribution, self.aim, self.origin);
        let kernel = UpdateKernel::new(params, &distribution, &self.seeder);

        self.timer.begin_pass();
        let stats = match self.strategy.update(&mut self.store, &kernel) {
            Ok(stats) => stats,
            Err(err) if self.fallback_to_sequential && self.strategy.is_offloaded() => {
                log::warn!(
                    "{} pass failed: {err}; switching to the sequential strategy",
                    self.strategy.name()
                );
                self.strategy = Box::new(SequentialStrategy::new());
                self.strategy.update(&mut self.store, &kernel)?
            }
            Err(err) => return Err(err),
        };
        if let Some(elapsed) = self.timer.end_pass() {
            log::debug!(
                "{} pass: {} particles, {} respawned in {:.2?}",
                self.strategy.name(),
                stats.particles,
                stats.respawned,
                elapsed
            );
        }

        if let Some(aim) = self.aim.as_mut() {
            aim.advance();
        }
        self.last_stats = stats;
        Ok(stats)
    }

    pub fn origin(&self) -> Vector3<f32> {
        self.origin
    }

    /// Moves the emission point; live particles follow from the next tick.
    ///
    /// # Arguments
    /// * `origin` - New emission point in world space
    pub fn set_origin(&mut self, origin: Vector3<f32>) {
        self.origin = origin;
    }

    /// Moves the emission point relative to where it is
    ///
    /// # Arguments
    /// * `delta` - Offset added to the current origin
    pub fn nudge_origin(&mut self, delta: Vector3<f32>) {
        self.origin += delta;
    }

    pub fn aim(&self) -> Option<&OrbitTarget> {
        self.aim.as_ref()
    }

    /// Starts or stops aiming; takes effect on the next respawns.
    pub fn set_aim(&mut self, aim: Option<OrbitTarget>) {
        self.aim = aim;
    }

    /// Changes how fast the aim target circles
    ///
    /// # Arguments
    /// * `delta` - Degrees per tick added to the angular speed (negative
    ///   slows it down or reverses it); ignored when not aiming
    pub fn adjust_aim_speed(&mut self, delta: f32) {
        if let Some(aim) = self.aim.as_mut() {
            aim.speed_degrees += delta;
        }
    }

    pub fn gravity(&self) -> f32 {
        self.gravity
    }

    pub fn wind(&self) -> &Wind {
        &self.wind
    }

    pub fn respawn_rule(&self) -> RespawnRule {
        self.respawn
    }

    pub fn seed(&self) -> u64 {
        self.seeder.seed()
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    /// Render-ready positions.
    pub fn positions(&self) -> &[[f32; 3]] {
        self.store.positions()
    }

    pub fn particle(&self, index: usize) -> Option<Particle> {
        self.store.particle(index)
    }

    pub fn store(&self) -> &ParticleStore {
        &self.store
    }

    /// Replaces the strategy; the old one releases its resources on drop.
    ///
    /// # Arguments
    /// * `strategy` - Strategy used from the next `update` on
    pub fn set_strategy(&mut self, strategy: Box<dyn ExecutionStrategy>) {
        log::info!(
            "Emitter strategy: {} -> {}",
            self.strategy.name(),
            strategy.name()
        );
        self.strategy = strategy;
    }

    pub fn strategy_name(&self) -> &str {
        self.strategy.name()
    }

    /// Every particle back at the origin in its first life.
    pub fn reset(&mut self) {
        let distribution = aim_distribution(self.distribution, self.aim, self.origin);
        self.store.reset(self.origin, &distribution, &self.seeder);
        self.timer.reset();
        self.last_stats = PassStats::default();
    }

    /// Copies positions into a buffer shared with a render thread.
    pub fn publish(&self, target: &SharedPositions) {
        target.publish(self.store.positions());
    }

    pub fn last_stats(&self) -> PassStats {
        self.last_stats
    }

    pub fn timer(&self) -> &UpdateTimer {
        &self.timer
    }
}

/// `distribution` biased toward `aim` as seen from `origin`.
fn aim_distribution(
    distribution: VelocityDistribution,
    aim: Option<OrbitTarget>,
    origin: Vector3<f32>,
) -> VelocityDistribution {
    match aim {
        Some(target) => distribution.aimed_at(origin, target.position()),
        None => distribution,
    }
}

impl Drop for Emitter {
    fn drop(&mut self) {
        log::debug!(
            "Releasing emitter ({} particles, {} strategy)",
            self.store.len(),
            self.strategy.name()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded(count: usize, strategy: StrategyKind) -> Emitter {
        EmitterBuilder::new()
            .with_count(count)
            .with_origin(Vector3::new(0.0, 2.0, 0.0))
            .with_seed(9)
            .with_strategy(strategy)
            .build(Wind::default())
            .unwrap()
    }

    #[test]
    fn new_emitter_starts_at_origin() {
        let origin = Vector3::new(1.0, 2.0, 3.0);
        let emitter = Emitter::new(origin, 50, Wind::default()).unwrap();
        assert_eq!(emitter.len(), 50);
        assert_eq!(emitter.strategy_name(), "sequential");
        for i in 0..50 {
            let p = emitter.particle(i).unwrap();
            assert_eq!(p.position, origin);
            assert_eq!(p.age, 0.0);
        }
    }

    #[test]
    fn wind_handle_is_shared() {
        let wind = Wind::default();
        let emitter = EmitterBuilder::new()
            .with_count(1)
            .build(wind.clone())
            .unwrap();

        wind.nudge_axis(0, 1.0);
        wind.nudge_axis(2, -1.0);
        let seen = emitter.wind().snapshot();
        assert!((seen.x - 1.1).abs() < 1e-6);
        assert!((seen.z - 0.9).abs() < 1e-6);

        wind.nudge_axis(7, 1.0);
        wind.reset();
        assert_eq!(emitter.wind().snapshot(), Vector3::new(1.0, 1.0, 1.0));
    }

    #[test]
    fn same_seed_same_trajectory() {
        let mut a = seeded(100, StrategyKind::Sequential);
        let mut b = seeded(100, StrategyKind::Sequential);
        for _ in 0..30 {
            a.update(0.05).unwrap();
            b.update(0.05).unwrap();
        }
        assert_eq!(a.positions(), b.positions());
        assert_eq!(a.seed(), 9);
    }

    #[test]
    fn host_offload_matches_sequential() {
        let mut a = seeded(200, StrategyKind::Sequential);
        let mut b = seeded(
            200,
            StrategyKind::Offloaded {
                backend: BackendKind::Host,
            },
        );
        assert_eq!(b.strategy_name(), "offloaded (host)");
        for _ in 0..40 {
            let sa = a.update(0.05).unwrap();
            let sb = b.update(0.05).unwrap();
            assert_eq!(sa, sb);
        }
        assert_eq!(a.positions(), b.positions());
        assert_eq!(b.last_stats().particles, 200);
        assert_eq!(b.timer().metrics().total_passes, 40);
    }

    #[test]
    fn non_positive_tick_is_rejected() {
        let mut emitter = seeded(3, StrategyKind::Sequential);
        assert!(matches!(
            emitter.update(0.0),
            Err(SimulationError::InvalidConfig(_))
        ));
        assert!(matches!(
            emitter.update(f32::NAN),
            Err(SimulationError::InvalidConfig(_))
        ));
        assert!(matches!(
            emitter.update(f32::INFINITY),
            Err(SimulationError::InvalidConfig(_))
        ));
        assert_eq!(emitter.particle(0).unwrap().age, 0.0);
    }

    #[test]
    fn invalid_settings_are_rejected() {
        let err = EmitterBuilder::new()
            .with_respawn(RespawnRule::MaxAge(0.0))
            .build(Wind::default())
            .err();
        assert!(matches!(err, Some(SimulationError::InvalidConfig(_))));

        let err = EmitterBuilder::new()
            .with_gravity(f32::INFINITY)
            .build(Wind::default())
            .err();
        assert!(matches!(err, Some(SimulationError::InvalidConfig(_))));

        let err = EmitterBuilder::new()
            .with_strategy(StrategyKind::ForkJoin {
                workers: 2,
                partition: Partition::Dynamic { chunk_size: 0 },
            })
            .build(Wind::default())
            .err();
        assert!(matches!(err, Some(SimulationError::InvalidConfig(_))));
    }

    #[test]
    fn unusable_velocity_ranges_are_rejected() {
        let broken = [
            VelocityDistribution {
                horizontal_range: f32::INFINITY,
                ..VelocityDistribution::default()
            },
            VelocityDistribution {
                vertical_range: f32::NAN,
                ..VelocityDistribution::default()
            },
            VelocityDistribution {
                horizontal_range: -1.0,
                ..VelocityDistribution::default()
            },
            VelocityDistribution {
                offset: f32::NEG_INFINITY,
                ..VelocityDistribution::default()
            },
        ];
        for distribution in broken {
            let err = EmitterBuilder::new()
                .with_count(4)
                .with_distribution(distribution)
                .build(Wind::default())
                .err();
            assert!(
                matches!(err, Some(SimulationError::InvalidConfig(_))),
                "{distribution:?} was accepted"
            );
        }

        let err = EmitterBuilder::new()
            .with_aim(OrbitTarget {
                speed_degrees: f32::NAN,
                ..OrbitTarget::default()
            })
            .build(Wind::default())
            .err();
        assert!(matches!(err, Some(SimulationError::InvalidConfig(_))));

        // Zero ranges collapse the spread but stay valid.
        let still = VelocityDistribution {
            horizontal_range: 0.0,
            vertical_range: 0.0,
            ..VelocityDistribution::default()
        };
        let emitter = EmitterBuilder::new()
            .with_count(4)
            .with_distribution(still)
            .build(Wind::default())
            .unwrap();
        assert!(emitter
            .store()
            .velocities()
            .iter()
            .all(|v| *v == [0.5, 0.5, 0.5]));
    }

    #[test]
    fn nudge_origin_is_relative() {
        let mut emitter = seeded(1, StrategyKind::Sequential);
        emitter.nudge_origin(Vector3::new(0.1, 0.0, 0.0));
        emitter.nudge_origin(Vector3::new(0.0, 0.0, -0.1));
        let origin = emitter.origin();
        assert!((origin.x - 0.1).abs() < 1e-6);
        assert_eq!(origin.y, 2.0);
        assert!((origin.z + 0.1).abs() < 1e-6);
    }

    #[test]
    fn aimed_respawns_follow_the_orbit() {
        let origin = Vector3::new(0.0, 2.0, 0.0);
        let distribution = VelocityDistribution::aimed();
        let target = OrbitTarget {
            speed_degrees: 15.0,
            ..OrbitTarget::default()
        };
        let mut emitter = EmitterBuilder::new()
            .with_count(64)
            .with_origin(origin)
            .with_seed(5)
            .with_distribution(distribution)
            .with_aim(target)
            .build(Wind::default())
            .unwrap();
        let seeder = emitter.seeder;

        // First lives aim at the starting angle.
        let first = distribution.aimed_at(origin, target.position());
        for (i, v) in emitter.store().velocities().iter().enumerate() {
            assert_eq!(*v, Into::<[f32; 3]>::into(seeder.velocity(&first, i, 0)));
        }

        let moved = Vector3::new(1.0, 1.5, -1.0);
        let mut redrawn = 0;
        for tick in 0..80 {
            let aim = *emitter.aim().unwrap();
            let current_origin = if tick % 2 == 0 { moved } else { origin };
            emitter.set_origin(current_origin);
            let before = emitter.store().generations().to_vec();
            emitter.update(0.05).unwrap();

            let expected = distribution.aimed_at(current_origin, aim.position());
            let store = emitter.store();
            for i in 0..store.len() {
                let generation = store.generations()[i];
                if generation != before[i] {
                    redrawn += 1;
                    assert_eq!(
                        store.velocities()[i],
                        Into::<[f32; 3]>::into(seeder.velocity(&expected, i, generation))
                    );
                }
            }
            let after = emitter.aim().unwrap().angle_degrees;
            assert!((after - (aim.angle_degrees + 15.0) % 360.0).abs() < 1e-4);
        }
        assert!(redrawn > 0);

        emitter.set_aim(None);
        assert!(emitter.aim().is_none());
        emitter.adjust_aim_speed(3.0);
        assert!(emitter.aim().is_none());
    }

    #[test]
    fn aimed_strategies_agree() {
        let build = |strategy| {
            EmitterBuilder::new()
                .with_count(300)
                .with_seed(21)
                .with_distribution(VelocityDistribution::aimed())
                .with_aim(OrbitTarget {
                    speed_degrees: 7.0,
                    ..OrbitTarget::default()
                })
                .with_strategy(strategy)
                .build(Wind::default())
                .unwrap()
        };
        let mut sequential = build(StrategyKind::Sequential);
        let mut offloaded = build(StrategyKind::Offloaded {
            backend: BackendKind::Host,
        });
        for _ in 0..60 {
            sequential.update(0.05).unwrap();
            offloaded.update(0.05).unwrap();
        }
        assert_eq!(sequential.positions(), offloaded.positions());
        assert_eq!(sequential.aim(), offloaded.aim());
    }

    #[test]
    fn set_origin_moves_respawns() {
        let mut emitter = seeded(100, StrategyKind::Sequential);
        let moved = Vector3::new(5.0, 5.0, 5.0);
        emitter.set_origin(moved);

        // Every particle lands within 60 ticks and respawns at the new origin.
        let mut respawned = vec![false; 100];
        for _ in 0..60 {
            emitter.update(0.05).unwrap();
            for (i, seen) in respawned.iter_mut().enumerate() {
                let p = emitter.particle(i).unwrap();
                if p.age == 0.0 {
                    assert_eq!(p.position, moved);
                    *seen = true;
                }
            }
        }
        assert!(respawned.iter().all(|&r| r));
    }

    #[test]
    fn reset_restores_first_life() {
        let mut emitter = seeded(20, StrategyKind::Sequential);
        let initial: Vec<_> = emitter.store().velocities().to_vec();
        for _ in 0..25 {
            emitter.update(0.05).unwrap();
        }
        emitter.reset();
        assert_eq!(emitter.store().velocities(), initial.as_slice());
        assert!(emitter.store().generations().iter().all(|&g| g == 0));
        assert!(emitter
            .positions()
            .iter()
            .all(|p| *p == [0.0, 2.0, 0.0]));
    }

    #[test]
    fn publish_copies_positions() {
        let mut emitter = seeded(10, StrategyKind::Sequential);
        emitter.update(0.05).unwrap();
        let shared = SharedPositions::new();
        emitter.publish(&shared);
        assert_eq!(shared.snapshot(), emitter.positions());
    }
}
