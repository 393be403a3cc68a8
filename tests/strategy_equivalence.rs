//! Cross-strategy contract: every execution strategy produces the same
//! trajectories for the same seed.

use cgmath::Vector3;
use fountain::prelude::*;
use fountain::simulation::gpu::{HostBackend, OffloadedStrategy};
use fountain::simulation::kernel::{KernelParams, UpdateKernel};
use fountain::simulation::particle::ParticleStore;
use fountain::simulation::random::ParticleSeeder;

const TOLERANCE: f32 = 1e-5;

fn assert_close(a: &[[f32; 3]], b: &[[f32; 3]], tolerance: f32) {
    assert_eq!(a.len(), b.len());
    for (i, (pa, pb)) in a.iter().zip(b).enumerate() {
        for axis in 0..3 {
            assert!(
                (pa[axis] - pb[axis]).abs() <= tolerance,
                "particle {i} axis {axis}: {} vs {}",
                pa[axis],
                pb[axis]
            );
        }
    }
}

fn emitter(count: usize, seed: u64, strategy: StrategyKind, wind: Wind) -> Emitter {
    EmitterBuilder::new()
        .with_count(count)
        .with_origin(Vector3::new(0.0, 1.0, 0.0))
        .with_seed(seed)
        .with_strategy(strategy)
        .build(wind)
        .unwrap()
}

fn strategies() -> Vec<StrategyKind> {
    vec![
        StrategyKind::Sequential,
        StrategyKind::ForkJoin {
            workers: 4,
            partition: Partition::Static,
        },
        StrategyKind::ForkJoin {
            workers: 3,
            partition: Partition::Dynamic { chunk_size: 64 },
        },
        StrategyKind::Offloaded {
            backend: BackendKind::Host,
        },
    ]
}

#[test]
fn all_strategies_agree_over_many_ticks() {
    let mut emitters: Vec<Emitter> = strategies()
        .into_iter()
        .map(|kind| emitter(5000, 2024, kind, Wind::default()))
        .collect();

    for tick in 0..120 {
        // Changing wind mid-run must reach every strategy the same way.
        if tick == 60 {
            for e in &emitters {
                e.wind().set(Vector3::new(1.3, 0.9, 0.7));
            }
        }
        for e in emitters.iter_mut() {
            e.update(DEFAULT_TICK).unwrap();
        }
        let (reference, rest) = emitters.split_first().unwrap();
        for other in rest {
            assert_close(reference.positions(), other.positions(), TOLERANCE);
        }
    }
}

#[test]
fn fixed_seed_is_deterministic() {
    let run = || {
        let mut e = emitter(
            1000,
            7,
            StrategyKind::ForkJoin {
                workers: 0,
                partition: Partition::Static,
            },
            Wind::default(),
        );
        for _ in 0..50 {
            e.update(DEFAULT_TICK).unwrap();
        }
        e.positions().to_vec()
    };
    assert_eq!(run(), run());
}

#[test]
fn respawned_particles_sit_exactly_at_origin() {
    let origin = Vector3::new(0.0, 1.0, 0.0);
    for kind in strategies() {
        let mut e = emitter(2000, 11, kind, Wind::default());
        let mut seen_respawn = false;
        for _ in 0..40 {
            let stats = e.update(DEFAULT_TICK).unwrap();
            seen_respawn |= stats.respawned > 0;
            for i in 0..e.len() {
                let p = e.particle(i).unwrap();
                if p.age == 0.0 {
                    assert_eq!(p.position, origin, "{}", e.strategy_name());
                }
            }
        }
        assert!(seen_respawn);
    }
}

#[test]
fn respawning_one_particle_leaves_others_alone() {
    let distribution = VelocityDistribution::default();
    let seeder = ParticleSeeder::new(99);
    let params = KernelParams {
        origin: Vector3::new(0.0, 0.0, 0.0),
        wind: Vector3::new(1.0, 1.0, 1.0),
        gravity: DEFAULT_GRAVITY,
        dt: DEFAULT_TICK,
        respawn: RespawnRule::BelowOrigin,
    };
    let kernel = UpdateKernel::new(params, &distribution, &seeder);

    let mut baseline = ParticleStore::initialize(params.origin, 3, &distribution, &seeder).unwrap();
    let mut perturbed = baseline.clone();
    // Particle 1 gets a velocity that lands it on the first tick.
    perturbed.for_each_mut(|i, p| {
        if i == 1 {
            *p.velocity = [0.0, -5.0, 0.0];
        }
    });

    let mut sequential = fountain::simulation::cpu::SequentialStrategy::new();
    let stats = sequential.update(&mut perturbed, &kernel).unwrap();
    assert_eq!(stats.respawned, 1);
    sequential.update(&mut baseline, &kernel).unwrap();

    for i in [0, 2] {
        assert_eq!(perturbed.particle(i), baseline.particle(i));
    }
    assert_eq!(perturbed.generations()[1], 1);
}

#[test]
fn zero_wind_keeps_everything_at_origin() {
    for kind in strategies() {
        let mut e = emitter(500, 5, kind, Wind::new(Vector3::new(0.0, 0.0, 0.0)));
        for _ in 0..30 {
            e.update(DEFAULT_TICK).unwrap();
            assert!(e.positions().iter().all(|p| *p == [0.0, 1.0, 0.0]));
        }
    }
}

#[test]
fn empty_and_single_particle_emitters() {
    for kind in strategies() {
        let mut empty = emitter(0, 1, kind, Wind::default());
        let stats = empty.update(DEFAULT_TICK).unwrap();
        assert_eq!(stats, PassStats::default());
        assert!(empty.positions().is_empty());

        let mut single = emitter(1, 1, kind, Wind::default());
        let velocity = single.particle(0).unwrap().velocity;
        single.update(DEFAULT_TICK).unwrap();
        let p = single.particle(0).unwrap();
        let t = DEFAULT_TICK;
        let expected_y = 1.0 + velocity.y * t + DEFAULT_GRAVITY * t * t;
        // Upward draws clear the respawn line after one short tick.
        assert!(velocity.y >= 0.5);
        assert_eq!(p.age, t);
        assert!((p.position.x - velocity.x * t).abs() < TOLERANCE);
        assert!((p.position.y - expected_y).abs() < TOLERANCE);
        assert!((p.position.z - velocity.z * t).abs() < TOLERANCE);
    }
}

#[test]
fn offloaded_strategy_reports_backend() {
    let strategy = OffloadedStrategy::new(HostBackend::new());
    assert!(strategy.is_offloaded());

    let mut e = emitter(10, 3, StrategyKind::Sequential, Wind::default());
    e.set_strategy(Box::new(strategy));
    assert_eq!(e.strategy_name(), "offloaded (host)");
    e.update(DEFAULT_TICK).unwrap();
}

#[test]
fn gpu_strategy_matches_sequential_when_available() {
    let gpu = EmitterBuilder::new()
        .with_count(4096)
        .with_origin(Vector3::new(0.0, 1.0, 0.0))
        .with_seed(31)
        .with_strategy(StrategyKind::Offloaded {
            backend: BackendKind::Wgpu,
        })
        .with_fallback(false)
        .build(Wind::default());

    let mut gpu = match gpu {
        Ok(e) => e,
        Err(SimulationError::BackendUnavailable(reason)) => {
            eprintln!("skipping GPU comparison: {reason}");
            return;
        }
        Err(e) => panic!("unexpected error: {e}"),
    };
    let mut reference = emitter(4096, 31, StrategyKind::Sequential, Wind::default());

    // Few ticks: near-threshold landings may diverge under fused GPU math.
    for _ in 0..3 {
        gpu.update(DEFAULT_TICK).unwrap();
        reference.update(DEFAULT_TICK).unwrap();
    }
    assert_close(gpu.positions(), reference.positions(), 1e-4);
}
