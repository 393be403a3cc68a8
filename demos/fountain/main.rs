//! Fountain demo: runs the emitter headless and reports update timing.
//!
//! ```bash
//! cargo run --release --example fountain -- -n 200000 -s fork-join
//! cargo run --release --example fountain -- --aim --aim-speed 2
//! ```

use anyhow::Context;
use cgmath::Vector3;
use clap::{Parser, ValueEnum};
use fountain::prelude::*;

#[derive(Clone, Copy, Debug, ValueEnum)]
enum StrategyArg {
    Sequential,
    ForkJoin,
    /// Fork-join over small work-stolen chunks.
    ForkJoinDynamic,
    Gpu,
    /// Offloaded batch kernel executed on the host.
    Host,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum RespawnArg {
    BelowOrigin,
    MaxAge,
    Either,
}

#[derive(Parser)]
#[command(name = "fountain")]
#[command(version, about = "Projectile particle fountain with pluggable execution strategies")]
struct Cli {
    /// Number of particles.
    #[arg(short = 'n', long, default_value_t = 100_000)]
    count: usize,

    /// Ticks to simulate.
    #[arg(short, long, default_value_t = 200)]
    ticks: usize,

    #[arg(short, long, value_enum, default_value_t = StrategyArg::Sequential)]
    strategy: StrategyArg,

    /// Fixed seed; random if omitted.
    #[arg(long)]
    seed: Option<u64>,

    /// Logical tick length.
    #[arg(long, default_value_t = DEFAULT_TICK)]
    dt: f32,

    /// Fork-join worker threads (0 = one per CPU).
    #[arg(short, long, default_value_t = 0)]
    workers: usize,

    /// Chunk size for the dynamic fork-join partition.
    #[arg(long, default_value_t = 4096)]
    chunk_size: usize,

    #[arg(long, value_enum, default_value_t = RespawnArg::BelowOrigin)]
    respawn: RespawnArg,

    /// Lifetime used by the max-age respawn rules.
    #[arg(long, default_value_t = 1.0)]
    max_age: f32,

    /// Fail instead of falling back to sequential when the GPU is missing.
    #[arg(long)]
    no_fallback: bool,

    /// Spray toward a target circling the origin.
    #[arg(long)]
    aim: bool,

    /// Degrees the aim target travels per tick.
    #[arg(long, default_value_t = 1.0)]
    aim_speed: f32,
}

impl Cli {
    fn strategy(&self) -> StrategyKind {
        match self.strategy {
            StrategyArg::Sequential => StrategyKind::Sequential,
            StrategyArg::ForkJoin => StrategyKind::ForkJoin {
                workers: self.workers,
                partition: Partition::Static,
            },
            StrategyArg::ForkJoinDynamic => StrategyKind::ForkJoin {
                workers: self.workers,
                partition: Partition::Dynamic {
                    chunk_size: self.chunk_size,
                },
            },
            StrategyArg::Gpu => StrategyKind::Offloaded {
                backend: BackendKind::Wgpu,
            },
            StrategyArg::Host => StrategyKind::Offloaded {
                backend: BackendKind::Host,
            },
        }
    }

    fn respawn(&self) -> RespawnRule {
        match self.respawn {
            RespawnArg::BelowOrigin => RespawnRule::BelowOrigin,
            RespawnArg::MaxAge => RespawnRule::MaxAge(self.max_age),
            RespawnArg::Either => RespawnRule::BelowOriginOrMaxAge(self.max_age),
        }
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let mut builder = EmitterBuilder::new()
        .with_count(cli.count)
        .with_origin(Vector3::new(0.0, 0.0, 0.0))
        .with_respawn(cli.respawn())
        .with_strategy(cli.strategy())
        .with_fallback(!cli.no_fallback);
    if let Some(seed) = cli.seed {
        builder = builder.with_seed(seed);
    }
    if cli.aim {
        builder = builder
            .with_distribution(VelocityDistribution::aimed())
            .with_aim(OrbitTarget {
                speed_degrees: cli.aim_speed,
                ..OrbitTarget::default()
            });
    }

    let emitter = builder
        .build(Wind::default())
        .context("failed to create emitter")?;

    let shared = SharedPositions::new();
    let mut manager = SimulationManager::new(emitter, shared.clone());
    manager
        .set_fixed_timestep(cli.dt)
        .context("invalid tick length")?;

    let mut respawned = 0;
    for _ in 0..cli.ticks {
        manager.tick().context("update failed")?;
        respawned += manager.emitter().last_stats().respawned;
    }

    let emitter = manager.emitter();
    let metrics = emitter.timer().metrics();
    println!(
        "{} particles x {} ticks with {}",
        emitter.len(),
        cli.ticks,
        emitter.strategy_name()
    );
    println!(
        "update: avg {:.3} ms, min {:.3} ms, max {:.3} ms ({:.1} passes/s)",
        metrics.avg_pass_ms, metrics.min_pass_ms, metrics.max_pass_ms, metrics.passes_per_second
    );
    println!(
        "respawns: {respawned}, seed: {}, published {} positions",
        emitter.seed(),
        shared.len()
    );

    Ok(())
}
