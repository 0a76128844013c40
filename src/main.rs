use anyhow::{Context, Result};
use particle_world::{factory, Effect, Polarity, Vec2, WorkerPool, World, WorldParams};
use rand::Rng;
use std::sync::Arc;
use std::time::Instant;

#[derive(Clone, Copy, Debug)]
struct DemoConfig {
    frames: usize,
    population: usize,
    dt: f64,
    explosion_radius: f64,
    magnet_range: f64,
    magnet_strength: f64,
}

impl DemoConfig {
    fn from_args() -> Result<Self> {
        let mut config = Self {
            frames: 600,
            population: 400,
            dt: 1.0 / 60.0,
            explosion_radius: 2.0,
            magnet_range: 15.0,
            magnet_strength: 2.0,
        };
        let mut args = std::env::args().skip(1);
        if let Some(frames) = args.next() {
            config.frames = frames
                .parse()
                .with_context(|| format!("frame count {frames:?} is not a number"))?;
        }
        if let Some(population) = args.next() {
            config.population = population
                .parse()
                .with_context(|| format!("population {population:?} is not a number"))?;
        }
        Ok(config)
    }
}

fn seed(world: &World, config: DemoConfig) -> Result<()> {
    let (width, height) = world.dimensions();
    let mut rng = rand::thread_rng();
    for i in 0..config.population {
        let pos = Vec2::new(rng.gen_range(0.0..width), rng.gen_range(0.0..height));
        let vel = Vec2::new(rng.gen_range(-5.0..5.0), rng.gen_range(-5.0..5.0));
        match i % 10 {
            0 => factory::gravity(world, pos, vel)?,
            1 => factory::anti_gravity(world, pos, vel)?,
            2 => factory::magnetic(
                world,
                pos,
                vel,
                config.magnet_range,
                config.magnet_strength,
                Polarity::Positive,
            )?,
            3 => factory::magnetic(
                world,
                pos,
                vel,
                config.magnet_range,
                config.magnet_strength,
                Polarity::Negative,
            )?,
            4 => factory::ghost(world, pos, vel)?,
            5 => factory::exploding(world, pos, vel, config.explosion_radius)?,
            _ => factory::basic(world, pos, vel)?,
        };
    }
    Ok(())
}

fn main() -> Result<()> {
    env_logger::init();
    let config = DemoConfig::from_args()?;
    let params = WorldParams::default().with_env_overrides();
    params.validate()?;

    let pool = Arc::new(WorkerPool::new(params.worker_count())?);
    let world = World::with_executor(params, Arc::clone(&pool))?;
    seed(&world, config)?;

    world.add_global_effect(Effect::ground(0.5));
    let mouse = Effect::mouse_point(25.0, 40.0);
    world.add_global_effect(Arc::clone(&mouse));

    let (width, height) = world.dimensions();
    let started = Instant::now();
    for frame in 0..config.frames {
        let angle = frame as f64 * 0.02;
        mouse.set_source(
            width * 0.5 + angle.cos() * width * 0.3,
            height * 0.5 + angle.sin() * height * 0.3,
        );
        world.update(config.dt);
        if frame % 60 == 0 {
            let snapshot = world.snapshot();
            let energy: f64 = snapshot
                .iter()
                .map(|p| 0.5 * p.mass * p.velocity.length_sq())
                .sum();
            log::info!(
                "frame {frame}: {} particles, kinetic energy {energy:.2}",
                snapshot.len()
            );
        }
    }
    let elapsed = started.elapsed();
    log::info!(
        "{} frames in {:.2?} ({:.1} fps), {} particles left",
        config.frames,
        elapsed,
        config.frames as f64 / elapsed.as_secs_f64().max(f64::EPSILON),
        world.particle_count()
    );

    drop(world);
    match Arc::try_unwrap(pool) {
        Ok(pool) => pool.shutdown(),
        Err(_) => eprintln!("worker pool still shared at exit"),
    }
    Ok(())
}
