mod collision;
mod effect;
mod error;
pub mod executor;
pub mod factory;
mod grid;
mod modifiers;
mod params;
mod particle;
mod vec2;
mod world;

pub use collision::{resolve, Contact};
pub use effect::{Effect, EffectContext, EffectId, EffectKind, EffectRef, MIN_DISTANCE};
pub use error::{ConfigError, Error, Result};
pub use executor::{partition, InlineExecutor, ParallelExecutor, WorkerPool};
pub use grid::{CellCoord, SpatialGrid};
pub use modifiers::EffectModifierIndex;
pub use params::WorldParams;
pub use particle::{
    Color, Cosmetics, Particle, ParticleBuilder, ParticleId, ParticleKind, ParticleRef,
    ParticleSnapshot, Polarity,
};
pub use vec2::Vec2;
pub use world::World;
