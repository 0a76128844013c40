use crate::effect::Effect;
use crate::error::ConfigError;
use crate::particle::{
    Color, Cosmetics, Particle, ParticleBuilder, ParticleKind, ParticleRef, Polarity,
};
use crate::vec2::Vec2;
use crate::world::World;
use std::sync::Arc;

pub const GRAVITY_RANGE: f64 = 10.0;
pub const GRAVITY_STRENGTH: f64 = 1.0;

const GHOST_COLOR: Color = Color::rgba(200, 200, 255, 180);

fn register(world: &World, builder: ParticleBuilder) -> Result<ParticleRef, ConfigError> {
    let particle = Arc::new(builder.build()?);
    world.add_particle(Arc::clone(&particle));
    Ok(particle)
}

fn builder(kind: ParticleKind, position: Vec2, velocity: Vec2) -> ParticleBuilder {
    Particle::builder(kind, position.x, position.y).velocity(velocity)
}

pub fn basic(
    world: &World,
    position: Vec2,
    velocity: Vec2,
) -> Result<ParticleRef, ConfigError> {
    register(world, builder(ParticleKind::Basic, position, velocity))
}

pub fn gravity(
    world: &World,
    position: Vec2,
    velocity: Vec2,
) -> Result<ParticleRef, ConfigError> {
    register(
        world,
        builder(ParticleKind::Gravity, position, velocity)
            .effect(Effect::gravity(GRAVITY_RANGE, GRAVITY_STRENGTH)),
    )
}

pub fn anti_gravity(
    world: &World,
    position: Vec2,
    velocity: Vec2,
) -> Result<ParticleRef, ConfigError> {
    register(
        world,
        builder(ParticleKind::AntiGravity, position, velocity)
            .effect(Effect::negative_gravity(GRAVITY_RANGE, GRAVITY_STRENGTH)),
    )
}

pub fn magnetic(
    world: &World,
    position: Vec2,
    velocity: Vec2,
    range: f64,
    strength: f64,
    polarity: Polarity,
) -> Result<ParticleRef, ConfigError> {
    let color = match polarity {
        Polarity::Positive => Color::BLUE,
        Polarity::Negative => Color::RED,
    };
    register(
        world,
        builder(ParticleKind::Magnetic, position, velocity)
            .polarity(polarity)
            .cosmetics(Cosmetics::new(color))
            .effect(Effect::magnetic(range, strength)),
    )
}

pub fn ghost(
    world: &World,
    position: Vec2,
    velocity: Vec2,
) -> Result<ParticleRef, ConfigError> {
    register(
        world,
        builder(ParticleKind::Ghost, position, velocity)
            .collidable(false)
            .cosmetics(Cosmetics::new(GHOST_COLOR)),
    )
}

pub fn exploding(
    world: &World,
    position: Vec2,
    velocity: Vec2,
    radius: f64,
) -> Result<ParticleRef, ConfigError> {
    if !(radius.is_finite() && radius >= 0.0) {
        return Err(ConfigError::Radius(radius));
    }
    register(
        world,
        builder(ParticleKind::Exploding, position, velocity).effect(Effect::explode(radius)),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effect::EffectKind;
    use crate::executor::InlineExecutor;
    use crate::params::WorldParams;

    fn world() -> World {
        World::with_executor(WorldParams::default(), InlineExecutor).unwrap()
    }

    #[test]
    fn factories_register_with_the_world() {
        let world = world();
        let at = Vec2::new(10.0, 10.0);
        let still = Vec2::zero();
        let made = [
            basic(&world, at, still).unwrap(),
            gravity(&world, at, still).unwrap(),
            anti_gravity(&world, at, still).unwrap(),
            magnetic(&world, at, still, 10.0, 1.0, Polarity::Positive).unwrap(),
            ghost(&world, at, still).unwrap(),
            exploding(&world, at, still, 5.0).unwrap(),
        ];
        assert_eq!(world.particle_count(), made.len());
        assert!(made.iter().all(|p| world.contains(p.id())));
        assert_eq!(world.particles_near(10.0, 10.0, 0.1).len(), made.len());
    }

    #[test]
    fn kinds_carry_their_effects() {
        let world = world();
        let at = Vec2::new(1.0, 1.0);
        let g = gravity(&world, at, Vec2::zero()).unwrap();
        assert_eq!(
            g.effects()[0].kind(),
            EffectKind::Gravity {
                range: GRAVITY_RANGE,
                strength: GRAVITY_STRENGTH
            }
        );
        let a = anti_gravity(&world, at, Vec2::zero()).unwrap();
        assert_eq!(a.effects()[0].kind().label(), "negative-gravity");
        let e = exploding(&world, at, Vec2::zero(), 3.0).unwrap();
        assert_eq!(e.effects()[0].kind(), EffectKind::Explode { radius: 3.0 });
        assert!(basic(&world, at, Vec2::zero()).unwrap().effects().is_empty());
    }

    #[test]
    fn cosmetic_defaults() {
        let world = world();
        let at = Vec2::new(1.0, 1.0);
        let plus = magnetic(&world, at, Vec2::zero(), 5.0, 1.0, Polarity::Positive).unwrap();
        let minus = magnetic(&world, at, Vec2::zero(), 5.0, 1.0, Polarity::Negative).unwrap();
        assert_eq!(plus.cosmetics().color, Color::BLUE);
        assert_eq!(minus.cosmetics().color, Color::RED);
        assert_eq!(minus.polarity(), Some(Polarity::Negative));

        let g = ghost(&world, at, Vec2::zero()).unwrap();
        assert!(!g.is_collidable());
        assert_eq!(g.cosmetics().color.a, 180);
        assert_eq!(g.cosmetics().trail_color, Color::CYAN);
        assert_eq!(basic(&world, at, Vec2::zero()).unwrap().cosmetics().color, Color::WHITE);
    }

    #[test]
    fn invalid_input_is_not_registered() {
        let world = world();
        let err = basic(&world, Vec2::new(f64::INFINITY, 0.0), Vec2::zero()).unwrap_err();
        assert!(matches!(err, ConfigError::NonFinite { name: "x", .. }));
        let err = exploding(&world, Vec2::new(1.0, 1.0), Vec2::zero(), -2.0).unwrap_err();
        assert_eq!(err, ConfigError::Radius(-2.0));
        assert_eq!(world.particle_count(), 0);
    }
}
