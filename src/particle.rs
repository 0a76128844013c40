use crate::effect::{EffectId, EffectRef};
use crate::error::ConfigError;
use crate::vec2::Vec2;
use parking_lot::{Mutex, MutexGuard, RwLock};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

static NEXT_PARTICLE_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ParticleId(u64);

impl ParticleId {
    fn next() -> Self {
        Self(NEXT_PARTICLE_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ParticleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

pub type ParticleRef = Arc<Particle>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ParticleKind {
    Basic,
    Gravity,
    AntiGravity,
    Magnetic,
    Ghost,
    Exploding,
    Fragment,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Polarity {
    Positive,
    Negative,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const WHITE: Self = Self::rgb(255, 255, 255);
    pub const RED: Self = Self::rgb(255, 0, 0);
    pub const BLUE: Self = Self::rgb(0, 0, 255);
    pub const CYAN: Self = Self::rgb(0, 255, 255);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Cosmetics {
    pub color: Color,
    pub trail_color: Color,
}

impl Cosmetics {
    pub const fn new(color: Color) -> Self {
        Self {
            color,
            trail_color: Color::CYAN,
        }
    }
}

impl Default for Cosmetics {
    fn default() -> Self {
        Self::new(Color::WHITE)
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct Motion {
    pub position: Vec2,
    pub velocity: Vec2,
}

impl Motion {
    pub(crate) fn advance(&mut self, forces: Vec2, dt: f64) -> Vec2 {
        let old = self.position;
        self.position = old + (self.velocity + forces) * dt;
        old
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ParticleSnapshot {
    pub id: ParticleId,
    pub kind: ParticleKind,
    pub position: Vec2,
    pub velocity: Vec2,
    pub radius: f64,
    pub mass: f64,
    pub cosmetics: Cosmetics,
}

pub struct Particle {
    id: ParticleId,
    kind: ParticleKind,
    mass: f64,
    radius: f64,
    restitution: f64,
    friction: f64,
    collidable: bool,
    polarity: Option<Polarity>,
    cosmetics: Cosmetics,
    motion: Mutex<Motion>,
    forces: Mutex<Vec2>,
    effects: RwLock<Vec<EffectRef>>,
    deleted: AtomicBool,
}

impl Particle {
    pub fn builder(kind: ParticleKind, x: f64, y: f64) -> ParticleBuilder {
        ParticleBuilder::new(kind, Vec2::new(x, y))
    }

    pub fn id(&self) -> ParticleId {
        self.id
    }

    pub fn kind(&self) -> ParticleKind {
        self.kind
    }

    pub fn mass(&self) -> f64 {
        self.mass
    }

    pub fn radius(&self) -> f64 {
        self.radius
    }

    pub fn restitution(&self) -> f64 {
        self.restitution
    }

    pub fn friction(&self) -> f64 {
        self.friction
    }

    pub fn polarity(&self) -> Option<Polarity> {
        self.polarity
    }

    pub fn cosmetics(&self) -> Cosmetics {
        self.cosmetics
    }

    pub fn is_collidable(&self) -> bool {
        self.collidable
    }

    pub fn position(&self) -> Vec2 {
        self.motion.lock().position
    }

    pub fn base_velocity(&self) -> Vec2 {
        self.motion.lock().velocity
    }

    pub fn velocity(&self) -> Vec2 {
        let base = self.motion.lock().velocity;
        base + self.forces()
    }

    pub fn forces(&self) -> Vec2 {
        *self.forces.lock()
    }

    pub fn add_force(&self, force: Vec2) {
        if self.is_deleted() || !force.is_finite() {
            return;
        }
        *self.forces.lock() += force;
    }

    pub fn clear_forces(&self) {
        *self.forces.lock() = Vec2::zero();
    }

    pub fn set_velocity(&self, dx: f64, dy: f64) {
        self.motion.lock().velocity = Vec2::new(dx, dy);
    }

    pub fn set_position(&self, x: f64, y: f64) {
        self.motion.lock().position = Vec2::new(x, y);
    }

    pub fn integrate(&self, dt: f64) -> Vec2 {
        let mut motion = self.motion.lock();
        let forces = self.forces();
        motion.advance(forces, dt)
    }

    pub fn snapshot(&self) -> ParticleSnapshot {
        let motion = *self.motion.lock();
        ParticleSnapshot {
            id: self.id,
            kind: self.kind,
            position: motion.position,
            velocity: motion.velocity + self.forces(),
            radius: self.radius,
            mass: self.mass,
            cosmetics: self.cosmetics,
        }
    }

    pub fn effects(&self) -> Vec<EffectRef> {
        self.effects.read().clone()
    }

    pub fn attach(&self, effect: EffectRef) {
        let mut effects = self.effects.write();
        if !effects.iter().any(|e| e.id() == effect.id()) {
            effects.push(effect);
        }
    }

    pub fn detach(&self, id: EffectId) -> bool {
        let mut effects = self.effects.write();
        let before = effects.len();
        effects.retain(|e| e.id() != id);
        effects.len() != before
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted.load(Ordering::Acquire)
    }

    /// Tombstones the particle; the owning world drops it from its set and
    /// grid at the end of the next substep. Idempotent.
    pub fn delete(&self) -> bool {
        let _motion = self.motion.lock();
        self.mark_deleted()
    }

    pub(crate) fn mark_deleted(&self) -> bool {
        !self.deleted.swap(true, Ordering::AcqRel)
    }

    pub(crate) fn lock_motion(&self) -> MutexGuard<'_, Motion> {
        self.motion.lock()
    }

    // Under the motion lock: a concurrent integration either finishes its
    // re-index first or sees the tombstone.
    pub(crate) fn retire(&self) -> Vec2 {
        let motion = self.motion.lock();
        self.mark_deleted();
        motion.position
    }
}

impl fmt::Debug for Particle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Particle")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("position", &self.position())
            .field("deleted", &self.is_deleted())
            .finish()
    }
}

/// Locks both particles' motion in id order.
pub(crate) fn lock_pair<'a>(
    a: &'a Particle,
    b: &'a Particle,
) -> (MutexGuard<'a, Motion>, MutexGuard<'a, Motion>) {
    debug_assert_ne!(a.id, b.id);
    if a.id < b.id {
        let ga = a.motion.lock();
        let gb = b.motion.lock();
        (ga, gb)
    } else {
        let gb = b.motion.lock();
        let ga = a.motion.lock();
        (ga, gb)
    }
}

#[derive(Clone, Debug)]
pub struct ParticleBuilder {
    kind: ParticleKind,
    position: Vec2,
    velocity: Vec2,
    mass: f64,
    radius: f64,
    restitution: f64,
    friction: f64,
    collidable: bool,
    polarity: Option<Polarity>,
    cosmetics: Cosmetics,
    effects: Vec<EffectRef>,
}

impl ParticleBuilder {
    pub fn new(kind: ParticleKind, position: Vec2) -> Self {
        Self {
            kind,
            position,
            velocity: Vec2::zero(),
            mass: 1.0,
            radius: 0.5,
            restitution: 0.8,
            friction: 0.1,
            collidable: kind != ParticleKind::Ghost,
            polarity: None,
            cosmetics: Cosmetics::default(),
            effects: Vec::new(),
        }
    }

    pub fn velocity(mut self, velocity: Vec2) -> Self {
        self.velocity = velocity;
        self
    }

    pub fn mass(mut self, mass: f64) -> Self {
        self.mass = mass;
        self
    }

    pub fn radius(mut self, radius: f64) -> Self {
        self.radius = radius;
        self
    }

    pub fn restitution(mut self, restitution: f64) -> Self {
        self.restitution = restitution;
        self
    }

    pub fn friction(mut self, friction: f64) -> Self {
        self.friction = friction;
        self
    }

    pub fn collidable(mut self, collidable: bool) -> Self {
        self.collidable = collidable;
        self
    }

    pub fn polarity(mut self, polarity: Polarity) -> Self {
        self.polarity = Some(polarity);
        self
    }

    pub fn cosmetics(mut self, cosmetics: Cosmetics) -> Self {
        self.cosmetics = cosmetics;
        self
    }

    pub fn effect(mut self, effect: EffectRef) -> Self {
        self.effects.push(effect);
        self
    }

    pub fn build(self) -> Result<Particle, ConfigError> {
        if !(self.mass.is_finite() && self.mass > 0.0) {
            return Err(ConfigError::Mass(self.mass));
        }
        if !(self.radius.is_finite() && self.radius >= 0.0) {
            return Err(ConfigError::Radius(self.radius));
        }
        if !(0.0..=1.0).contains(&self.restitution) {
            return Err(ConfigError::Restitution(self.restitution));
        }
        if !(self.friction.is_finite() && self.friction >= 0.0) {
            return Err(ConfigError::Friction(self.friction));
        }
        for (name, value) in [
            ("x", self.position.x),
            ("y", self.position.y),
            ("dx", self.velocity.x),
            ("dy", self.velocity.y),
        ] {
            if !value.is_finite() {
                return Err(ConfigError::NonFinite { name, value });
            }
        }
        Ok(Particle {
            id: ParticleId::next(),
            kind: self.kind,
            mass: self.mass,
            radius: self.radius,
            restitution: self.restitution,
            friction: self.friction,
            collidable: self.collidable,
            polarity: self.polarity,
            cosmetics: self.cosmetics,
            motion: Mutex::new(Motion {
                position: self.position,
                velocity: self.velocity,
            }),
            forces: Mutex::new(Vec2::zero()),
            effects: RwLock::new(self.effects),
            deleted: AtomicBool::new(false),
        })
    }
}
