use crate::grid::SpatialGrid;
use crate::params::WorldParams;
use crate::particle::{Particle, ParticleKind};
use crate::vec2::Vec2;
use crate::world::{Deferred, DeferredQueue};
use parking_lot::RwLock;
use rand::Rng;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

pub const MIN_DISTANCE: f64 = 1.0e-3;

static NEXT_EFFECT_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EffectId(u64);

pub type EffectRef = Arc<Effect>;

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum EffectKind {
    Gravity { range: f64, strength: f64 },
    NegativeGravity { range: f64, strength: f64 },
    Magnetic { range: f64, strength: f64 },
    Ground { strength: f64 },
    /// `strength > 0` attracts toward the source, `< 0` repels.
    MousePoint {
        range: f64,
        strength: f64,
        source: Option<Vec2>,
    },
    Explode { radius: f64 },
}

impl EffectKind {
    pub fn label(&self) -> &'static str {
        match self {
            EffectKind::Gravity { .. } => "gravity",
            EffectKind::NegativeGravity { .. } => "negative-gravity",
            EffectKind::Magnetic { .. } => "magnetic",
            EffectKind::Ground { .. } => "ground",
            EffectKind::MousePoint { .. } => "mouse-point",
            EffectKind::Explode { .. } => "explode",
        }
    }

    pub fn exemption(&self) -> String {
        format!("exempt:{}", self.label())
    }
}

pub struct Effect {
    id: EffectId,
    enabled: AtomicBool,
    kind: RwLock<EffectKind>,
}

pub struct EffectContext<'a> {
    grid: &'a SpatialGrid,
    params: &'a WorldParams,
    deferred: &'a DeferredQueue,
    dt: f64,
}

impl<'a> EffectContext<'a> {
    pub(crate) fn new(
        grid: &'a SpatialGrid,
        params: &'a WorldParams,
        deferred: &'a DeferredQueue,
        dt: f64,
    ) -> Self {
        Self {
            grid,
            params,
            deferred,
            dt,
        }
    }

    pub fn dt(&self) -> f64 {
        self.dt
    }
}

impl Effect {
    pub fn new(kind: EffectKind) -> Self {
        let kind = match kind {
            EffectKind::NegativeGravity { range, strength } => EffectKind::NegativeGravity {
                range,
                strength: strength.abs(),
            },
            other => other,
        };
        Self {
            id: EffectId(NEXT_EFFECT_ID.fetch_add(1, Ordering::Relaxed)),
            enabled: AtomicBool::new(true),
            kind: RwLock::new(kind),
        }
    }

    pub fn gravity(range: f64, strength: f64) -> EffectRef {
        Arc::new(Self::new(EffectKind::Gravity { range, strength }))
    }

    pub fn negative_gravity(range: f64, strength: f64) -> EffectRef {
        Arc::new(Self::new(EffectKind::NegativeGravity { range, strength }))
    }

    pub fn magnetic(range: f64, strength: f64) -> EffectRef {
        Arc::new(Self::new(EffectKind::Magnetic { range, strength }))
    }

    pub fn ground(strength: f64) -> EffectRef {
        Arc::new(Self::new(EffectKind::Ground { strength }))
    }

    pub fn mouse_point(range: f64, strength: f64) -> EffectRef {
        Arc::new(Self::new(EffectKind::MousePoint {
            range,
            strength,
            source: None,
        }))
    }

    pub fn explode(radius: f64) -> EffectRef {
        Arc::new(Self::new(EffectKind::Explode { radius }))
    }

    pub fn id(&self) -> EffectId {
        self.id
    }

    pub fn kind(&self) -> EffectKind {
        *self.kind.read()
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    pub fn set_range(&self, value: f64) {
        match &mut *self.kind.write() {
            EffectKind::Gravity { range, .. }
            | EffectKind::NegativeGravity { range, .. }
            | EffectKind::Magnetic { range, .. }
            | EffectKind::MousePoint { range, .. } => *range = value,
            EffectKind::Explode { radius } => *radius = value,
            EffectKind::Ground { .. } => {}
        }
    }

    pub fn set_strength(&self, value: f64) {
        match &mut *self.kind.write() {
            EffectKind::NegativeGravity { strength, .. } => *strength = value.abs(),
            EffectKind::Gravity { strength, .. }
            | EffectKind::Magnetic { strength, .. }
            | EffectKind::Ground { strength }
            | EffectKind::MousePoint { strength, .. } => *strength = value,
            EffectKind::Explode { .. } => {}
        }
    }

    pub fn set_source(&self, x: f64, y: f64) {
        if let EffectKind::MousePoint { source, .. } = &mut *self.kind.write() {
            *source = Some(Vec2::new(x, y));
        }
    }

    pub fn clear_source(&self) {
        if let EffectKind::MousePoint { source, .. } = &mut *self.kind.write() {
            *source = None;
        }
    }

    pub fn apply(&self, owner: &Particle, ctx: &EffectContext<'_>) {
        if !self.is_enabled() || owner.is_deleted() {
            return;
        }
        match self.kind() {
            EffectKind::Gravity { range, strength } => {
                push_neighbors(owner, ctx, range, |_, d| Some(-strength / d));
            }
            EffectKind::NegativeGravity { range, strength } => {
                push_neighbors(owner, ctx, range, |_, d| Some(strength / d));
            }
            EffectKind::Magnetic { range, strength } => {
                let Some(polarity) = owner.polarity() else {
                    return;
                };
                push_neighbors(owner, ctx, range, |target, d| {
                    let other = target.polarity()?;
                    if other == polarity {
                        Some(strength / d)
                    } else {
                        Some(-strength / d)
                    }
                });
            }
            EffectKind::Ground { strength } => {
                owner.add_force(Vec2::new(0.0, strength));
            }
            EffectKind::MousePoint {
                range,
                strength,
                source,
            } => {
                let Some(source) = source else {
                    return;
                };
                let delta = source - owner.position();
                let dist_sq = delta.length_sq();
                if dist_sq > range * range || dist_sq < MIN_DISTANCE * MIN_DISTANCE {
                    return;
                }
                let dist = dist_sq.sqrt();
                owner.add_force(delta * (strength / (dist * dist)));
            }
            EffectKind::Explode { radius } => explode(owner, ctx, radius),
        }
    }
}

impl fmt::Debug for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Effect")
            .field("id", &self.id)
            .field("enabled", &self.is_enabled())
            .field("kind", &self.kind())
            .finish()
    }
}

/// Positive magnitudes push away from the source.
fn push_neighbors(
    source: &Particle,
    ctx: &EffectContext<'_>,
    range: f64,
    magnitude: impl Fn(&Particle, f64) -> Option<f64>,
) {
    let origin = source.position();
    for target in ctx.grid.query_radius(origin.x, origin.y, range) {
        if target.id() == source.id() || target.is_deleted() {
            continue;
        }
        let delta = target.position() - origin;
        let dist_sq = delta.length_sq();
        if dist_sq < MIN_DISTANCE * MIN_DISTANCE {
            continue;
        }
        let dist = dist_sq.sqrt();
        if let Some(m) = magnitude(target.as_ref(), dist) {
            target.add_force(delta * (m / dist));
        }
    }
}

fn explode(owner: &Particle, ctx: &EffectContext<'_>, radius: f64) {
    let origin = owner.position();
    let crowd = ctx
        .grid
        .query_radius(origin.x, origin.y, radius)
        .iter()
        .filter(|p| !p.is_deleted())
        .count();
    if crowd <= 1 || !owner.mark_deleted() {
        return;
    }
    log::debug!(
        "particle {} exploding at ({:.2}, {:.2}) with {} neighbours",
        owner.id(),
        origin.x,
        origin.y,
        crowd - 1
    );
    ctx.deferred.push(Deferred::Remove(owner.id()));
    let mut rng = rand::thread_rng();
    for _ in 0..ctx.params.fragment_count {
        let direction = Vec2::new(rng.gen_range(-1.0..=1.0), rng.gen_range(-1.0..=1.0));
        let fragment = Particle::builder(ParticleKind::Fragment, origin.x, origin.y)
            .velocity(direction * ctx.params.fragment_speed)
            .mass(owner.mass() / 2.0)
            .radius(owner.radius() / 2.0)
            .restitution(owner.restitution())
            .friction(owner.friction())
            .cosmetics(owner.cosmetics())
            .build();
        match fragment {
            Ok(fragment) => ctx.deferred.push(Deferred::Spawn(Arc::new(fragment))),
            Err(err) => log::warn!("dropping fragment of {}: {err}", owner.id()),
        }
    }
}
