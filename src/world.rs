use crate::collision;
use crate::effect::{EffectContext, EffectId, EffectRef};
use crate::error::Error;
use crate::executor::{ParallelExecutor, WorkerPool};
use crate::grid::SpatialGrid;
use crate::modifiers::EffectModifierIndex;
use crate::params::WorldParams;
use crate::particle::{ParticleId, ParticleRef, ParticleSnapshot};
use crate::vec2::Vec2;
use parking_lot::{Mutex, RwLock};
use std::collections::BTreeMap;

pub(crate) enum Deferred {
    Remove(ParticleId),
    Spawn(ParticleRef),
}

#[derive(Default)]
pub(crate) struct DeferredQueue(Mutex<Vec<Deferred>>);

impl DeferredQueue {
    pub(crate) fn push(&self, item: Deferred) {
        self.0.lock().push(item);
    }

    pub(crate) fn take(&self) -> Vec<Deferred> {
        std::mem::take(&mut *self.0.lock())
    }
}

pub struct World {
    params: WorldParams,
    grid: SpatialGrid,
    particles: RwLock<BTreeMap<ParticleId, ParticleRef>>,
    global_effects: RwLock<Vec<EffectRef>>,
    modifiers: EffectModifierIndex,
    deferred: DeferredQueue,
    executor: Box<dyn ParallelExecutor>,
    /// Serialises `update` and `clear`.
    ticks: Mutex<u64>,
}

impl World {
    pub fn new(params: WorldParams) -> Result<Self, Error> {
        params.validate()?;
        let pool = WorkerPool::new(params.worker_count())?;
        Self::with_executor(params, pool)
    }

    pub fn with_executor(
        params: WorldParams,
        executor: impl ParallelExecutor + 'static,
    ) -> Result<Self, Error> {
        params.validate()?;
        let grid = SpatialGrid::new(params.cell_size)?;
        log::info!(
            "world {}x{} (cell {}, {} substeps, {} workers)",
            params.width,
            params.height,
            params.cell_size,
            params.substeps,
            executor.workers()
        );
        Ok(Self {
            params,
            grid,
            particles: RwLock::new(BTreeMap::new()),
            global_effects: RwLock::new(Vec::new()),
            modifiers: EffectModifierIndex::new(),
            deferred: DeferredQueue::default(),
            executor: Box::new(executor),
            ticks: Mutex::new(0),
        })
    }

    pub fn params(&self) -> &WorldParams {
        &self.params
    }

    pub fn dimensions(&self) -> (f64, f64) {
        (self.params.width, self.params.height)
    }

    pub fn grid(&self) -> &SpatialGrid {
        &self.grid
    }

    pub fn effect_modifiers(&self) -> &EffectModifierIndex {
        &self.modifiers
    }

    pub fn ticks(&self) -> u64 {
        *self.ticks.lock()
    }

    pub fn update(&self, dt: f64) {
        if !(dt.is_finite() && dt > 0.0) {
            log::debug!("ignoring update with dt = {dt}");
            return;
        }
        let mut ticks = self.ticks.lock();
        let step = dt / self.params.substeps as f64;
        for _ in 0..self.params.substeps {
            self.substep(step);
        }
        *ticks += 1;
        log::trace!("tick {} done, {} particles", *ticks, self.particle_count());
    }

    fn substep(&self, dt: f64) {
        let snapshot = self.members();
        let globals = self.global_effects();
        let ctx = EffectContext::new(&self.grid, &self.params, &self.deferred, dt);
        let max_radius = snapshot
            .iter()
            .filter(|p| p.is_collidable())
            .map(|p| p.radius())
            .fold(0.0, f64::max);

        self.for_each(&snapshot, |p| p.clear_forces());
        self.for_each(&snapshot, |p| self.apply_effects(p, &globals, &ctx));
        self.for_each(&snapshot, |p| self.collide(p, max_radius, dt));
        self.for_each(&snapshot, |p| self.integrate(p, dt));
        self.drain_deferred();
    }

    fn for_each(&self, particles: &[ParticleRef], f: impl Fn(&ParticleRef) + Sync) {
        self.executor
            .run_partitioned(particles.len(), &|range| particles[range].iter().for_each(&f));
    }

    fn apply_effects(
        &self,
        particle: &ParticleRef,
        globals: &[EffectRef],
        ctx: &EffectContext<'_>,
    ) {
        if particle.is_deleted() {
            return;
        }
        let check_exemptions = !self.modifiers.is_empty();
        for effect in globals {
            if check_exemptions
                && self
                    .modifiers
                    .has(particle.id(), &effect.kind().exemption())
            {
                continue;
            }
            effect.apply(particle, ctx);
        }
        for effect in particle.effects() {
            effect.apply(particle, ctx);
        }
    }

    fn collide(&self, particle: &ParticleRef, max_radius: f64, dt: f64) {
        if particle.is_deleted() || !particle.is_collidable() {
            return;
        }
        let pos = particle.position();
        let envelope =
            particle.radius() * self.params.envelope_factor + particle.velocity().length() * dt;
        let reach = envelope.max(particle.radius() + max_radius);
        for other in self.grid.query_radius(pos.x, pos.y, reach) {
            if other.id() <= particle.id() || !other.is_collidable() || other.is_deleted() {
                continue;
            }
            collision::resolve(particle, &other, &self.params);
        }
    }

    fn integrate(&self, particle: &ParticleRef, dt: f64) {
        let mut motion = particle.lock_motion();
        if particle.is_deleted() {
            return;
        }
        let old = motion.advance(particle.forces(), dt);
        let m = &mut *motion;
        apply_bounds(
            &mut m.position,
            &mut m.velocity,
            self.params.width,
            self.params.height,
            self.params.boundary_restitution,
        );
        self.grid.relocate_to(particle, old, m.position);
    }

    fn drain_deferred(&self) {
        let mut pending = self.deferred.take();
        pending.extend(
            self.particles
                .read()
                .values()
                .filter(|p| p.is_deleted())
                .map(|p| Deferred::Remove(p.id())),
        );
        if pending.is_empty() {
            return;
        }
        let (mut removed, mut spawned) = (0usize, 0usize);
        for item in pending {
            match item {
                Deferred::Remove(id) => removed += usize::from(self.remove_particle(id)),
                Deferred::Spawn(particle) => spawned += usize::from(self.add_particle(particle)),
            }
        }
        log::debug!("deferred changes applied: {removed} removed, {spawned} spawned");
    }

    fn members(&self) -> Vec<ParticleRef> {
        self.particles.read().values().cloned().collect()
    }

    pub fn particles(&self) -> Vec<ParticleRef> {
        self.particles
            .read()
            .values()
            .filter(|p| !p.is_deleted())
            .cloned()
            .collect()
    }

    pub fn snapshot(&self) -> Vec<ParticleSnapshot> {
        self.particles().iter().map(|p| p.snapshot()).collect()
    }

    pub fn particle_count(&self) -> usize {
        self.particles
            .read()
            .values()
            .filter(|p| !p.is_deleted())
            .count()
    }

    pub fn particle(&self, id: ParticleId) -> Option<ParticleRef> {
        self.particles
            .read()
            .get(&id)
            .filter(|p| !p.is_deleted())
            .cloned()
    }

    pub fn contains(&self, id: ParticleId) -> bool {
        self.particle(id).is_some()
    }

    pub fn add_particle(&self, particle: ParticleRef) -> bool {
        if particle.is_deleted() {
            return false;
        }
        let mut particles = self.particles.write();
        if particles.contains_key(&particle.id()) {
            return false;
        }
        self.grid.insert(&particle);
        particles.insert(particle.id(), particle);
        true
    }

    pub fn remove_particle(&self, id: ParticleId) -> bool {
        let mut particles = self.particles.write();
        let Some(particle) = particles.remove(&id) else {
            return false;
        };
        let pos = particle.retire();
        self.grid.remove_at(&particle, pos);
        self.modifiers.clear_particle(id);
        true
    }

    /// Removes every particle. Global effects stay registered. Waits for a
    /// running `update` to finish.
    pub fn clear(&self) {
        let _ticks = self.ticks.lock();
        let mut particles = self.particles.write();
        for particle in particles.values() {
            particle.retire();
        }
        particles.clear();
        self.grid.clear();
        self.modifiers.clear();
        drop(self.deferred.take());
    }

    pub fn particles_near(&self, x: f64, y: f64, radius: f64) -> Vec<ParticleRef> {
        let mut found = self.grid.query_radius(x, y, radius);
        found.retain(|p| !p.is_deleted());
        found
    }

    pub fn add_global_effect(&self, effect: EffectRef) -> bool {
        let mut effects = self.global_effects.write();
        if effects.iter().any(|e| e.id() == effect.id()) {
            return false;
        }
        effects.push(effect);
        true
    }

    pub fn remove_global_effect(&self, id: EffectId) -> bool {
        let mut effects = self.global_effects.write();
        let before = effects.len();
        effects.retain(|e| e.id() != id);
        effects.len() != before
    }

    pub fn global_effects(&self) -> Vec<EffectRef> {
        self.global_effects.read().clone()
    }

    pub fn clear_global_effects(&self) {
        self.global_effects.write().clear();
    }
}

impl std::fmt::Debug for World {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("World")
            .field("params", &self.params)
            .field("particles", &self.particle_count())
            .field("global_effects", &self.global_effects.read().len())
            .finish()
    }
}

fn apply_bounds(pos: &mut Vec2, vel: &mut Vec2, width: f64, height: f64, bounce: f64) {
    if pos.x < 0.0 {
        pos.x = 0.0;
        if vel.x < 0.0 {
            vel.x = -vel.x * bounce;
        }
    } else if pos.x > width {
        pos.x = width;
        if vel.x > 0.0 {
            vel.x = -vel.x * bounce;
        }
    }
    if pos.y < 0.0 {
        pos.y = 0.0;
        if vel.y < 0.0 {
            vel.y = -vel.y * bounce;
        }
    } else if pos.y > height {
        pos.y = height;
        if vel.y > 0.0 {
            vel.y = -vel.y * bounce;
        }
    }
}
