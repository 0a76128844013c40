use crate::error::ConfigError;
use crate::particle::{Particle, ParticleId, ParticleRef};
use crate::vec2::Vec2;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CellCoord {
    pub x: i64,
    pub y: i64,
}

type Bucket = Arc<Mutex<Vec<ParticleRef>>>;

pub struct SpatialGrid {
    cell_size: f64,
    cells: RwLock<HashMap<CellCoord, Bucket>>,
}

impl SpatialGrid {
    pub fn new(cell_size: f64) -> Result<Self, ConfigError> {
        if !(cell_size.is_finite() && cell_size > 0.0) {
            return Err(ConfigError::CellSize(cell_size));
        }
        Ok(Self {
            cell_size,
            cells: RwLock::new(HashMap::new()),
        })
    }

    pub fn cell_size(&self) -> f64 {
        self.cell_size
    }

    pub fn cell_of(&self, pos: Vec2) -> CellCoord {
        CellCoord {
            x: (pos.x / self.cell_size).floor() as i64,
            y: (pos.y / self.cell_size).floor() as i64,
        }
    }

    pub fn bucket_count(&self) -> usize {
        self.cells.read().len()
    }

    pub fn len(&self) -> usize {
        self.buckets().iter().map(|bucket| bucket.lock().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn insert(&self, particle: &ParticleRef) {
        self.insert_at(particle, particle.position());
    }

    pub fn remove(&self, particle: &Particle) -> bool {
        self.remove_at(particle, particle.position())
    }

    pub fn relocate(&self, particle: &ParticleRef, old: Vec2) -> bool {
        self.relocate_to(particle, old, particle.position())
    }

    pub fn contains(&self, particle: &Particle) -> bool {
        let cell = self.cell_of(particle.position());
        self.bucket(cell)
            .map(|bucket| bucket.lock().iter().any(|p| p.id() == particle.id()))
            .unwrap_or(false)
    }

    pub fn query_radius(&self, x: f64, y: f64, radius: f64) -> Vec<ParticleRef> {
        if !(radius >= 0.0) || !x.is_finite() || !y.is_finite() {
            return Vec::new();
        }
        let center = Vec2::new(x, y);
        let radius_sq = radius * radius;
        let mut out = Vec::new();
        for bucket in self.buckets_near(center, radius) {
            let members = bucket.lock().clone();
            for particle in members {
                if (particle.position() - center).length_sq() <= radius_sq {
                    out.push(particle);
                }
            }
        }
        out
    }

    pub fn clear(&self) {
        self.cells.write().clear();
    }

    pub(crate) fn insert_at(&self, particle: &ParticleRef, pos: Vec2) {
        let bucket = self.bucket_or_insert(self.cell_of(pos));
        let mut members = bucket.lock();
        if !members.iter().any(|p| p.id() == particle.id()) {
            members.push(Arc::clone(particle));
        }
    }

    pub(crate) fn remove_at(&self, particle: &Particle, pos: Vec2) -> bool {
        if self.remove_from(self.cell_of(pos), particle.id()) {
            return true;
        }
        // Position drifted without a relocate; fall back to a full scan.
        for bucket in self.buckets() {
            let mut members = bucket.lock();
            if let Some(idx) = members.iter().position(|p| p.id() == particle.id()) {
                members.swap_remove(idx);
                log::warn!(
                    "particle {} was indexed outside the cell of {:?}",
                    particle.id(),
                    pos
                );
                return true;
            }
        }
        false
    }

    pub(crate) fn relocate_to(&self, particle: &ParticleRef, old: Vec2, new: Vec2) -> bool {
        let from = self.cell_of(old);
        let to = self.cell_of(new);
        if from == to {
            return false;
        }
        // Two separate bucket locks, never nested.
        self.remove_from(from, particle.id());
        self.insert_at(particle, new);
        true
    }

    fn remove_from(&self, cell: CellCoord, id: ParticleId) -> bool {
        let Some(bucket) = self.bucket(cell) else {
            return false;
        };
        let mut members = bucket.lock();
        match members.iter().position(|p| p.id() == id) {
            Some(idx) => {
                members.swap_remove(idx);
                true
            }
            None => false,
        }
    }

    fn bucket(&self, cell: CellCoord) -> Option<Bucket> {
        self.cells.read().get(&cell).cloned()
    }

    fn bucket_or_insert(&self, cell: CellCoord) -> Bucket {
        if let Some(bucket) = self.bucket(cell) {
            return bucket;
        }
        Arc::clone(self.cells.write().entry(cell).or_default())
    }

    fn buckets(&self) -> Vec<Bucket> {
        self.cells.read().values().cloned().collect()
    }

    fn buckets_near(&self, center: Vec2, radius: f64) -> Vec<Bucket> {
        let reach = (radius / self.cell_size).ceil();
        let origin = self.cell_of(center);
        let cells = self.cells.read();
        let window = (2.0 * reach + 1.0) * (2.0 * reach + 1.0);
        if window >= cells.len() as f64 {
            let reach = reach as u64;
            return cells
                .iter()
                .filter(|(cell, _)| {
                    cell.x.abs_diff(origin.x) <= reach && cell.y.abs_diff(origin.y) <= reach
                })
                .map(|(_, bucket)| Arc::clone(bucket))
                .collect();
        }
        let reach = reach as i64;
        let mut out = Vec::new();
        for dy in -reach..=reach {
            for dx in -reach..=reach {
                let (Some(x), Some(y)) = (origin.x.checked_add(dx), origin.y.checked_add(dy))
                else {
                    continue;
                };
                if let Some(bucket) = cells.get(&CellCoord { x, y }) {
                    out.push(Arc::clone(bucket));
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::particle::ParticleKind;
    use rayon::prelude::*;

    fn particle(x: f64, y: f64) -> ParticleRef {
        Arc::new(
            Particle::builder(ParticleKind::Basic, x, y)
                .build()
                .unwrap(),
        )
    }

    fn ids(found: &[ParticleRef]) -> Vec<ParticleId> {
        let mut ids: Vec<_> = found.iter().map(|p| p.id()).collect();
        ids.sort();
        ids
    }

    #[test]
    fn rejects_non_positive_cell_size() {
        assert!(matches!(SpatialGrid::new(0.0), Err(ConfigError::CellSize(_))));
        assert!(matches!(SpatialGrid::new(-1.0), Err(ConfigError::CellSize(_))));
        assert!(matches!(SpatialGrid::new(f64::NAN), Err(ConfigError::CellSize(_))));
    }

    #[test]
    fn insert_then_query_finds_particle() {
        let grid = SpatialGrid::new(10.0).unwrap();
        let p = particle(15.0, 25.0);
        grid.insert(&p);
        let found = grid.query_radius(15.0, 25.0, 1.0);
        assert_eq!(found.len(), 1);
        assert!(Arc::ptr_eq(&found[0], &p));
        assert!(grid.contains(&p));
    }

    #[test]
    fn insert_is_idempotent() {
        let grid = SpatialGrid::new(10.0).unwrap();
        let p = particle(3.0, 3.0);
        grid.insert(&p);
        grid.insert(&p);
        assert_eq!(grid.len(), 1);
    }

    #[test]
    fn remove_makes_particle_unreachable() {
        let grid = SpatialGrid::new(10.0).unwrap();
        let p = particle(15.0, 25.0);
        grid.insert(&p);
        assert!(grid.remove(&p));
        assert!(!grid.remove(&p));
        assert!(grid.query_radius(15.0, 25.0, 1.0).is_empty());
    }

    #[test]
    fn remove_finds_particle_that_moved_without_relocate() {
        let grid = SpatialGrid::new(10.0).unwrap();
        let p = particle(5.0, 5.0);
        grid.insert(&p);
        p.set_position(55.0, 55.0);
        assert!(grid.remove(&p));
        assert!(grid.is_empty());
    }

    #[test]
    fn relocate_moves_between_buckets() {
        let grid = SpatialGrid::new(10.0).unwrap();
        let p = particle(15.0, 25.0);
        grid.insert(&p);
        p.set_position(35.0, 45.0);
        assert!(grid.relocate(&p, Vec2::new(15.0, 25.0)));
        assert!(grid.query_radius(15.0, 25.0, 1.0).is_empty());
        let found = grid.query_radius(35.0, 45.0, 1.0);
        assert_eq!(found.len(), 1);
        assert!(Arc::ptr_eq(&found[0], &p));
    }

    #[test]
    fn relocate_within_cell_is_noop_every_time() {
        let grid = SpatialGrid::new(10.0).unwrap();
        let p = particle(11.0, 11.0);
        grid.insert(&p);
        p.set_position(12.0, 13.0);
        let old = Vec2::new(11.0, 11.0);
        assert!(!grid.relocate(&p, old));
        assert!(!grid.relocate(&p, old));
        assert_eq!(grid.len(), 1);
        assert!(grid.contains(&p));
    }

    #[test]
    fn redundant_relocate_does_not_duplicate() {
        let grid = SpatialGrid::new(10.0).unwrap();
        let p = particle(1.0, 1.0);
        grid.insert(&p);
        p.set_position(21.0, 1.0);
        let old = Vec2::new(1.0, 1.0);
        assert!(grid.relocate(&p, old));
        assert!(grid.relocate(&p, old));
        assert_eq!(grid.len(), 1);
        assert!(grid.contains(&p));
    }

    #[test]
    fn radius_query_filters_by_exact_distance() {
        let grid = SpatialGrid::new(10.0).unwrap();
        let p1 = particle(10.0, 10.0);
        let p2 = particle(15.0, 15.0);
        let p3 = particle(20.0, 20.0);
        let p4 = particle(50.0, 50.0);
        for p in [&p1, &p2, &p3, &p4] {
            grid.insert(p);
        }

        let close = grid.query_radius(10.0, 10.0, 2.0);
        assert_eq!(ids(&close), vec![p1.id()]);

        let medium = grid.query_radius(15.0, 15.0, 10.0);
        assert_eq!(ids(&medium), ids(&[p1.clone(), p2.clone(), p3.clone()]));

        let all = grid.query_radius(25.0, 25.0, 50.0);
        assert_eq!(all.len(), 4);
    }

    #[test]
    fn radius_query_spans_cell_boundaries() {
        let grid = SpatialGrid::new(10.0).unwrap();
        let p1 = particle(9.9, 9.9);
        let p2 = particle(10.1, 10.1);
        grid.insert(&p1);
        grid.insert(&p2);
        let found = grid.query_radius(10.0, 10.0, 0.5);
        assert_eq!(ids(&found), ids(&[p1, p2]));
    }

    #[test]
    fn zero_radius_query_hits_exact_position() {
        let grid = SpatialGrid::new(10.0).unwrap();
        let p = particle(-7.5, 42.25);
        grid.insert(&p);
        assert_eq!(grid.query_radius(-7.5, 42.25, 0.0).len(), 1);
        assert!(grid.query_radius(-7.5, 42.25, -1.0).is_empty());
    }

    #[test]
    fn huge_radius_scans_existing_buckets() {
        let grid = SpatialGrid::new(1.0).unwrap();
        grid.insert(&particle(0.5, 0.5));
        grid.insert(&particle(900.0, -900.0));
        assert_eq!(grid.query_radius(0.0, 0.0, 1.0e6).len(), 2);
    }

    #[test]
    fn far_away_queries_do_not_overflow() {
        let grid = SpatialGrid::new(10.0).unwrap();
        let edge = particle(1.0e300, -1.0e300);
        grid.insert(&particle(5.0, 5.0));
        grid.insert(&edge);
        for crowded in [false, true] {
            if crowded {
                for i in 0..12 {
                    grid.insert(&particle(i as f64 * 10.0 + 1.0, 7.0));
                }
            }
            assert!(grid.query_radius(-1.0e300, 0.0, 1.0).is_empty());
            assert!(grid.query_radius(0.0, 1.0e300, 1.0).is_empty());
            let found = grid.query_radius(1.0e300, -1.0e300, 1.0);
            assert_eq!(ids(&found), vec![edge.id()]);
        }
    }

    #[test]
    fn clear_empties_all_buckets() {
        let grid = SpatialGrid::new(10.0).unwrap();
        for (x, y) in [(10.0, 10.0), (20.0, 20.0), (30.0, 30.0)] {
            grid.insert(&particle(x, y));
        }
        assert_eq!(grid.query_radius(15.0, 15.0, 50.0).len(), 3);
        grid.clear();
        assert!(grid.query_radius(15.0, 15.0, 50.0).is_empty());
        assert_eq!(grid.bucket_count(), 0);
    }

    #[test]
    fn concurrent_inserts_and_relocations_stay_consistent() {
        let grid = SpatialGrid::new(4.0).unwrap();
        let particles: Vec<_> = (0..2000)
            .map(|i| particle((i % 50) as f64, (i / 50) as f64))
            .collect();
        particles.par_iter().for_each(|p| grid.insert(p));
        assert_eq!(grid.len(), particles.len());

        particles.par_iter().for_each(|p| {
            let old = p.position();
            p.set_position(old.x + 7.0, old.y + 3.0);
            grid.relocate(p, old);
        });
        assert_eq!(grid.len(), particles.len());
        assert!(particles.iter().all(|p| grid.contains(p)));
    }
}
