use crate::particle::ParticleId;
use parking_lot::RwLock;
use std::collections::{BTreeSet, HashMap};

#[derive(Debug, Default)]
pub struct EffectModifierIndex {
    entries: RwLock<HashMap<ParticleId, BTreeSet<String>>>,
}

impl EffectModifierIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, id: ParticleId, modifier: impl Into<String>) -> bool {
        self.entries
            .write()
            .entry(id)
            .or_default()
            .insert(modifier.into())
    }

    pub fn remove(&self, id: ParticleId, modifier: &str) -> bool {
        let mut entries = self.entries.write();
        let Some(set) = entries.get_mut(&id) else {
            return false;
        };
        let removed = set.remove(modifier);
        if set.is_empty() {
            entries.remove(&id);
        }
        removed
    }

    pub fn has(&self, id: ParticleId, modifier: &str) -> bool {
        self.entries
            .read()
            .get(&id)
            .is_some_and(|set| set.contains(modifier))
    }

    pub fn modifiers(&self, id: ParticleId) -> Vec<String> {
        self.entries
            .read()
            .get(&id)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn clear_particle(&self, id: ParticleId) {
        self.entries.write().remove(&id);
    }

    pub fn clear(&self) {
        self.entries.write().clear();
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::particle::{Particle, ParticleKind};

    fn id() -> ParticleId {
        Particle::builder(ParticleKind::Basic, 0.0, 0.0)
            .build()
            .unwrap()
            .id()
    }

    #[test]
    fn add_has_remove() {
        let index = EffectModifierIndex::new();
        let p = id();
        assert!(index.add(p, "exempt:ground"));
        assert!(!index.add(p, "exempt:ground"));
        assert!(index.has(p, "exempt:ground"));
        assert!(!index.has(p, "exempt:gravity"));
        assert!(index.remove(p, "exempt:ground"));
        assert!(!index.remove(p, "exempt:ground"));
        assert!(index.is_empty());
    }

    #[test]
    fn modifiers_are_sorted_and_per_particle() {
        let index = EffectModifierIndex::new();
        let a = id();
        let b = id();
        index.add(a, "sticky");
        index.add(a, "exempt:magnetic");
        index.add(b, "heavy");
        assert_eq!(index.modifiers(a), vec!["exempt:magnetic", "sticky"]);
        assert_eq!(index.modifiers(b), vec!["heavy"]);
        assert_eq!(index.len(), 2);

        index.clear_particle(a);
        assert!(index.modifiers(a).is_empty());
        assert!(index.has(b, "heavy"));

        index.clear();
        assert!(index.is_empty());
    }
}
