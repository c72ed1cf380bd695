//! Normalized entity collections.
//!
//! Each collection stores entities by id and keeps an `ids` list ordered by
//! the entity's comparator, so listing is a walk over `ids` and lookups are a
//! hash probe.

use std::cmp::Ordering;
use std::collections::HashMap;

/// An entity that can live in an [`EntityCollection`].
pub trait Entity: Clone {
    fn id(&self) -> &str;

    /// Sort order of the collection's `ids` list.
    fn compare(a: &Self, b: &Self) -> Ordering;
}

/// Id-keyed collection with a comparator-ordered id list.
#[derive(Debug, Clone)]
pub struct EntityCollection<T: Entity> {
    ids: Vec<String>,
    entities: HashMap<String, T>,
}

impl<T: Entity> Default for EntityCollection<T> {
    fn default() -> Self {
        Self {
            ids: Vec::new(),
            entities: HashMap::new(),
        }
    }
}

impl<T: Entity> EntityCollection<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entities.contains_key(id)
    }

    pub fn get(&self, id: &str) -> Option<&T> {
        self.entities.get(id)
    }

    /// Ids in comparator order
    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    /// Entities in comparator order
    pub fn iter(&self) -> impl Iterator<Item = &T> + '_ {
        self.ids.iter().filter_map(move |id| self.entities.get(id))
    }

    pub fn first(&self) -> Option<&T> {
        self.iter().next()
    }

    /// Insert an entity unless one with the same id exists.
    ///
    /// Returns `false` when the id was already taken.
    pub fn add_one(&mut self, entity: T) -> bool {
        if self.contains(entity.id()) {
            return false;
        }
        let id = entity.id().to_string();
        self.entities.insert(id.clone(), entity);
        self.insert_id(id);
        true
    }

    /// Insert or replace an entity.
    pub fn upsert_one(&mut self, entity: T) {
        let id = entity.id().to_string();
        if self.entities.insert(id.clone(), entity).is_some() {
            self.reposition(&id);
        } else {
            self.insert_id(id);
        }
    }

    pub fn upsert_many(&mut self, entities: impl IntoIterator<Item = T>) {
        for entity in entities {
            self.entities.insert(entity.id().to_string(), entity);
        }
        self.resort();
    }

    /// Replace the whole collection.
    pub fn set_all(&mut self, entities: impl IntoIterator<Item = T>) {
        self.entities.clear();
        self.upsert_many(entities);
    }

    /// Apply `f` to the entity with `id`; returns `None` if it does not exist.
    ///
    /// The closure must not change the entity's id.
    pub fn update_one<R>(&mut self, id: &str, f: impl FnOnce(&mut T) -> R) -> Option<R> {
        let result = self.entities.get_mut(id).map(f)?;
        self.reposition(id);
        Some(result)
    }

    pub fn remove_one(&mut self, id: &str) -> Option<T> {
        let removed = self.entities.remove(id);
        if removed.is_some() {
            self.ids.retain(|existing| existing != id);
        }
        removed
    }

    pub fn remove_where(&mut self, mut predicate: impl FnMut(&T) -> bool) -> Vec<T> {
        let doomed: Vec<String> = self
            .iter()
            .filter(|e| predicate(e))
            .map(|e| e.id().to_string())
            .collect();
        doomed.iter().filter_map(|id| self.remove_one(id)).collect()
    }

    fn resort(&mut self) {
        let entities = &self.entities;
        let mut ids: Vec<String> = entities.keys().cloned().collect();
        ids.sort_by(|a, b| {
            T::compare(&entities[a], &entities[b]).then_with(|| a.cmp(b))
        });
        self.ids = ids;
    }

    fn order(&self, a: &str, b: &str) -> Ordering {
        T::compare(&self.entities[a], &self.entities[b]).then_with(|| a.cmp(b))
    }

    /// Binary-insert an id that is not yet in `ids`.
    fn insert_id(&mut self, id: String) {
        let at = self
            .ids
            .partition_point(|other| self.order(other, &id) == Ordering::Less);
        self.ids.insert(at, id);
    }

    /// Move a single changed id to its sorted slot. Nothing moves when its
    /// sort key still fits between its neighbours.
    fn reposition(&mut self, id: &str) {
        let Some(pos) = self.ids.iter().position(|existing| existing == id) else {
            return;
        };
        let fits_before = pos == 0 || self.order(&self.ids[pos - 1], id) != Ordering::Greater;
        let fits_after =
            pos + 1 >= self.ids.len() || self.order(id, &self.ids[pos + 1]) != Ordering::Greater;
        if fits_before && fits_after {
            return;
        }
        let id = self.ids.remove(pos);
        self.insert_id(id);
    }
}
