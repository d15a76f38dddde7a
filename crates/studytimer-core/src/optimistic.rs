//! Optimistic apply / confirm / rollback over a keyed collection.
//!
//! A change is applied to the view immediately and remembered against its
//! key. Once the backing write lands it is confirmed; if the write fails it
//! is rolled back to whatever the key held before the first staged change.

use std::collections::HashMap;
use std::hash::Hash;

#[derive(Debug, Clone)]
pub struct OptimisticCache<K, V> {
    entries: HashMap<K, V>,
    /// Value each pending key held before its first staged change.
    staged: HashMap<K, Option<V>>,
}

impl<K, V> Default for OptimisticCache<K, V> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
            staged: HashMap::new(),
        }
    }
}

impl<K: Eq + Hash + Clone, V: Clone> OptimisticCache<K, V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &K) -> Option<&V> {
        self.entries.get(key)
    }

    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.entries.values()
    }

    /// Show `value` under `key` until confirmed or rolled back.
    pub fn apply(&mut self, key: K, value: V) {
        if !self.staged.contains_key(&key) {
            let previous = self.entries.get(&key).cloned();
            self.staged.insert(key.clone(), previous);
        }
        self.entries.insert(key, value);
    }

    /// Keep the staged change. Returns false if nothing was pending.
    pub fn confirm(&mut self, key: &K) -> bool {
        self.staged.remove(key).is_some()
    }

    /// Keep the change but replace the value with what the store returned.
    pub fn confirm_with(&mut self, key: K, value: V) -> bool {
        let was_pending = self.staged.remove(&key).is_some();
        self.entries.insert(key, value);
        was_pending
    }

    /// Restore the value from before the first staged change.
    pub fn rollback(&mut self, key: &K) -> bool {
        match self.staged.remove(key) {
            Some(Some(previous)) => {
                self.entries.insert(key.clone(), previous);
                true
            }
            Some(None) => {
                self.entries.remove(key);
                true
            }
            None => false,
        }
    }

    /// Apply `value`, run `write`, then confirm with its result or roll back.
    pub fn transact<E>(
        &mut self,
        key: K,
        value: V,
        write: impl FnOnce(&V) -> Result<V, E>,
    ) -> Result<V, E> {
        self.apply(key.clone(), value.clone());
        match write(&value) {
            Ok(stored) => {
                self.confirm_with(key, stored.clone());
                Ok(stored)
            }
            Err(e) => {
                self.rollback(&key);
                Err(e)
            }
        }
    }
}

impl<K: Eq + Hash + Clone, V: Clone> FromIterator<(K, V)> for OptimisticCache<K, V> {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
            staged: HashMap::new(),
        }
    }
}
