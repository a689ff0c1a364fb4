use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, RwLock};

use stockwatch_core::OwnerId;

/// Owner-isolated key/value store for disposable read models.
pub trait OwnerStore<K, V>: Send + Sync {
    fn get(&self, owner_id: OwnerId, key: &K) -> Option<V>;
    fn upsert(&self, owner_id: OwnerId, key: K, value: V);
    fn list(&self, owner_id: OwnerId) -> Vec<V>;
    /// Drop everything.
    fn clear_all(&self);
}

impl<K, V, S> OwnerStore<K, V> for Arc<S>
where
    S: OwnerStore<K, V> + ?Sized,
{
    fn get(&self, owner_id: OwnerId, key: &K) -> Option<V> {
        (**self).get(owner_id, key)
    }

    fn upsert(&self, owner_id: OwnerId, key: K, value: V) {
        (**self).upsert(owner_id, key, value)
    }

    fn list(&self, owner_id: OwnerId) -> Vec<V> {
        (**self).list(owner_id)
    }

    fn clear_all(&self) {
        (**self).clear_all()
    }
}

#[derive(Debug)]
pub struct InMemoryOwnerStore<K, V> {
    inner: RwLock<HashMap<(OwnerId, K), V>>,
}

impl<K, V> InMemoryOwnerStore<K, V> {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(HashMap::new()),
        }
    }
}

impl<K, V> Default for InMemoryOwnerStore<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> OwnerStore<K, V> for InMemoryOwnerStore<K, V>
where
    K: Clone + Eq + Hash + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn get(&self, owner_id: OwnerId, key: &K) -> Option<V> {
        let map = self.inner.read().ok()?;
        map.get(&(owner_id, key.clone())).cloned()
    }

    fn upsert(&self, owner_id: OwnerId, key: K, value: V) {
        if let Ok(mut map) = self.inner.write() {
            map.insert((owner_id, key), value);
        }
    }

    fn list(&self, owner_id: OwnerId) -> Vec<V> {
        let map = match self.inner.read() {
            Ok(m) => m,
            Err(_) => return vec![],
        };

        map.iter()
            .filter_map(|((o, _k), v)| if *o == owner_id { Some(v.clone()) } else { None })
            .collect()
    }

    fn clear_all(&self) {
        if let Ok(mut map) = self.inner.write() {
            map.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn owners_do_not_see_each_other() {
        let store: InMemoryOwnerStore<u32, &'static str> = InMemoryOwnerStore::new();
        let (a, b) = (OwnerId::new(), OwnerId::new());
        store.upsert(a, 1, "a1");
        store.upsert(b, 1, "b1");

        assert_eq!(store.get(a, &1), Some("a1"));
        assert_eq!(store.list(b), vec!["b1"]);

        store.clear_all();
        assert!(store.list(a).is_empty());
        assert!(store.list(b).is_empty());
    }
}
