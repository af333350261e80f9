use std::sync::{Arc, Mutex};

use super::Identified;

/// Entities keyed by id, newest first. Writes are last-write-wins per id,
/// so a pushed update racing a refetch can never leave two copies.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityStore<T> {
    items: Vec<T>,
}

pub type SharedStore<T> = Arc<Mutex<EntityStore<T>>>;

impl<T> Default for EntityStore<T> {
    fn default() -> Self {
        Self { items: Vec::new() }
    }
}

impl<T: Identified + Clone> EntityStore<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> SharedStore<T> {
        Arc::new(Mutex::new(Self::new()))
    }

    /// Replaces the entity with the same id in place, or inserts at the head.
    pub fn upsert(&mut self, item: T) {
        match self.position(item.id()) {
            Some(index) => self.items[index] = item,
            None => self.items.insert(0, item),
        }
    }

    /// Puts an entity back at `index` (clamped), replacing any copy.
    pub fn restore(&mut self, index: usize, item: T) {
        self.remove(item.id());
        let index = index.min(self.items.len());
        self.items.insert(index, item);
    }

    pub fn remove(&mut self, id: &str) -> Option<T> {
        self.position(id).map(|index| self.items.remove(index))
    }

    /// Takes a fresh server listing. Duplicate ids keep their first copy.
    pub fn replace_all(&mut self, items: Vec<T>) {
        self.items.clear();
        for item in items {
            if self.position(item.id()).is_none() {
                self.items.push(item);
            }
        }
    }

    pub fn get(&self, id: &str) -> Option<&T> {
        self.items.iter().find(|item| item.id() == id)
    }

    pub fn position(&self, id: &str) -> Option<usize> {
        self.items.iter().position(|item| item.id() == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.position(id).is_some()
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Item {
        id: String,
        rev: u32,
    }

    impl Identified for Item {
        fn id(&self) -> &str {
            &self.id
        }
    }

    fn item(id: &str, rev: u32) -> Item {
        Item { id: id.into(), rev }
    }

    #[test]
    fn upsert_replaces_in_place_and_inserts_new_at_head() {
        let mut store = EntityStore::new();
        store.upsert(item("a", 1));
        store.upsert(item("b", 1));
        store.upsert(item("a", 2));
        let ids: Vec<_> = store.items().iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a"]);
        assert_eq!(store.get("a").unwrap().rev, 2);
    }

    #[test]
    fn restore_returns_item_to_its_slot() {
        let mut store = EntityStore::new();
        store.replace_all(vec![item("a", 1), item("b", 1), item("c", 1)]);
        let removed = store.remove("b").unwrap();
        store.restore(1, removed);
        let ids: Vec<_> = store.items().iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    proptest! {
        #[test]
        fn ids_stay_unique_under_any_write_sequence(
            ops in proptest::collection::vec((0u8..3, 0u8..6), 0..40)
        ) {
            let mut store = EntityStore::new();
            for (op, key) in ops {
                let id = format!("id{}", key);
                match op {
                    0 => store.upsert(item(&id, key as u32)),
                    1 => { store.remove(&id); }
                    _ => store.replace_all(vec![item(&id, 0), item(&id, 1), item("id0", 2)]),
                }
            }
            let mut ids: Vec<_> = store.items().iter().map(|i| i.id.clone()).collect();
            let before = ids.len();
            ids.sort();
            ids.dedup();
            prop_assert_eq!(before, ids.len());
        }
    }
}
