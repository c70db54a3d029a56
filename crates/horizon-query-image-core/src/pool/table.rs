//! Reference-counted keyed table shared by the three pools.
//!
//! An entry owns one platform resource `R` and an ordered list of subscribers
//! `S`. The entry is created with its first subscriber and handed back for
//! teardown the moment its last subscriber leaves. The table never builds or
//! tears down resources itself.

use std::collections::HashMap;
use std::hash::Hash;

use slotmap::SlotMap;

use super::SubscriberId;

struct PoolEntry<R, S> {
    resource: R,
    subscribers: Vec<(SubscriberId, S)>,
}

pub(crate) struct PoolTable<K, R, S> {
    entries: HashMap<K, PoolEntry<R, S>>,
    owners: SlotMap<SubscriberId, K>,
}

impl<K, R, S> Default for PoolTable<K, R, S> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
            owners: SlotMap::with_key(),
        }
    }
}

impl<K, R, S> PoolTable<K, R, S>
where
    K: Eq + Hash + Clone,
{
    /// Add a subscriber to the existing entry for `key`.
    ///
    /// Hands the subscriber back when `key` has no entry yet; the caller then
    /// builds the resource outside any lock and calls [`insert`](Self::insert).
    pub(crate) fn join(&mut self, key: &K, subscriber: S) -> Result<SubscriberId, S> {
        let Some(entry) = self.entries.get_mut(key) else {
            return Err(subscriber);
        };
        let id = self.owners.insert(key.clone());
        entry.subscribers.push((id, subscriber));
        Ok(id)
    }

    /// Create the entry for `key` with its first subscriber.
    ///
    /// If an entry appeared since the caller's [`join`](Self::join) failed,
    /// the subscriber joins it and `resource` is handed back unused.
    pub(crate) fn insert(&mut self, key: K, resource: R, subscriber: S) -> (SubscriberId, Option<R>) {
        match self.join(&key, subscriber) {
            Ok(id) => (id, Some(resource)),
            Err(subscriber) => {
                let id = self.owners.insert(key.clone());
                self.entries.insert(
                    key,
                    PoolEntry {
                        resource,
                        subscribers: vec![(id, subscriber)],
                    },
                );
                (id, None)
            }
        }
    }

    /// Remove subscriber `id` from `key`.
    ///
    /// Unknown ids, ids already removed, and ids registered under a different
    /// key are ignored and yield `None`.
    pub(crate) fn unsubscribe(&mut self, key: &K, id: SubscriberId) -> Option<Removal<R, S>> {
        if self.owners.get(id) != Some(key) {
            return None;
        }
        self.owners.remove(id);

        let entry = self.entries.get_mut(key)?;
        let position = entry.subscribers.iter().position(|(other, _)| *other == id)?;
        let (_, subscriber) = entry.subscribers.remove(position);

        if entry.subscribers.is_empty() {
            let entry = self.entries.remove(key)?;
            Some(Removal::Last {
                subscriber,
                resource: entry.resource,
            })
        } else {
            Some(Removal::Remaining { subscriber })
        }
    }

    pub(crate) fn resource(&self, key: &K) -> Option<&R> {
        self.entries.get(key).map(|entry| &entry.resource)
    }

    /// Map the subscribers of `key` through `select`, in registration order.
    pub(crate) fn snapshot<T>(&self, key: &K, mut select: impl FnMut(&S) -> Option<T>) -> Vec<T> {
        self.entries
            .get(key)
            .map(|entry| {
                entry
                    .subscribers
                    .iter()
                    .filter_map(|(_, subscriber)| select(subscriber))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub(crate) fn is_subscribed(&self, id: SubscriberId) -> bool {
        self.owners.contains_key(id)
    }

    pub(crate) fn contains_key(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    pub(crate) fn entry_count(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn subscriber_count(&self) -> usize {
        self.owners.len()
    }

    pub(crate) fn subscribers_of(&self, key: &K) -> usize {
        self.entries.get(key).map_or(0, |entry| entry.subscribers.len())
    }
}

/// Outcome of removing a subscriber.
pub(crate) enum Removal<R, S> {
    /// Other subscribers remain on the entry.
    Remaining { subscriber: S },
    /// The entry was emptied and removed; its resource must be torn down.
    Last { subscriber: S, resource: R },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_on_first_destroy_on_last() {
        let mut table: PoolTable<&str, u32, char> = PoolTable::default();

        let a = match table.join(&"k", 'a') {
            Ok(_) => unreachable!(),
            Err(first) => {
                let (id, unused) = table.insert("k", 7, first);
                assert_eq!(unused, None);
                id
            }
        };
        let b = table.join(&"k", 'b').ok().unwrap();
        assert_eq!(table.subscribers_of(&"k"), 2);
        assert_eq!(table.resource(&"k"), Some(&7));

        assert!(matches!(table.unsubscribe(&"k", a), Some(Removal::Remaining { subscriber: 'a' })));
        assert!(matches!(
            table.unsubscribe(&"k", b),
            Some(Removal::Last { subscriber: 'b', resource: 7 })
        ));
        assert!(!table.contains_key(&"k"));
        assert_eq!(table.entry_count(), 0);
    }

    #[test]
    fn test_insert_after_lost_race_joins_existing_entry() {
        let mut table: PoolTable<&str, u32, char> = PoolTable::default();
        table.insert("k", 1, 'a');

        let (id, unused) = table.insert("k", 2, 'b');
        assert_eq!(unused, Some(2));
        assert_eq!(table.resource(&"k"), Some(&1));
        assert_eq!(table.subscribers_of(&"k"), 2);
        assert!(table.is_subscribed(id));
    }

    #[test]
    fn test_double_and_foreign_unsubscribe_are_noops() {
        let mut table: PoolTable<&str, (), u8> = PoolTable::default();
        let (a, _) = table.insert("x", (), 1);
        let (b, _) = table.insert("y", (), 2);

        assert!(table.unsubscribe(&"y", a).is_none());
        assert!(table.unsubscribe(&"x", a).is_some());
        assert!(table.unsubscribe(&"x", a).is_none());
        assert!(table.is_subscribed(b));
        assert_eq!(table.subscriber_count(), 1);
    }

    #[test]
    fn test_snapshot_preserves_order() {
        let mut table: PoolTable<u8, (), u8> = PoolTable::default();
        for value in [3, 1, 2] {
            table.insert(0, (), value);
        }
        assert_eq!(table.snapshot(&0, |v| Some(*v)), vec![3, 1, 2]);
        assert_eq!(table.snapshot(&0, |v| (*v > 1).then_some(*v)), vec![3, 2]);
        assert!(table.snapshot(&9, |v| Some(*v)).is_empty());
    }
}
