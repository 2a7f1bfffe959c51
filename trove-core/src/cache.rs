use crate::{CachePolicy, Entity, EntityRef, TableId, Value};
use std::{
    any::Any,
    cell::RefCell,
    collections::HashMap,
    fmt::Write,
    rc::{Rc, Weak},
};

/// Identity of a cached row: the table and its primary key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    table: TableId,
    key: String,
}

impl CacheKey {
    /// Values of different integer widths produce the same key.
    pub fn new(table: TableId, values: &[Value]) -> Self {
        let mut key = String::with_capacity(values.len() * 8);
        for (i, v) in values.iter().enumerate() {
            if i > 0 {
                key.push('\u{1f}');
            }
            let _ = write!(key, "{}", v);
        }
        Self { table, key }
    }

    pub fn table(&self) -> TableId {
        self.table
    }
}

enum CacheEntry {
    Weak(Weak<dyn Any>),
    Strong(Rc<dyn Any>),
}

impl CacheEntry {
    fn get(&self) -> Option<Rc<dyn Any>> {
        match self {
            CacheEntry::Weak(v) => v.upgrade(),
            CacheEntry::Strong(v) => Some(v.clone()),
        }
    }

    fn is_alive(&self) -> bool {
        match self {
            CacheEntry::Weak(v) => v.strong_count() > 0,
            CacheEntry::Strong(..) => true,
        }
    }
}

/// Identity map of the entities a session has loaded or saved.
///
/// `Protected` keeps weak handles so unreferenced entities are dropped,
/// `Solid` keeps them until removed, `None` stores nothing.
pub struct EntityCache {
    policy: CachePolicy,
    entries: HashMap<CacheKey, CacheEntry>,
    puts: usize,
}

impl EntityCache {
    pub fn new(policy: CachePolicy) -> Self {
        Self {
            policy,
            entries: HashMap::new(),
            puts: 0,
        }
    }

    pub fn policy(&self) -> CachePolicy {
        self.policy
    }

    pub fn is_enabled(&self) -> bool {
        self.policy != CachePolicy::None
    }

    pub fn get<E: Entity>(&self, key: &CacheKey) -> Option<EntityRef<E>> {
        self.entries
            .get(key)
            .and_then(CacheEntry::get)
            .and_then(|v| v.downcast::<RefCell<E>>().ok())
    }

    pub fn contains(&self, key: &CacheKey) -> bool {
        self.entries.get(key).is_some_and(CacheEntry::is_alive)
    }

    pub fn put<E: Entity>(&mut self, key: CacheKey, entity: &EntityRef<E>) {
        let entity: Rc<dyn Any> = entity.clone();
        let entry = match self.policy {
            CachePolicy::None => return,
            CachePolicy::Protected => CacheEntry::Weak(Rc::downgrade(&entity)),
            CachePolicy::Solid => CacheEntry::Strong(entity),
        };
        self.entries.insert(key, entry);
        self.puts += 1;
        if self.puts % 256 == 0 {
            self.prune();
        }
    }

    pub fn remove(&mut self, key: &CacheKey) -> bool {
        self.entries.remove(key).is_some()
    }

    /// Number of live entries of the table.
    pub fn count_table(&self, table: TableId) -> usize {
        self.entries
            .iter()
            .filter(|(k, v)| k.table == table && v.is_alive())
            .count()
    }

    pub fn len(&self) -> usize {
        self.entries.values().filter(|v| v.is_alive()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop the entries whose entity was released.
    pub fn prune(&mut self) {
        self.entries.retain(|_, v| v.is_alive());
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
