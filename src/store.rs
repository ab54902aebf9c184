//! Prefix-scannable key-value storage behind the query engine.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use serde_json::Value as JsonValue;

/// Errors surfaced by a key-value backend.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store backend error: {message}")]
    Backend { message: String },

    #[error("stored value is not valid JSON: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    pub fn backend(message: impl Into<String>) -> StoreError {
        StoreError::Backend {
            message: message.into(),
        }
    }
}

/// A hierarchical key: an ordered list of string components.
///
/// Keys sort componentwise, so every key under a prefix forms one contiguous
/// run in scan order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct KvKey(pub Vec<String>);

impl KvKey {
    pub fn new(parts: impl IntoIterator<Item = impl Into<String>>) -> KvKey {
        KvKey(parts.into_iter().map(Into::into).collect())
    }

    pub fn starts_with(&self, prefix: &KvKey) -> bool {
        self.0.len() >= prefix.0.len() && self.0[..prefix.0.len()] == prefix.0[..]
    }
}

impl fmt::Display for KvKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join("/"))
    }
}

impl From<Vec<String>> for KvKey {
    fn from(parts: Vec<String>) -> KvKey {
        KvKey(parts)
    }
}

/// One stored entry.
#[derive(Debug, Clone, PartialEq)]
pub struct KvEntry {
    pub key: KvKey,
    pub value: JsonValue,
}

/// Whether a scan should keep going after the current entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanStep {
    Continue,
    Stop,
}

/// Minimal backend contract: batched point operations plus an ordered
/// prefix scan.
///
/// `scan` visits entries in ascending key order and stops early when the
/// visitor returns [`ScanStep::Stop`], so `limit` queries without a sort
/// never touch the rest of the range.
pub trait KvPrimitives {
    fn batch_get(&self, keys: &[KvKey]) -> Result<Vec<Option<JsonValue>>, StoreError>;

    fn batch_set(&mut self, entries: Vec<KvEntry>) -> Result<(), StoreError>;

    fn batch_delete(&mut self, keys: &[KvKey]) -> Result<(), StoreError>;

    fn scan(
        &self,
        prefix: &KvKey,
        visit: &mut dyn FnMut(KvEntry) -> Result<ScanStep, StoreError>,
    ) -> Result<(), StoreError>;
}

/// In-memory backend over a sorted map.
#[derive(Default)]
pub struct MemoryKv {
    entries: BTreeMap<KvKey, JsonValue>,
}

impl MemoryKv {
    pub fn new() -> Self {
        MemoryKv::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl KvPrimitives for MemoryKv {
    fn batch_get(&self, keys: &[KvKey]) -> Result<Vec<Option<JsonValue>>, StoreError> {
        Ok(keys.iter().map(|k| self.entries.get(k).cloned()).collect())
    }

    fn batch_set(&mut self, entries: Vec<KvEntry>) -> Result<(), StoreError> {
        for entry in entries {
            self.entries.insert(entry.key, entry.value);
        }
        Ok(())
    }

    fn batch_delete(&mut self, keys: &[KvKey]) -> Result<(), StoreError> {
        for key in keys {
            self.entries.remove(key);
        }
        Ok(())
    }

    fn scan(
        &self,
        prefix: &KvKey,
        visit: &mut dyn FnMut(KvEntry) -> Result<ScanStep, StoreError>,
    ) -> Result<(), StoreError> {
        for (key, value) in self.entries.range(prefix.clone()..) {
            if !key.starts_with(prefix) {
                break;
            }
            let step = visit(KvEntry {
                key: key.clone(),
                value: value.clone(),
            })?;
            if step == ScanStep::Stop {
                break;
            }
        }
        Ok(())
    }
}

/// Shared handle over a key-value backend.
///
/// Cheap to clone; queryable collection handles hold one of these.
#[derive(Clone)]
pub struct DataStore {
    kv: Rc<RefCell<dyn KvPrimitives>>,
}

impl DataStore {
    pub fn new(kv: impl KvPrimitives + 'static) -> DataStore {
        DataStore {
            kv: Rc::new(RefCell::new(kv)),
        }
    }

    pub fn in_memory() -> DataStore {
        DataStore::new(MemoryKv::new())
    }

    pub fn get(&self, key: &KvKey) -> Result<Option<JsonValue>, StoreError> {
        Ok(self
            .kv
            .borrow()
            .batch_get(std::slice::from_ref(key))?
            .into_iter()
            .next()
            .flatten())
    }

    pub fn set(&self, key: KvKey, value: JsonValue) -> Result<(), StoreError> {
        self.batch_set(vec![KvEntry { key, value }])
    }

    pub fn delete(&self, key: &KvKey) -> Result<(), StoreError> {
        self.kv.borrow_mut().batch_delete(std::slice::from_ref(key))
    }

    pub fn batch_get(&self, keys: &[KvKey]) -> Result<Vec<Option<JsonValue>>, StoreError> {
        self.kv.borrow().batch_get(keys)
    }

    /// Write a batch. Duplicate keys within one batch keep the first
    /// occurrence; later ones are dropped with a warning so callers can fix
    /// the producing code.
    pub fn batch_set(&self, entries: Vec<KvEntry>) -> Result<(), StoreError> {
        let mut seen = std::collections::HashSet::with_capacity(entries.len());
        let mut deduped = Vec::with_capacity(entries.len());
        for entry in entries {
            if seen.insert(entry.key.clone()) {
                deduped.push(entry);
            } else {
                tracing::warn!(key = %entry.key, "duplicate key in batch_set, dropping");
            }
        }
        self.kv.borrow_mut().batch_set(deduped)
    }

    pub fn batch_delete(&self, keys: &[KvKey]) -> Result<(), StoreError> {
        self.kv.borrow_mut().batch_delete(keys)
    }

    pub fn scan(
        &self,
        prefix: &KvKey,
        visit: &mut dyn FnMut(KvEntry) -> Result<ScanStep, StoreError>,
    ) -> Result<(), StoreError> {
        self.kv.borrow().scan(prefix, visit)
    }
}
