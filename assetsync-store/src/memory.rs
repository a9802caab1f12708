//! In-process backend.
//!
//! Used by tests and by `store.backend: memory`. A batch is applied under a
//! single mutex guard, so readers never observe half of it.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use crate::backend::{resolve_range, Batch, BatchOp, KvBackend};
use crate::error::{corrupt, StoreError};

#[derive(Debug, Clone)]
enum Entry {
    Hash(BTreeMap<String, String>),
    Set(BTreeSet<String>),
    List(Vec<String>),
    Str {
        value: String,
        expires_at: Option<Instant>,
    },
}

impl Entry {
    fn kind(&self) -> &'static str {
        match self {
            Entry::Hash(_) => "hash",
            Entry::Set(_) => "set",
            Entry::List(_) => "list",
            Entry::Str { .. } => "string",
        }
    }

    fn is_empty(&self) -> bool {
        match self {
            Entry::Hash(h) => h.is_empty(),
            Entry::Set(s) => s.is_empty(),
            Entry::List(l) => l.is_empty(),
            Entry::Str { .. } => false,
        }
    }
}

#[derive(Debug, Default)]
pub struct MemoryBackend {
    data: Mutex<HashMap<String, Entry>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live keys.
    pub fn key_count(&self) -> usize {
        self.lock().map(|mut d| {
            purge_expired(&mut d);
            d.len()
        })
        .unwrap_or(0)
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<String, Entry>>, StoreError> {
        self.data
            .lock()
            .map_err(|_| StoreError::Connection("memory backend lock poisoned".into()))
    }
}

fn purge_expired(data: &mut HashMap<String, Entry>) {
    let now = Instant::now();
    data.retain(|_, entry| match entry {
        Entry::Str {
            expires_at: Some(at),
            ..
        } => *at > now,
        _ => true,
    });
}

fn wrong_type(key: &str, entry: &Entry, wanted: &str) -> StoreError {
    corrupt(
        key,
        format!("operation against a {} value, expected {wanted}", entry.kind()),
    )
}

/// Validate every op against the current key types before mutating anything,
/// so a failing batch leaves no partial writes behind.
fn check_types(data: &HashMap<String, Entry>, batch: &Batch) -> Result<(), StoreError> {
    for op in batch.ops() {
        let (key, wanted) = match op {
            BatchOp::HashSet { key, .. } | BatchOp::HashDel { key, .. } => (key, "hash"),
            BatchOp::SetAdd { key, .. } | BatchOp::SetRem { key, .. } => (key, "set"),
            BatchOp::ListPush { key, .. } | BatchOp::ListKeepTail { key, .. } => (key, "list"),
            BatchOp::Del { .. } => continue,
        };
        if let Some(entry) = data.get(key) {
            if entry.kind() != wanted {
                return Err(wrong_type(key, entry, wanted));
            }
        }
    }
    Ok(())
}

fn apply(data: &mut HashMap<String, Entry>, op: BatchOp) {
    let touched = match op {
        BatchOp::HashSet { key, fields } => {
            if let Entry::Hash(h) = data.entry(key.clone()).or_insert_with(|| Entry::Hash(BTreeMap::new())) {
                h.extend(fields);
            }
            key
        }
        BatchOp::HashDel { key, field } => {
            if let Some(Entry::Hash(h)) = data.get_mut(&key) {
                h.remove(&field);
            }
            key
        }
        BatchOp::SetAdd { key, member } => {
            if let Entry::Set(s) = data.entry(key.clone()).or_insert_with(|| Entry::Set(BTreeSet::new())) {
                s.insert(member);
            }
            key
        }
        BatchOp::SetRem { key, member } => {
            if let Some(Entry::Set(s)) = data.get_mut(&key) {
                s.remove(&member);
            }
            key
        }
        BatchOp::Del { key } => {
            data.remove(&key);
            return;
        }
        BatchOp::ListPush { key, value } => {
            if let Entry::List(l) = data.entry(key.clone()).or_insert_with(|| Entry::List(Vec::new())) {
                l.push(value);
            }
            key
        }
        BatchOp::ListKeepTail { key, keep } => {
            if let Some(Entry::List(l)) = data.get_mut(&key) {
                if l.len() > keep {
                    l.drain(..l.len() - keep);
                }
            }
            key
        }
    };
    // Redis drops empty aggregates.
    if data.get(&touched).is_some_and(Entry::is_empty) {
        data.remove(&touched);
    }
}

impl KvBackend for MemoryBackend {
    fn ping(&self) -> Result<(), StoreError> {
        self.lock().map(|_| ())
    }

    fn execute(&self, batch: Batch) -> Result<(), StoreError> {
        let mut data = self.lock()?;
        purge_expired(&mut data);
        check_types(&data, &batch)?;
        for op in batch.ops().iter().cloned() {
            apply(&mut data, op);
        }
        Ok(())
    }

    fn hget_all(&self, key: &str) -> Result<HashMap<String, String>, StoreError> {
        let data = self.lock()?;
        match data.get(key) {
            None => Ok(HashMap::new()),
            Some(Entry::Hash(h)) => Ok(h.iter().map(|(k, v)| (k.clone(), v.clone())).collect()),
            Some(other) => Err(wrong_type(key, other, "hash")),
        }
    }

    fn smembers(&self, key: &str) -> Result<Vec<String>, StoreError> {
        let data = self.lock()?;
        match data.get(key) {
            None => Ok(Vec::new()),
            Some(Entry::Set(s)) => Ok(s.iter().cloned().collect()),
            Some(other) => Err(wrong_type(key, other, "set")),
        }
    }

    fn lrange(&self, key: &str, start: isize, stop: isize) -> Result<Vec<String>, StoreError> {
        let data = self.lock()?;
        match data.get(key) {
            None => Ok(Vec::new()),
            Some(Entry::List(l)) => Ok(resolve_range(l.len(), start, stop)
                .map(|r| l[r].to_vec())
                .unwrap_or_default()),
            Some(other) => Err(wrong_type(key, other, "list")),
        }
    }

    fn scan_prefix(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        let mut data = self.lock()?;
        purge_expired(&mut data);
        let mut keys: Vec<String> = data.keys().filter(|k| k.starts_with(prefix)).cloned().collect();
        keys.sort();
        Ok(keys)
    }

    fn set_nx_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<bool, StoreError> {
        let mut data = self.lock()?;
        purge_expired(&mut data);
        if data.contains_key(key) {
            return Ok(false);
        }
        data.insert(
            key.to_string(),
            Entry::Str {
                value: value.to_string(),
                expires_at: Some(Instant::now() + ttl),
            },
        );
        Ok(true)
    }

    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut data = self.lock()?;
        purge_expired(&mut data);
        match data.get(key) {
            None => Ok(None),
            Some(Entry::Str { value, .. }) => Ok(Some(value.clone())),
            Some(other) => Err(wrong_type(key, other, "string")),
        }
    }

    fn del_if_eq(&self, key: &str, expected: &str) -> Result<bool, StoreError> {
        let mut data = self.lock()?;
        purge_expired(&mut data);
        let matches = matches!(data.get(key), Some(Entry::Str { value, .. }) if value == expected);
        if matches {
            data.remove(key);
        }
        Ok(matches)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_with_wrong_type_writes_nothing() {
        let backend = MemoryBackend::new();
        backend.sadd("s", "a").unwrap();

        let mut batch = Batch::new();
        batch.hset_all("h", vec![("f".into(), "v".into())]).rpush("s", "oops");
        let err = backend.execute(batch).unwrap_err();

        assert!(matches!(err, StoreError::Corrupt { .. }), "got: {err}");
        assert!(backend.hget_all("h").unwrap().is_empty());
    }

    #[test]
    fn empty_set_key_disappears() {
        let backend = MemoryBackend::new();
        backend.sadd("s", "a").unwrap();
        backend.srem("s", "a").unwrap();
        assert!(backend.scan_prefix("s").unwrap().is_empty());
    }

    #[test]
    fn keep_tail_drops_oldest() {
        let backend = MemoryBackend::new();
        for v in ["1", "2", "3", "4"] {
            backend.rpush("l", v).unwrap();
        }
        backend.keep_tail("l", 2).unwrap();
        assert_eq!(backend.lrange("l", 0, -1).unwrap(), vec!["3", "4"]);
    }

    #[test]
    fn nx_lease_refuses_second_owner_until_released() {
        let backend = MemoryBackend::new();
        let ttl = Duration::from_secs(60);
        assert!(backend.set_nx_ex("lease", "a", ttl).unwrap());
        assert!(!backend.set_nx_ex("lease", "b", ttl).unwrap());
        assert!(!backend.del_if_eq("lease", "b").unwrap());
        assert!(backend.del_if_eq("lease", "a").unwrap());
        assert!(backend.set_nx_ex("lease", "b", ttl).unwrap());
    }

    #[test]
    fn expired_lease_can_be_taken() {
        let backend = MemoryBackend::new();
        assert!(backend.set_nx_ex("lease", "a", Duration::ZERO).unwrap());
        assert!(backend.set_nx_ex("lease", "b", Duration::from_secs(60)).unwrap());
        assert_eq!(backend.get("lease").unwrap().as_deref(), Some("b"));
    }
}
