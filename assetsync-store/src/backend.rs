//! Backend abstraction: a handful of Redis-shaped primitives plus batched
//! submission.
//!
//! Writes go through [`KvBackend::execute`]; the single-op write methods are
//! one-element batches. Reads are direct.

use std::collections::HashMap;
use std::time::Duration;

use crate::error::StoreError;

/// One write inside a [`Batch`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOp {
    HashSet {
        key: String,
        fields: Vec<(String, String)>,
    },
    HashDel {
        key: String,
        field: String,
    },
    SetAdd {
        key: String,
        member: String,
    },
    SetRem {
        key: String,
        member: String,
    },
    Del {
        key: String,
    },
    ListPush {
        key: String,
        value: String,
    },
    /// Keep only the last `keep` elements of the list.
    ListKeepTail {
        key: String,
        keep: usize,
    },
}

/// Ordered group of writes submitted as one unit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Batch {
    ops: Vec<BatchOp>,
}

impl Batch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, op: BatchOp) -> &mut Self {
        self.ops.push(op);
        self
    }

    pub fn hset_all(&mut self, key: impl Into<String>, fields: Vec<(String, String)>) -> &mut Self {
        self.push(BatchOp::HashSet {
            key: key.into(),
            fields,
        })
    }

    pub fn hdel(&mut self, key: impl Into<String>, field: impl Into<String>) -> &mut Self {
        self.push(BatchOp::HashDel {
            key: key.into(),
            field: field.into(),
        })
    }

    pub fn sadd(&mut self, key: impl Into<String>, member: impl Into<String>) -> &mut Self {
        self.push(BatchOp::SetAdd {
            key: key.into(),
            member: member.into(),
        })
    }

    pub fn srem(&mut self, key: impl Into<String>, member: impl Into<String>) -> &mut Self {
        self.push(BatchOp::SetRem {
            key: key.into(),
            member: member.into(),
        })
    }

    pub fn del(&mut self, key: impl Into<String>) -> &mut Self {
        self.push(BatchOp::Del { key: key.into() })
    }

    pub fn rpush(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.push(BatchOp::ListPush {
            key: key.into(),
            value: value.into(),
        })
    }

    pub fn keep_tail(&mut self, key: impl Into<String>, keep: usize) -> &mut Self {
        self.push(BatchOp::ListKeepTail {
            key: key.into(),
            keep,
        })
    }

    pub fn ops(&self) -> &[BatchOp] {
        &self.ops
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    fn single(op: BatchOp) -> Self {
        Self { ops: vec![op] }
    }
}

/// Key-value primitives the asset store is built on.
///
/// Implementations must be shareable across threads; the daemon moves the
/// store into blocking tasks.
pub trait KvBackend: Send + Sync {
    /// Establish the underlying connection. Idempotent.
    fn connect(&self) -> Result<(), StoreError> {
        Ok(())
    }

    fn ping(&self) -> Result<(), StoreError>;

    /// Apply every op of `batch` as one unit.
    fn execute(&self, batch: Batch) -> Result<(), StoreError>;

    fn hget_all(&self, key: &str) -> Result<HashMap<String, String>, StoreError>;

    fn hget(&self, key: &str, field: &str) -> Result<Option<String>, StoreError> {
        Ok(self.hget_all(key)?.remove(field))
    }

    fn hkeys(&self, key: &str) -> Result<Vec<String>, StoreError> {
        let mut keys: Vec<String> = self.hget_all(key)?.into_keys().collect();
        keys.sort();
        Ok(keys)
    }

    fn smembers(&self, key: &str) -> Result<Vec<String>, StoreError>;

    /// Inclusive range with Redis index semantics (negative counts from the end).
    fn lrange(&self, key: &str, start: isize, stop: isize) -> Result<Vec<String>, StoreError>;

    /// Every key starting with `prefix`.
    fn scan_prefix(&self, prefix: &str) -> Result<Vec<String>, StoreError>;

    /// Set `key` to `value` with a TTL unless it already exists. True when set.
    fn set_nx_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<bool, StoreError>;

    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Delete `key` only while it still holds `expected`. True when deleted.
    fn del_if_eq(&self, key: &str, expected: &str) -> Result<bool, StoreError>;

    fn hset_all(&self, key: &str, fields: Vec<(String, String)>) -> Result<(), StoreError> {
        self.execute(Batch::single(BatchOp::HashSet {
            key: key.to_string(),
            fields,
        }))
    }

    fn hdel(&self, key: &str, field: &str) -> Result<(), StoreError> {
        self.execute(Batch::single(BatchOp::HashDel {
            key: key.to_string(),
            field: field.to_string(),
        }))
    }

    fn sadd(&self, key: &str, member: &str) -> Result<(), StoreError> {
        self.execute(Batch::single(BatchOp::SetAdd {
            key: key.to_string(),
            member: member.to_string(),
        }))
    }

    fn srem(&self, key: &str, member: &str) -> Result<(), StoreError> {
        self.execute(Batch::single(BatchOp::SetRem {
            key: key.to_string(),
            member: member.to_string(),
        }))
    }

    fn del(&self, key: &str) -> Result<(), StoreError> {
        self.execute(Batch::single(BatchOp::Del {
            key: key.to_string(),
        }))
    }

    fn rpush(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.execute(Batch::single(BatchOp::ListPush {
            key: key.to_string(),
            value: value.to_string(),
        }))
    }

    fn keep_tail(&self, key: &str, keep: usize) -> Result<(), StoreError> {
        self.execute(Batch::single(BatchOp::ListKeepTail {
            key: key.to_string(),
            keep,
        }))
    }
}

/// Resolve a Redis-style inclusive `[start, stop]` over a list of `len`
/// elements into a half-open slice range. `None` when the range is empty.
pub fn resolve_range(len: usize, start: isize, stop: isize) -> Option<std::ops::Range<usize>> {
    let len = len as isize;
    let start = if start < 0 { (len + start).max(0) } else { start };
    let stop = if stop < 0 { len + stop } else { stop.min(len - 1) };
    if len == 0 || start > stop || start >= len {
        return None;
    }
    Some(start as usize..(stop + 1) as usize)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::all(5, 0, -1, Some(0..5))]
    #[case::last_two(5, -2, -1, Some(3..5))]
    #[case::count_exceeds_len(3, -10, -1, Some(0..3))]
    #[case::stop_past_end(3, 1, 99, Some(1..3))]
    #[case::empty_list(0, 0, -1, None)]
    #[case::inverted(5, 3, 1, None)]
    #[case::start_past_end(2, 5, 9, None)]
    fn redis_range_resolution(
        #[case] len: usize,
        #[case] start: isize,
        #[case] stop: isize,
        #[case] expected: Option<std::ops::Range<usize>>,
    ) {
        assert_eq!(resolve_range(len, start, stop), expected);
    }

    #[test]
    fn batch_builder_keeps_order() {
        let mut batch = Batch::new();
        batch.del("a").sadd("s", "x").rpush("l", "y");
        assert_eq!(batch.len(), 3);
        assert!(matches!(batch.ops()[0], BatchOp::Del { .. }));
        assert!(matches!(batch.ops()[2], BatchOp::ListPush { .. }));
    }
}
