//! Redis backend.
//!
//! One synchronous connection, established on first use and reused. Batches
//! are sent as a `MULTI`/`EXEC` pipeline. A dropped connection is discarded
//! and re-established by the next call.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use redis::{Commands, ConnectionAddr, ConnectionInfo, RedisConnectionInfo, RedisResult};

use assetsync_core::config::StoreConfig;

use crate::backend::{Batch, BatchOp, KvBackend};
use crate::error::StoreError;

/// Deletes the lease only while it still carries the caller's token.
const RELEASE_IF_OWNER: &str = r#"
if redis.call("GET", KEYS[1]) == ARGV[1] then
    return redis.call("DEL", KEYS[1])
else
    return 0
end
"#;

pub struct RedisBackend {
    client: redis::Client,
    endpoint: String,
    conn: Mutex<Option<redis::Connection>>,
}

impl std::fmt::Debug for RedisBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisBackend")
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

impl RedisBackend {
    /// Build a client for `config`. Does not touch the network.
    pub fn new(config: &StoreConfig) -> Result<Self, StoreError> {
        let info = ConnectionInfo {
            addr: ConnectionAddr::Tcp(config.host.clone(), config.port),
            redis: RedisConnectionInfo {
                db: config.db,
                password: config.password.clone(),
                ..Default::default()
            },
        };
        let client = redis::Client::open(info)?;
        Ok(Self {
            client,
            endpoint: format!("{}:{}/{}", config.host, config.port, config.db),
            conn: Mutex::new(None),
        })
    }

    fn guard(&self) -> Result<MutexGuard<'_, Option<redis::Connection>>, StoreError> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Connection("redis connection lock poisoned".into()))
    }

    /// Run `f` on the shared connection, connecting first if needed.
    fn with_conn<T>(
        &self,
        f: impl FnOnce(&mut redis::Connection) -> RedisResult<T>,
    ) -> Result<T, StoreError> {
        let mut slot = self.guard()?;
        if slot.is_none() {
            let conn = self.client.get_connection()?;
            tracing::info!(endpoint = %self.endpoint, "connected to redis");
            *slot = Some(conn);
        }
        let Some(conn) = slot.as_mut() else {
            return Err(StoreError::Connection("redis connection unavailable".into()));
        };
        match f(conn) {
            Ok(value) => Ok(value),
            Err(e) => {
                if e.is_io_error() || e.is_connection_dropped() || e.is_connection_refusal() {
                    tracing::warn!(endpoint = %self.endpoint, error = %e, "dropping redis connection");
                    *slot = None;
                }
                Err(e.into())
            }
        }
    }
}

fn build_pipeline(batch: &Batch) -> redis::Pipeline {
    let mut pipe = redis::pipe();
    pipe.atomic();
    for op in batch.ops() {
        match op {
            BatchOp::HashSet { key, fields } => {
                if !fields.is_empty() {
                    pipe.hset_multiple(key, fields.as_slice()).ignore();
                }
            }
            BatchOp::HashDel { key, field } => {
                pipe.hdel(key, field).ignore();
            }
            BatchOp::SetAdd { key, member } => {
                pipe.sadd(key, member).ignore();
            }
            BatchOp::SetRem { key, member } => {
                pipe.srem(key, member).ignore();
            }
            BatchOp::Del { key } => {
                pipe.del(key).ignore();
            }
            BatchOp::ListPush { key, value } => {
                pipe.rpush(key, value).ignore();
            }
            BatchOp::ListKeepTail { key, keep } => {
                // LTRIM key -0 -1 would keep everything.
                if *keep == 0 {
                    pipe.del(key).ignore();
                } else {
                    let keep = isize::try_from(*keep).unwrap_or(isize::MAX);
                    pipe.ltrim(key, -keep, -1).ignore();
                }
            }
        }
    }
    pipe
}

impl KvBackend for RedisBackend {
    fn connect(&self) -> Result<(), StoreError> {
        self.with_conn(|_| Ok(()))
    }

    fn ping(&self) -> Result<(), StoreError> {
        self.with_conn(|c| redis::cmd("PING").query::<String>(c).map(|_| ()))
    }

    fn execute(&self, batch: Batch) -> Result<(), StoreError> {
        if batch.is_empty() {
            return Ok(());
        }
        let pipe = build_pipeline(&batch);
        self.with_conn(|c| pipe.query::<()>(c))
    }

    fn hget_all(&self, key: &str) -> Result<HashMap<String, String>, StoreError> {
        self.with_conn(|c| c.hgetall(key))
    }

    fn hget(&self, key: &str, field: &str) -> Result<Option<String>, StoreError> {
        self.with_conn(|c| c.hget(key, field))
    }

    fn hkeys(&self, key: &str) -> Result<Vec<String>, StoreError> {
        let mut keys: Vec<String> = self.with_conn(|c| c.hkeys(key))?;
        keys.sort();
        Ok(keys)
    }

    fn smembers(&self, key: &str) -> Result<Vec<String>, StoreError> {
        let mut members: Vec<String> = self.with_conn(|c| c.smembers(key))?;
        members.sort();
        Ok(members)
    }

    fn lrange(&self, key: &str, start: isize, stop: isize) -> Result<Vec<String>, StoreError> {
        self.with_conn(|c| c.lrange(key, start, stop))
    }

    fn scan_prefix(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        let pattern = format!("{}*", escape_glob(prefix));
        let mut keys: Vec<String> = self.with_conn(|c| {
            let iter = c.scan_match::<_, String>(&pattern)?;
            Ok(iter.collect())
        })?;
        keys.sort();
        keys.dedup();
        Ok(keys)
    }

    fn set_nx_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<bool, StoreError> {
        let secs = ttl.as_secs().max(1);
        let reply: Option<String> = self.with_conn(|c| {
            redis::cmd("SET")
                .arg(key)
                .arg(value)
                .arg("NX")
                .arg("EX")
                .arg(secs)
                .query(c)
        })?;
        Ok(reply.is_some())
    }

    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.with_conn(|c| c.get(key))
    }

    fn del_if_eq(&self, key: &str, expected: &str) -> Result<bool, StoreError> {
        let script = redis::Script::new(RELEASE_IF_OWNER);
        let deleted: i64 = self.with_conn(|c| script.key(key).arg(expected).invoke(c))?;
        Ok(deleted > 0)
    }
}

/// Escape Redis glob metacharacters so a literal prefix matches only itself.
fn escape_glob(prefix: &str) -> String {
    let mut out = String::with_capacity(prefix.len());
    for ch in prefix.chars() {
        if matches!(ch, '*' | '?' | '[' | ']' | '\\') {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn glob_metacharacters_are_escaped() {
        assert_eq!(escape_glob("asset:metadata:"), "asset:metadata:");
        assert_eq!(escape_glob("a*b?[c]"), r"a\*b\?\[c\]");
    }

    #[test]
    fn pipeline_is_transactional_and_skips_empty_hash_writes() {
        let mut batch = Batch::new();
        batch
            .hset_all("h", vec![])
            .sadd("s", "x")
            .keep_tail("l", 0);
        let pipe = build_pipeline(&batch);
        let packed = String::from_utf8_lossy(&pipe.get_packed_pipeline()).to_string();
        assert!(packed.contains("MULTI"));
        assert!(packed.contains("EXEC"));
        assert!(!packed.contains("HSET"));
        assert!(packed.contains("SADD"));
        assert!(packed.contains("DEL"));
    }

    #[test]
    fn client_construction_is_offline() {
        let backend = RedisBackend::new(&StoreConfig {
            host: "127.0.0.1".into(),
            port: 1,
            ..StoreConfig::default()
        })
        .expect("client");
        assert!(format!("{backend:?}").contains("127.0.0.1:1/0"));
    }
}
