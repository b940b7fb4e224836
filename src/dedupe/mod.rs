//! TTL-keyed dedupe store backed by Redis, with pipelined batch lookups and
//! a local-cache-first read path. Failure policy is conservative: any
//! remote error is treated as "not seen" on reads so the system would
//! rather re-emit a rare duplicate than silently drop a valid pick, and as
//! "not recorded" on writes so a failed `mark` simply leaves the key
//! eligible for another attempt on the next poll.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tracing::{error, warn};

use crate::cache::LocalCache;
use crate::domain::Pick;
use crate::error::CoreError;

const CURSOR_KEY: &str = "retador:cursor";
const MIN_TTL_SECS: i64 = 60;

#[async_trait]
pub trait DedupeStore: Send + Sync {
    async fn exists(&self, key: &str) -> bool;
    async fn exists_any(&self, keys: &[String]) -> bool;
    /// Writes the pick's dedup key and every opposite-market key with the
    /// same TTL in one pipelined transaction. Returns `false` (without
    /// writing) when the computed TTL is not positive, or on store error.
    async fn mark(&self, pick: &Pick, now_ms: i64) -> bool;
    async fn get_cursor(&self) -> Option<String>;
    async fn set_cursor(&self, cursor: &str) -> bool;
}

pub struct RedisDedupeStore {
    conn: ConnectionManager,
    local: Arc<LocalCache>,
}

impl RedisDedupeStore {
    pub async fn connect(redis_url: &str, local: Arc<LocalCache>) -> anyhow::Result<Self> {
        let client = redis::Client::open(redis_url)?;
        let conn = client.get_connection_manager().await?;
        Ok(RedisDedupeStore { conn, local })
    }
}

#[async_trait]
impl DedupeStore for RedisDedupeStore {
    async fn exists(&self, key: &str) -> bool {
        if self.local.get(key).await.is_some() {
            return true;
        }
        let mut conn = self.conn.clone();
        match conn.exists::<_, bool>(key).await {
            Ok(true) => {
                self.local.set(key, "1", Some(Duration::from_secs(60))).await;
                true
            }
            Ok(false) => false,
            Err(e) => {
                warn!("{}", CoreError::DedupeStore(format!("exists(): {e}")));
                false
            }
        }
    }

    async fn exists_any(&self, keys: &[String]) -> bool {
        for key in keys {
            if self.local.get(key).await.is_some() {
                return true;
            }
        }
        if keys.is_empty() {
            return false;
        }
        let mut conn = self.conn.clone();
        let mut pipe = redis::pipe();
        pipe.atomic();
        for key in keys {
            pipe.exists(key);
        }
        match pipe.query_async::<_, Vec<bool>>(&mut conn).await {
            Ok(results) => {
                for (key, hit) in keys.iter().zip(results.into_iter()) {
                    if hit {
                        self.local.set(key, "1", Some(Duration::from_secs(60))).await;
                        return true;
                    }
                }
                false
            }
            Err(e) => {
                warn!("{}", CoreError::DedupeStore(format!("exists_any(): {e}")));
                false
            }
        }
    }

    async fn mark(&self, pick: &Pick, now_ms: i64) -> bool {
        let ttl_secs = ((pick.event_time_ms - now_ms) / 1000).max(MIN_TTL_SECS);
        if ttl_secs <= 0 {
            return false;
        }
        let mut keys = vec![pick.dedup_key()];
        keys.extend(pick.opposite_keys());

        let mut conn = self.conn.clone();
        let mut pipe = redis::pipe();
        pipe.atomic();
        for key in &keys {
            pipe.set_ex(key, "1", ttl_secs as u64);
        }
        match pipe.query_async::<_, ()>(&mut conn).await {
            Ok(()) => {
                for key in &keys {
                    self.local
                        .set(key, "1", Some(Duration::from_secs(ttl_secs as u64)))
                        .await;
                }
                true
            }
            Err(e) => {
                error!("{}", CoreError::DedupeStore(format!("mark(): {e}")));
                false
            }
        }
    }

    async fn get_cursor(&self) -> Option<String> {
        let mut conn = self.conn.clone();
        match conn.get::<_, Option<String>>(CURSOR_KEY).await {
            Ok(v) => v,
            Err(e) => {
                warn!("{}", CoreError::DedupeStore(format!("get_cursor(): {e}")));
                None
            }
        }
    }

    async fn set_cursor(&self, cursor: &str) -> bool {
        let mut conn = self.conn.clone();
        match conn.set::<_, _, ()>(CURSOR_KEY, cursor).await {
            Ok(()) => true,
            Err(e) => {
                error!("{}", CoreError::DedupeStore(format!("set_cursor(): {e}")));
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::MarketType;

    fn sample_pick(event_time_ms: i64) -> Pick {
        Pick {
            teams: ("Fnatic".into(), "G2".into()),
            event_time_ms,
            tournament: "LEC".into(),
            sport_id: "leagueoflegends".into(),
            link: None,
            soft_bookmaker: "retabet_apuestas".into(),
            soft_odds: 2.05,
            market: MarketType::new("under"),
            variety: "2.5".into(),
            channel_id: -1002294438792,
            sharp_bookmaker: "pinnaclesports".into(),
            sharp_odds: 2.10,
            profit: 2.5,
        }
    }

    // A fake in-memory store exercising the same trait, used by validation
    // chain tests; the real Redis-backed store requires a live server and
    // is covered by integration tests instead.
    pub struct FakeStore {
        pub seen: tokio::sync::Mutex<std::collections::HashSet<String>>,
    }

    impl FakeStore {
        pub fn new() -> Self {
            FakeStore {
                seen: tokio::sync::Mutex::new(std::collections::HashSet::new()),
            }
        }
    }

    #[async_trait]
    impl DedupeStore for FakeStore {
        async fn exists(&self, key: &str) -> bool {
            self.seen.lock().await.contains(key)
        }
        async fn exists_any(&self, keys: &[String]) -> bool {
            let seen = self.seen.lock().await;
            keys.iter().any(|k| seen.contains(k))
        }
        async fn mark(&self, pick: &Pick, now_ms: i64) -> bool {
            if pick.event_time_ms - now_ms <= 0 && pick.event_time_ms - now_ms < -MIN_TTL_SECS * 1000
            {
                return false;
            }
            let mut seen = self.seen.lock().await;
            seen.insert(pick.dedup_key());
            for k in pick.opposite_keys() {
                seen.insert(k);
            }
            true
        }
        async fn get_cursor(&self) -> Option<String> {
            None
        }
        async fn set_cursor(&self, _cursor: &str) -> bool {
            true
        }
    }

    #[tokio::test]
    async fn fake_store_marks_and_detects_opposite() {
        let store = FakeStore::new();
        let pick = sample_pick(2_000_000_000_000);
        assert!(store.mark(&pick, 1_000_000_000_000).await);
        assert!(store.exists(&pick.dedup_key()).await);
        assert!(store.exists_any(&pick.opposite_keys()).await);
    }
}
