//! LRU + TTL local cache shared by the dedupe store (presence hits) and the
//! message formatter (rendered static blocks).

use std::collections::HashMap;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;

struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

struct Inner {
    map: HashMap<String, Entry>,
    /// Most-recently-used at the back.
    order: Vec<String>,
    max_size: usize,
}

impl Inner {
    fn touch(&mut self, key: &str) {
        if let Some(pos) = self.order.iter().position(|k| k == key) {
            let k = self.order.remove(pos);
            self.order.push(k);
        }
    }

    fn evict_lru(&mut self) {
        if !self.order.is_empty() {
            let victim = self.order.remove(0);
            self.map.remove(&victim);
        }
    }
}

pub struct LocalCache {
    inner: Mutex<Inner>,
}

impl LocalCache {
    pub fn new(max_size: usize) -> Self {
        LocalCache {
            inner: Mutex::new(Inner {
                map: HashMap::new(),
                order: Vec::new(),
                max_size,
            }),
        }
    }

    pub async fn get(&self, key: &str) -> Option<String> {
        let mut inner = self.inner.lock().await;
        let expired = match inner.map.get(key) {
            Some(e) => e.expires_at.map(|t| Instant::now() >= t).unwrap_or(false),
            None => return None,
        };
        if expired {
            inner.map.remove(key);
            inner.order.retain(|k| k != key);
            return None;
        }
        inner.touch(key);
        inner.map.get(key).map(|e| e.value.clone())
    }

    pub async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) {
        let mut inner = self.inner.lock().await;
        let expires_at = ttl.map(|d| Instant::now() + d);
        if inner.map.contains_key(key) {
            inner.touch(key);
        } else {
            if inner.map.len() >= inner.max_size {
                inner.evict_lru();
            }
            inner.order.push(key.to_string());
        }
        inner.map.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at,
            },
        );
    }

    pub async fn delete(&self, key: &str) {
        let mut inner = self.inner.lock().await;
        inner.map.remove(key);
        inner.order.retain(|k| k != key);
    }

    pub async fn clear(&self) {
        let mut inner = self.inner.lock().await;
        inner.map.clear();
        inner.order.clear();
    }

    /// Sweeps expired entries; returns the number removed. Meant to be
    /// called from a coarse periodic task, not the hot path.
    pub async fn cleanup_expired(&self) -> usize {
        let mut inner = self.inner.lock().await;
        let now = Instant::now();
        let expired: Vec<String> = inner
            .map
            .iter()
            .filter(|(_, e)| e.expires_at.map(|t| now >= t).unwrap_or(false))
            .map(|(k, _)| k.clone())
            .collect();
        for k in &expired {
            inner.map.remove(k);
            inner.order.retain(|key| key != k);
        }
        expired.len()
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.map.len()
    }
}
