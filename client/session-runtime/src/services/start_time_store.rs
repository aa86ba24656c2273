use anyhow::{Context, Result};
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::metrics::track_store_operation;

pub fn start_time_key(token: &str) -> String {
    format!("safeInterview:session:{}:startTime", token)
}

/// Only positive integers count as a stored start time.
fn parse_start_time(raw: &str) -> Option<i64> {
    raw.trim().parse::<i64>().ok().filter(|v| *v > 0)
}

/// Per-token session start timestamps (epoch milliseconds).
#[async_trait]
pub trait StartTimeStore: Send + Sync {
    /// Returns the stored start time for `token`, persisting `now_ms` first if
    /// nothing valid is stored yet. A valid entry is never overwritten.
    async fn read_or_init(&self, token: &str, now_ms: i64) -> Result<i64>;
}

#[derive(Debug, Default)]
pub struct MemoryStartTimeStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStartTimeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw value as it sits in storage, keyed like the browser entry.
    pub fn raw(&self, token: &str) -> Option<String> {
        self.entries
            .lock()
            .ok()
            .and_then(|entries| entries.get(&start_time_key(token)).cloned())
    }

    pub fn insert_raw(&self, token: &str, value: &str) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(start_time_key(token), value.to_string());
        }
    }
}

#[async_trait]
impl StartTimeStore for MemoryStartTimeStore {
    async fn read_or_init(&self, token: &str, now_ms: i64) -> Result<i64> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| anyhow::anyhow!("start time store lock poisoned"))?;
        let key = start_time_key(token);

        if let Some(stored) = entries.get(&key).and_then(|raw| parse_start_time(raw)) {
            return Ok(stored);
        }

        entries.insert(key, now_ms.to_string());
        Ok(now_ms)
    }
}

/// JSON file of `key -> start time`, the native counterpart of browser local
/// storage.
#[derive(Debug)]
pub struct FileStartTimeStore {
    path: PathBuf,
    write_lock: tokio::sync::Mutex<()>,
}

impl FileStartTimeStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_entries(&self) -> Result<HashMap<String, String>> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) if contents.trim().is_empty() => Ok(HashMap::new()),
            Ok(contents) => serde_json::from_str(&contents)
                .with_context(|| format!("Corrupt start time file {}", self.path.display())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(HashMap::new()),
            Err(e) => Err(e)
                .with_context(|| format!("Failed to read start time file {}", self.path.display())),
        }
    }

    async fn write_entries(&self, entries: &HashMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, serde_json::to_vec_pretty(entries)?)
            .await
            .with_context(|| format!("Failed to write {}", tmp.display()))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .with_context(|| format!("Failed to replace {}", self.path.display()))?;
        Ok(())
    }
}

#[async_trait]
impl StartTimeStore for FileStartTimeStore {
    async fn read_or_init(&self, token: &str, now_ms: i64) -> Result<i64> {
        track_store_operation("file", async {
            let _guard = self.write_lock.lock().await;
            let mut entries = self.read_entries().await?;
            let key = start_time_key(token);

            if let Some(stored) = entries.get(&key).and_then(|raw| parse_start_time(raw)) {
                return Ok(stored);
            }

            entries.insert(key, now_ms.to_string());
            self.write_entries(&entries).await?;
            Ok(now_ms)
        })
        .await
    }
}

/// Shared store so every client of the same token sees one start time.
#[derive(Clone)]
pub struct RedisStartTimeStore {
    redis: ConnectionManager,
}

impl RedisStartTimeStore {
    pub async fn connect(redis_uri: &str) -> Result<Self> {
        let client = redis::Client::open(redis_uri).context("Invalid Redis URI")?;

        tracing::info!("Attempting to connect to Redis...");
        let redis = tokio::time::timeout(
            std::time::Duration::from_secs(10),
            ConnectionManager::new(client),
        )
        .await
        .map_err(|_| anyhow::anyhow!("Redis connection timeout after 10s"))??;

        let mut conn = redis.clone();
        tokio::time::timeout(
            std::time::Duration::from_secs(5),
            redis::cmd("PING").query_async::<String>(&mut conn),
        )
        .await
        .map_err(|_| anyhow::anyhow!("Redis PING timeout after 5s"))??;

        tracing::info!("Redis connection established successfully");
        Ok(Self { redis })
    }

    pub fn from_connection(redis: ConnectionManager) -> Self {
        Self { redis }
    }
}

#[async_trait]
impl StartTimeStore for RedisStartTimeStore {
    async fn read_or_init(&self, token: &str, now_ms: i64) -> Result<i64> {
        let mut conn = self.redis.clone();
        let key = start_time_key(token);

        track_store_operation("redis", async {
            // SET NX keeps the first writer's value
            let created: Option<String> = redis::cmd("SET")
                .arg(&key)
                .arg(now_ms)
                .arg("NX")
                .query_async(&mut conn)
                .await
                .context("Failed to initialize start time in Redis")?;
            if created.is_some() {
                return Ok(now_ms);
            }

            let stored: Option<String> = redis::cmd("GET")
                .arg(&key)
                .query_async(&mut conn)
                .await
                .context("Failed to read start time from Redis")?;
            if let Some(start) = stored.as_deref().and_then(parse_start_time) {
                return Ok(start);
            }

            tracing::warn!("Replacing unparsable start time for key {}", key);
            redis::cmd("SET")
                .arg(&key)
                .arg(now_ms)
                .query_async::<()>(&mut conn)
                .await
                .context("Failed to reset start time in Redis")?;
            Ok(now_ms)
        })
        .await
    }
}
