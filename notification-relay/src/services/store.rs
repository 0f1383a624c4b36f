use async_trait::async_trait;
use redis::{aio::ConnectionManager, Client};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use super::error::RelayError;

/// List primitives the relay needs from the shared store, bound to one key.
///
/// Each call is atomic on its own; callers must not assume two calls are.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Insert `payload` at the head of the list (LPUSH).
    async fn push_front(&self, payload: &str) -> Result<(), RelayError>;

    /// Keep only the first `keep` entries (LTRIM key 0 keep-1).
    async fn trim(&self, keep: usize) -> Result<(), RelayError>;

    /// Every entry in stored order (LRANGE key 0 -1).
    async fn range_all(&self) -> Result<Vec<String>, RelayError>;

    async fn health_check(&self) -> Result<(), RelayError>;
}

#[derive(Clone)]
pub struct RedisHistoryStore {
    _client: Client,
    manager: ConnectionManager,
    key: String,
}

impl RedisHistoryStore {
    pub async fn connect(url: &str, key: &str) -> Result<Self, RelayError> {
        tracing::info!(url = %url, key = %key, "Connecting history store to Redis");
        let client = Client::open(url).map_err(RelayError::store)?;

        // ConnectionManager reconnects on its own after a dropped connection
        let manager = client.get_connection_manager().await.map_err(|e| {
            tracing::error!("Failed to get Redis connection manager: {}", e);
            RelayError::store(anyhow::anyhow!("Failed to connect to Redis: {}", e))
        })?;

        tracing::info!("History store connected");

        Ok(Self {
            _client: client,
            manager,
            key: key.to_string(),
        })
    }
}

#[async_trait]
impl HistoryStore for RedisHistoryStore {
    async fn push_front(&self, payload: &str) -> Result<(), RelayError> {
        let mut conn = self.manager.clone();
        redis::cmd("LPUSH")
            .arg(&self.key)
            .arg(payload)
            .query_async::<_, i64>(&mut conn)
            .await
            .map(|_| ())
            .map_err(|e| RelayError::store(anyhow::anyhow!("LPUSH {} failed: {}", self.key, e)))
    }

    async fn trim(&self, keep: usize) -> Result<(), RelayError> {
        let mut conn = self.manager.clone();
        // LTRIM 0 -1 keeps everything, so an empty range needs start > stop
        let (start, stop) = match keep {
            0 => (1, 0),
            n => (0, n as i64 - 1),
        };
        redis::cmd("LTRIM")
            .arg(&self.key)
            .arg(start)
            .arg(stop)
            .query_async::<_, ()>(&mut conn)
            .await
            .map_err(|e| RelayError::store(anyhow::anyhow!("LTRIM {} failed: {}", self.key, e)))
    }

    async fn range_all(&self) -> Result<Vec<String>, RelayError> {
        let mut conn = self.manager.clone();
        redis::cmd("LRANGE")
            .arg(&self.key)
            .arg(0)
            .arg(-1)
            .query_async::<_, Vec<String>>(&mut conn)
            .await
            .map_err(|e| RelayError::store(anyhow::anyhow!("LRANGE {} failed: {}", self.key, e)))
    }

    async fn health_check(&self) -> Result<(), RelayError> {
        let mut conn = self.manager.clone();
        redis::cmd("PING")
            .query_async::<_, String>(&mut conn)
            .await
            .map(|_| ())
            .map_err(|e| RelayError::store(anyhow::anyhow!("Redis health check failed: {}", e)))
    }
}

/// Process-local store with an outage switch, for tests and local runs.
pub struct InMemoryHistoryStore {
    entries: Mutex<VecDeque<String>>,
    available: AtomicBool,
    push_attempts: AtomicUsize,
}

impl Default for InMemoryHistoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryHistoryStore {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(VecDeque::new()),
            available: AtomicBool::new(true),
            push_attempts: AtomicUsize::new(0),
        }
    }

    /// Simulate the store going down (`false`) or coming back (`true`).
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Number of `push_front` calls so far, including failed ones.
    pub fn push_attempts(&self) -> usize {
        self.push_attempts.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|entries| entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn ensure_available(&self) -> Result<(), RelayError> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(RelayError::store(anyhow::anyhow!("store unavailable")))
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, VecDeque<String>>, RelayError> {
        self.entries
            .lock()
            .map_err(|e| RelayError::store(anyhow::anyhow!("History mutex poisoned: {}", e)))
    }
}

#[async_trait]
impl HistoryStore for InMemoryHistoryStore {
    async fn push_front(&self, payload: &str) -> Result<(), RelayError> {
        self.push_attempts.fetch_add(1, Ordering::SeqCst);
        self.ensure_available()?;
        self.lock()?.push_front(payload.to_string());
        Ok(())
    }

    async fn trim(&self, keep: usize) -> Result<(), RelayError> {
        self.ensure_available()?;
        self.lock()?.truncate(keep);
        Ok(())
    }

    async fn range_all(&self) -> Result<Vec<String>, RelayError> {
        self.ensure_available()?;
        Ok(self.lock()?.iter().cloned().collect())
    }

    async fn health_check(&self) -> Result<(), RelayError> {
        self.ensure_available()
    }
}
