//! Bounded, newest-first notification history on top of a [`HistoryStore`].

use std::sync::Arc;

use super::error::RelayError;
use super::store::HistoryStore;
use crate::models::Notification;

/// Handle to the shared history buffer.
///
/// Cheap to clone; every clone talks to the same store. The subscriber is
/// the only writer, handlers only read.
#[derive(Clone)]
pub struct HistoryBuffer {
    store: Arc<dyn HistoryStore>,
    limit: usize,
}

impl HistoryBuffer {
    pub fn new(store: Arc<dyn HistoryStore>, limit: usize) -> Self {
        Self { store, limit }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn store(&self) -> &Arc<dyn HistoryStore> {
        &self.store
    }

    /// Push `payload` to the front, then cut the list back to `limit`.
    ///
    /// The two steps are separate store calls, so a concurrent reader can
    /// briefly see `limit + 1` entries.
    pub async fn record(&self, payload: &str) -> Result<(), RelayError> {
        self.store.push_front(payload).await?;
        self.store.trim(self.limit).await
    }

    /// Current contents in stored order, newest first.
    pub async fn snapshot(&self) -> Result<Vec<Notification>, RelayError> {
        self.store.range_all().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::store::InMemoryHistoryStore;

    fn buffer(limit: usize) -> (HistoryBuffer, Arc<InMemoryHistoryStore>) {
        let store = Arc::new(InMemoryHistoryStore::new());
        (HistoryBuffer::new(store.clone(), limit), store)
    }

    #[tokio::test]
    async fn empty_buffer_snapshot_is_empty() {
        let (history, _) = buffer(50);
        assert!(history.snapshot().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn length_is_min_of_received_and_limit() {
        for n in [0usize, 1, 49, 50, 51, 120] {
            let (history, _) = buffer(50);
            for i in 0..n {
                history.record(&format!("m{}", i + 1)).await.unwrap();
            }
            assert_eq!(history.snapshot().await.unwrap().len(), n.min(50), "n = {}", n);
        }
    }

    #[tokio::test]
    async fn fifty_first_message_evicts_the_oldest() {
        let (history, _) = buffer(50);
        for i in 1..=51 {
            history.record(&format!("m{}", i)).await.unwrap();
        }

        let expected: Vec<String> = (2..=51).rev().map(|i| format!("m{}", i)).collect();
        assert_eq!(history.snapshot().await.unwrap(), expected);
    }

    #[tokio::test]
    async fn payloads_pass_through_verbatim() {
        let (history, _) = buffer(50);
        let payload = r#"{"item_id": 7, "bid": "1.000.000", "note": "tawaran baru 🔔"}"#;
        history.record(payload).await.unwrap();
        history.record("").await.unwrap();

        assert_eq!(history.snapshot().await.unwrap(), vec!["".to_string(), payload.to_string()]);
    }

    #[tokio::test]
    async fn failed_push_leaves_buffer_untouched() {
        let (history, store) = buffer(3);
        history.record("a").await.unwrap();

        store.set_available(false);
        assert!(history.record("b").await.is_err());
        store.set_available(true);

        assert_eq!(history.snapshot().await.unwrap(), vec!["a"]);
    }
}
