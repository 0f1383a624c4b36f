use backoff::backoff::Backoff;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::RetryConfig;
use crate::services::{
    record_message_received, record_receive_error, record_store_error, HistoryBuffer,
    NotificationSource, RelayError,
};

/// Background task that moves bus messages into the history buffer.
///
/// Runs until `shutdown` is cancelled. Receive and store failures are logged
/// and never end the loop.
pub struct SubscriberLoop {
    source: Box<dyn NotificationSource>,
    history: HistoryBuffer,
    retry: RetryConfig,
    channel: String,
    shutdown: CancellationToken,
}

impl SubscriberLoop {
    pub fn new(
        source: Box<dyn NotificationSource>,
        history: HistoryBuffer,
        retry: RetryConfig,
        channel: impl Into<String>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            source,
            history,
            retry,
            channel: channel.into(),
            shutdown,
        }
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    pub async fn run(mut self) {
        let mut backoff = self.retry.backoff();

        tracing::info!(
            channel = %self.channel,
            history_limit = self.history.limit(),
            "Notification subscriber listening"
        );

        loop {
            let received = tokio::select! {
                _ = self.shutdown.cancelled() => break,
                received = self.source.receive() => received,
            };

            match received {
                Ok(payload) => {
                    backoff.reset();
                    persist(&self.history, &self.channel, &payload).await;
                }
                Err(e) => {
                    record_receive_error(error_kind(&e));
                    let delay = self.retry.next_delay(&mut backoff);
                    tracing::error!(
                        channel = %self.channel,
                        error = %e,
                        retry_in_ms = delay.as_millis() as u64,
                        "Failed to receive notification"
                    );

                    if delay.is_zero() {
                        // Immediate retry still yields so a dead bus cannot starve the runtime
                        tokio::task::yield_now().await;
                        continue;
                    }

                    tokio::select! {
                        _ = self.shutdown.cancelled() => break,
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }

        tracing::info!(channel = %self.channel, "Notification subscriber stopped");
    }
}

async fn persist(history: &HistoryBuffer, channel: &str, payload: &str) {
    record_message_received();

    match history.record(payload).await {
        Ok(()) => {
            tracing::info!(channel = %channel, payload = %payload, "Notification received");
        }
        Err(e) => {
            record_store_error("record");
            tracing::error!(channel = %channel, error = %e, "Failed to store notification");
        }
    }
}

fn error_kind(err: &RelayError) -> &'static str {
    match err {
        RelayError::Transport(_) => "transport",
        RelayError::Payload(_) => "payload",
        RelayError::Closed => "closed",
        RelayError::Store(_) => "store",
        RelayError::Serialization(_) => "serialization",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::{ChannelSource, InMemoryHistoryStore};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::mpsc::UnboundedSender;

    struct Harness {
        store: Arc<InMemoryHistoryStore>,
        history: HistoryBuffer,
        tx: UnboundedSender<Result<String, RelayError>>,
        shutdown: CancellationToken,
        handle: JoinHandle<()>,
    }

    fn retry(initial_delay_ms: u64, max_delay_ms: u64) -> RetryConfig {
        RetryConfig {
            initial_delay_ms,
            max_delay_ms,
            multiplier: 2.0,
            jitter: false,
        }
    }

    fn start(retry: RetryConfig) -> Harness {
        let store = Arc::new(InMemoryHistoryStore::new());
        let history = HistoryBuffer::new(store.clone(), 50);
        let (source, tx) = ChannelSource::new();
        let shutdown = CancellationToken::new();

        let handle = SubscriberLoop::new(
            Box::new(source),
            history.clone(),
            retry,
            "lelang_notifications",
            shutdown.clone(),
        )
        .spawn();

        Harness {
            store,
            history,
            tx,
            shutdown,
            handle,
        }
    }

    async fn wait_for_len(store: &InMemoryHistoryStore, len: usize) {
        for _ in 0..200 {
            if store.len() == len {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("history never reached {} entries (has {})", len, store.len());
    }

    async fn wait_for_attempts(store: &InMemoryHistoryStore, attempts: usize) {
        for _ in 0..200 {
            if store.push_attempts() >= attempts {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("subscriber never attempted {} writes", attempts);
    }

    async fn stop(harness: Harness) {
        harness.shutdown.cancel();
        tokio::time::timeout(Duration::from_secs(1), harness.handle)
            .await
            .expect("subscriber did not stop")
            .unwrap();
    }

    #[tokio::test]
    async fn records_messages_in_receive_order() {
        let harness = start(retry(1, 5));

        for payload in ["one", "two", "three"] {
            harness.tx.send(Ok(payload.to_string())).unwrap();
        }
        wait_for_len(&harness.store, 3).await;

        assert_eq!(
            harness.history.snapshot().await.unwrap(),
            vec!["three", "two", "one"]
        );
        stop(harness).await;
    }

    #[tokio::test]
    async fn keeps_running_after_receive_errors() {
        let harness = start(retry(1, 5));

        harness
            .tx
            .send(Err(RelayError::transport(anyhow::anyhow!("connection reset"))))
            .unwrap();
        harness
            .tx
            .send(Err(RelayError::Payload("invalid utf-8".to_string())))
            .unwrap();
        harness.tx.send(Ok("after-errors".to_string())).unwrap();
        wait_for_len(&harness.store, 1).await;

        assert_eq!(harness.history.snapshot().await.unwrap(), vec!["after-errors"]);
        assert!(!harness.handle.is_finished());
        stop(harness).await;
    }

    #[tokio::test]
    async fn store_outage_drops_message_and_continues() {
        let harness = start(retry(1, 5));

        harness.tx.send(Ok("stored".to_string())).unwrap();
        wait_for_len(&harness.store, 1).await;

        harness.store.set_available(false);
        harness.tx.send(Ok("lost".to_string())).unwrap();
        wait_for_attempts(&harness.store, 2).await;
        harness.store.set_available(true);

        harness.tx.send(Ok("stored-again".to_string())).unwrap();
        wait_for_len(&harness.store, 2).await;

        assert_eq!(
            harness.history.snapshot().await.unwrap(),
            vec!["stored-again", "stored"]
        );
        stop(harness).await;
    }

    #[tokio::test]
    async fn cancellation_interrupts_retry_delay() {
        let harness = start(retry(60_000, 60_000));
        harness
            .tx
            .send(Err(RelayError::transport(anyhow::anyhow!("bus down"))))
            .unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        stop(harness).await;
    }

    #[tokio::test]
    async fn immediate_retry_does_not_block_shutdown() {
        let harness = start(retry(0, 0));
        for _ in 0..100 {
            harness
                .tx
                .send(Err(RelayError::transport(anyhow::anyhow!("bus down"))))
                .unwrap();
        }
        harness.tx.send(Ok("recovered".to_string())).unwrap();
        wait_for_len(&harness.store, 1).await;

        stop(harness).await;
    }
}
