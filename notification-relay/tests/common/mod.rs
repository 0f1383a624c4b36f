use notification_relay::config::RelayConfig;
use notification_relay::services::{ChannelSource, InMemoryHistoryStore, RelayError};
use notification_relay::startup::Application;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;

pub struct TestApp {
    pub http_address: String,
    pub admin_address: String,
    pub store: Arc<InMemoryHistoryStore>,
    pub bus: UnboundedSender<Result<String, RelayError>>,
    pub shutdown: CancellationToken,
}

impl TestApp {
    pub async fn spawn() -> Self {
        let mut config = RelayConfig::default();
        // Random ports for testing
        config.port = 0;
        config.admin.port = 0;
        config.relay.retry.initial_delay_ms = 1;
        config.relay.retry.max_delay_ms = 10;

        let store = Arc::new(InMemoryHistoryStore::new());
        let (source, bus) = ChannelSource::new();

        let app = Application::build_with(config, store.clone(), Box::new(source))
            .await
            .expect("Failed to build test application");

        let http_address = format!("http://127.0.0.1:{}", app.http_port());
        let admin_address = format!("http://127.0.0.1:{}", app.admin_port());
        let shutdown = app.shutdown_token();

        tokio::spawn(async move {
            app.run_until_stopped().await.ok();
        });

        // Wait for the admin server to accept connections
        let client = reqwest::Client::new();
        let health_url = format!("{}/health", admin_address);
        for _ in 0..50 {
            if client.get(&health_url).send().await.is_ok() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }

        TestApp {
            http_address,
            admin_address,
            store,
            bus,
            shutdown,
        }
    }

    /// Publish a payload as if it arrived on the bus.
    pub fn publish(&self, payload: &str) {
        self.bus
            .send(Ok(payload.to_string()))
            .expect("subscriber is gone");
    }

    /// Wait until the subscriber has stored `len` entries.
    pub async fn wait_for_history(&self, len: usize) {
        for _ in 0..200 {
            if self.store.len() == len {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!(
            "history never reached {} entries (has {})",
            len,
            self.store.len()
        );
    }

    /// Wait until the subscriber has tried `attempts` writes, stored or not.
    pub async fn wait_for_attempts(&self, attempts: usize) {
        for _ in 0..200 {
            if self.store.push_attempts() >= attempts {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("subscriber never attempted {} writes", attempts);
    }

    pub async fn get_notifications(&self) -> reqwest::Response {
        reqwest::Client::new()
            .get(format!("{}/notifications", self.http_address))
            .header("origin", "http://flutter.local")
            .send()
            .await
            .expect("Failed to execute request")
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}
