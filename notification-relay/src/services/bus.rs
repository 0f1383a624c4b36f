use async_trait::async_trait;
use futures::stream::{BoxStream, StreamExt};
use redis::{Client, Msg};
use tokio::sync::mpsc;

use super::error::RelayError;

/// A standing subscription that yields one payload per call.
///
/// Implementations own their reconnect logic: after an error the caller
/// simply calls `receive` again.
#[async_trait]
pub trait NotificationSource: Send {
    async fn receive(&mut self) -> Result<String, RelayError>;
}

/// Redis pub/sub subscription to a single channel.
///
/// Connects lazily on the first `receive` and again after the stream ends,
/// so a bus outage surfaces as receive errors instead of a startup failure.
pub struct RedisSubscriber {
    client: Client,
    channel: String,
    messages: Option<BoxStream<'static, Msg>>,
}

impl RedisSubscriber {
    pub fn new(url: &str, channel: &str) -> Result<Self, RelayError> {
        let client = Client::open(url).map_err(RelayError::transport)?;
        Ok(Self {
            client,
            channel: channel.to_string(),
            messages: None,
        })
    }
}

// Free function so the receive future only borrows `Client`, which is Sync.
async fn subscribe(client: &Client, channel: &str) -> Result<BoxStream<'static, Msg>, RelayError> {
    let mut pubsub = client
        .get_async_pubsub()
        .await
        .map_err(RelayError::transport)?;
    pubsub
        .subscribe(channel)
        .await
        .map_err(RelayError::transport)?;

    tracing::info!(channel = %channel, "Subscribed to notification channel");

    Ok(pubsub.into_on_message().boxed())
}

#[async_trait]
impl NotificationSource for RedisSubscriber {
    async fn receive(&mut self) -> Result<String, RelayError> {
        if self.messages.is_none() {
            self.messages = Some(subscribe(&self.client, &self.channel).await?);
        }

        let next = match self.messages.as_mut() {
            Some(messages) => messages.next().await,
            None => None,
        };

        match next {
            Some(msg) => msg
                .get_payload::<String>()
                .map_err(|e| RelayError::Payload(e.to_string())),
            None => {
                self.messages = None;
                Err(RelayError::Closed)
            }
        }
    }
}

/// In-process source fed through an mpsc channel.
///
/// Tests push `Ok(payload)` to simulate a published message and `Err(..)` to
/// simulate a failed receive. Once every sender is dropped, `receive`
/// reports `Closed`.
pub struct ChannelSource {
    rx: mpsc::UnboundedReceiver<Result<String, RelayError>>,
}

impl ChannelSource {
    pub fn new() -> (Self, mpsc::UnboundedSender<Result<String, RelayError>>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { rx }, tx)
    }
}

#[async_trait]
impl NotificationSource for ChannelSource {
    async fn receive(&mut self) -> Result<String, RelayError> {
        match self.rx.recv().await {
            Some(result) => result,
            None => Err(RelayError::Closed),
        }
    }
}
