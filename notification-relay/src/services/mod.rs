pub mod bus;
pub mod error;
pub mod history;
pub mod metrics;
pub mod store;

pub use bus::{ChannelSource, NotificationSource, RedisSubscriber};
pub use error::RelayError;
pub use history::HistoryBuffer;
pub use self::metrics::{
    get_metrics, init_metrics, record_history_read, record_message_received,
    record_receive_error, record_store_error,
};
pub use store::{HistoryStore, InMemoryHistoryStore, RedisHistoryStore};
