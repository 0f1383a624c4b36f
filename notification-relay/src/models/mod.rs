pub mod notification;

pub use notification::{ErrorResponse, HistoryResponse, Notification, STATUS_SUCCESS};
