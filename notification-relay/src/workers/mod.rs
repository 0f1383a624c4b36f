pub mod subscriber;

pub use subscriber::SubscriberLoop;
