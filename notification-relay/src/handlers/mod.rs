//! HTTP handlers.
//!
//! `notifications` is the public relay surface; `health` serves the admin
//! listener (probes and metrics).

pub mod health;
pub mod notifications;

pub use health::{health_check, metrics_endpoint, readiness_check};
pub use notifications::{list_notifications, method_not_allowed};
