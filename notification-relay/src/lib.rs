//! notification-relay: buffers pub/sub notifications and serves the most
//! recent ones over HTTP.
pub mod config;
pub mod handlers;
pub mod models;
pub mod services;
pub mod startup;
pub mod workers;
