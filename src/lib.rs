pub mod config;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod payload_store;
pub mod report;
pub mod web;
