//! HTTP endpoint handlers for the profiler.
//!
//! This module provides handlers for all HTTP endpoints:
//! - `/dump`: Text dump of every collection
//! - `/dump/custom`: Text dump of the custom collection (DELETE ends it)
//! - `/dump/proto`: Protobuf dump of every collection
//! - `/resource-usage`: Latest mirrored resource usage as JSON
//! - `/collect/*`: Wake-up, user-switch and custom collection triggers
//! - `/metrics`: Prometheus metrics endpoint
//! - `/health`: Health check endpoint

pub mod collect;
pub mod dump;
pub mod health;
pub mod metrics;

// Re-export handlers
pub use collect::{custom_handler, end_custom_handler, user_switch_handler, wake_up_handler};
pub use dump::{custom_dump_handler, dump_handler, proto_dump_handler, resource_usage_handler};
pub use health::health_handler;
pub use metrics::metrics_handler;
