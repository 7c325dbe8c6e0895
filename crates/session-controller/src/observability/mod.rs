//! Health endpoints and Prometheus metrics.

pub mod health;
pub mod metrics;

pub use health::{health_router, spawn_readiness_guard, HealthState};
