//! Session Controller (SC) Service Library
//!
//! Orchestrates multi-participant sessions:
//!
//! - First-fit assignment of arriving participants to bounded-capacity sessions
//! - Per-session rosters in insertion order
//! - A timed phase scheduler per started session that broadcasts each phase
//!   to the current roster
//! - A durable "started" flag per session so a session is never started twice
//!
//! # Architecture
//!
//! ```text
//! transport (WebSocket) ──▶ SessionGateway ──▶ SessionRegistryActor
//!                               │                 ├── Session rosters
//!                               │                 └── PhaseScheduler tasks ──▶ Broadcaster
//!                               └──▶ SessionFlagStore (Redis)
//! ```
//!
//! # Modules
//!
//! - [`actors`] - Registry actor and phase schedulers
//! - [`phases`] - Phase timeline and event content
//! - [`gateway`] - Join/leave/start entry points
//! - [`config`] - Service configuration from environment
//! - [`errors`] - Error types with client-facing codes

pub mod actors;
pub mod broadcast;
pub mod config;
pub mod errors;
pub mod flags;
pub mod gateway;
pub mod models;
pub mod observability;
pub mod phases;
pub mod provider;
pub mod redis;
pub mod transport;
