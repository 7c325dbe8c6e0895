//! Redis integration.

mod client;

pub use client::RedisFlagStore;
