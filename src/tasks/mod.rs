//! Background Tasks Module
//!
//! Contains the background worker that runs alongside a cache.
//!
//! # Tasks
//! - TTL Expiration: deletes entries when their deadline passes

mod expiry;

pub use expiry::{ExpiryScheduler, ExpiryTarget};
