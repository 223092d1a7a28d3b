//! Domain Layer - Core streaming types and subscription state.
//!
//! This layer contains the pure types for the streaming session with no
//! I/O: instrument identity and the per-class subscription registry.

/// Instrument keys and data classes.
pub mod instrument;

/// Subscription intent tracking.
pub mod subscription;
