//! Infrastructure Layer
//!
//! External integrations: TradeHub session control and streaming
//! adapters, configuration management.

pub mod config;
pub mod tradehub;
