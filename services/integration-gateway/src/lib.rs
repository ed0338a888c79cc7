//! Integration Gateway - resilient edge for Talent Platform integrations.
//!
//! This crate hosts the deployable edge of the platform's resilience layer:
//! inbound admission control (rate limiting with quota headers), outbound
//! integration clients built on the resilient executor, and operational
//! endpoints for breaker and rate-limit recovery.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod admin;
pub mod config;
pub mod error;
pub mod gate;
pub mod handlers;
pub mod integrations;
pub mod observability;
pub mod routes;
pub mod shutdown;
pub mod state;

pub use config::{Config, ConfigError};
pub use error::{ErrorCode, GatewayError};
pub use state::AppState;
