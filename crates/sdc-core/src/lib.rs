//! # sdc-core
//!
//! Core types, traits, and abstractions for secure document containers.
//!
//! This crate provides the data model, error taxonomy, configuration and
//! store trait that the container pipeline in `sdc-container` builds on.

pub mod config;
pub mod defaults;
pub mod error;
pub mod events;
pub mod models;
pub mod traits;

// Re-export commonly used types at crate root
pub use config::SdcConfig;
pub use error::{AccessDenial, Error, Result};
pub use events::{ContainerEvent, EventBus, EventEnvelope};
pub use models::*;
pub use traits::*;
