//! Self-healing BIOS configuration.

pub mod config;

pub use config::{BiosConfig, HealingStrategy};
