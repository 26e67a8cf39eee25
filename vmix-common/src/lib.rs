//! # vmix Common Library
//!
//! Shared code for the vmix services:
//! - Error type used during startup and configuration
//! - Configuration loading (CLI → ENV → TOML → compiled defaults)
//! - Human-readable duration formatting for logs

pub mod config;
pub mod error;
pub mod human_time;

pub use config::{CompiledDefaults, ConfigOverrides, ConfigResolver, LoggingConfig, ServiceConfig, TomlConfig};
pub use error::{Error, Result};
