//! Configuration module for livehttpx
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use livehttpx::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("livehttpx.toml")).unwrap();
//! println!("Scanning with concurrency: {}", config.engine.concurrency);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    Config, EngineConfig, InputConfig, OutputConfig, OutputFormat, ProbeConfig, ProbeMethod,
    RetryConfig,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};

pub use validation::{validate, validate_concurrency, MAX_ATTEMPTS, MAX_CONCURRENCY};
