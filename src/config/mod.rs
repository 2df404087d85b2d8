//! Configuration module for Fibre-Scout
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//! Every section is optional; an empty file yields the production defaults.
//!
//! # Example
//!
//! ```no_run
//! use fibre_scout::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("scout.toml")).unwrap();
//! println!("Navigation timeout: {}s", config.browser.navigation_timeout_secs);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{AiConfig, BrowserConfig, Config, ProviderEntry, ServiceConfig};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
