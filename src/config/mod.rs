/// Database connection and table management
pub mod database;

/// Seed datagroup configuration from config.toml
pub mod datagroups;

pub use datagroups::{Config, load_config, load_default_config};
