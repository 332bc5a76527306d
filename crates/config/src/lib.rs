//! Configuration for the wisp transport core.
//!
//! Config files: `wisp.toml` or `wisp.json`, both optional; every field has a
//! default. Supports `${ENV_VAR}` substitution in all string values.

pub mod env_subst;
pub mod error;
pub mod loader;
pub mod schema;

pub use {
    error::{Error, Result},
    loader::{discover_and_load, load_config, parse_config},
    schema::{CommsConfig, DirectConfig, IndirectConfig},
};
