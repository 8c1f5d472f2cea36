// src/config/mod.rs

//! Task registry loading and validation.
//!
//! Responsibilities:
//! - Define the TOML-backed document model (`model.rs`).
//! - Load a task file from disk (`loader.rs`).
//! - Validate references, bodies and cycles (`validate.rs`).
//! - Expand `${name}` variables (`vars.rs`).
//! - Resolve identifiers into task definitions (`registry.rs`).

pub mod loader;
pub mod model;
pub mod registry;
pub mod validate;
pub mod vars;

pub use loader::{default_config_path, load_and_validate, load_from_path};
pub use model::{ConfigFile, ConfigSection, RawConfigFile, TaskConfig};
pub use registry::{RegistryBuilder, TaskDefinition, TaskRegistry};
pub use validate::validate_config;
pub use vars::{expand_vars, unresolved_vars};
