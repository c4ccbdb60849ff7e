// src/config/mod.rs

//! Configuration loading and validation for taskmaster.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a config file from disk (`loader.rs`).
//! - Validate field constraints and turn raw programs into `ProgramSpec`s
//!   (`validate.rs`).
//! - Abstract where the coordinator re-reads config from on reload
//!   (`source.rs`).

pub mod loader;
pub mod model;
pub mod source;
pub mod validate;

pub use loader::{load_and_validate, load_from_path, parse_and_validate};
pub use model::{ConfigFile, ProgramConfig, ProgramSpec, RawConfigFile, ALL_JOBS};
pub use source::{ConfigSource, FileConfigSource};
