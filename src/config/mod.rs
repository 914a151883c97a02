// src/config/mod.rs

//! Configuration: raw values from an optional TOML file plus CLI flags,
//! validated into the [`Config`] the engine runs with.

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{load_from_path, overlay_cli, resolve};
pub use model::{Config, RawConfig};
pub use validate::parse_duration;
