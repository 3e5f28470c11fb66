//! haab-core — shared configuration and naming conventions.
//!
//! Everything that more than one Haab crate needs to agree on lives here:
//! the `haab.toml` configuration schema and the container naming scheme
//! that maps application names onto runtime container names.

pub mod config;
pub mod naming;

pub use config::{DockerConfig, HaabConfig, ServerConfig};
pub use naming::{
    app_name_from_container, container_name, is_managed, validate_app_name, CONTAINER_PREFIX,
};
