//! TOML / environment configuration for building a [`crate::Jenkins`] client

pub mod interpolation;
pub mod loader;
pub mod schema;

pub use interpolation::interpolate;
pub use loader::{
    ConfigLoadError,
    ConfigLoadResult,
};
pub use schema::{
    ClientConfig,
    HttpConfig,
    ServerConfig,
};
