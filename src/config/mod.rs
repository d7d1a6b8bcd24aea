//! Configuration management
//!
//! Connection settings come from the environment; user preferences from
//! an optional TOML file.

pub mod connections;
pub mod settings;

pub use connections::{ConnectionConfig, SslMode};
pub use settings::{Settings, load_settings, or_default};
