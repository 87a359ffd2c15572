//! Configuration module for the gateway.
//!
//! Handles workgroup resolution, environment variables, and settings.

mod settings;

pub use settings::{
    expand_env_vars, PollSettings, ResponseSettings, Settings, SettingsError, WarehouseSettings,
};
