#![warn(clippy::unwrap_used)]

pub mod config;
pub mod error;
pub mod loader;
pub mod settings;

pub use config::*;
pub use error::*;
pub use loader::*;
pub use settings::*;
