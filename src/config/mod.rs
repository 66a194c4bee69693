//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! environment variables / key-value store      TOML file
//!     → schema.rs (CaptureConfig::from_lookup)  → loader.rs (parse & deserialize)
//!     → CaptureConfig (immutable)
//!     → compiled once into HeaderCapture per middleware
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded
//! - All fields have defaults; the default captures nothing
//! - Bad regex patterns are not a load error, they are reported when compiled

pub mod loader;
pub mod schema;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::CaptureConfig;
