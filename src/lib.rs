//! Competing versions of a deal, each a bundle of priced line items, with at
//! most one syncing version per parent record.

pub mod config;
pub mod db;
pub mod error;
pub mod settings;
pub mod versions;

pub use config::{Config, VersionsConfig};
pub use error::{ConfigError, DatabaseError, VersionError};
pub use settings::Settings;
