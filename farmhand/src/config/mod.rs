//! Configuration for the farming engine.
//!
//! - [`FarmSettings`]: validated parameters read by every Farmer step
//! - [`SettingKey`]: `section.key` access with parsing and clamping
//! - [`SettingsHandle`]: the shared store, with change subscription
//! - [`ConfigFile`]: INI persistence at `~/.farmhand/config.ini`
//!
//! ```
//! use farmhand::config::{SettingKey, SettingsHandle};
//!
//! let settings = SettingsHandle::default();
//! settings.set(SettingKey::CommandCeiling, "5000").unwrap();
//! assert_eq!(settings.snapshot().command_ceiling, 1000); // clamped
//! ```

mod defaults;
mod file;
mod keys;
mod parser;
mod settings;
mod store;
mod writer;

pub use defaults::*;
pub(crate) use defaults::clamp_setting;
pub use file::{config_directory, config_file_path, ConfigFileError};
pub use keys::{SettingKey, SettingKeyError};
pub use settings::{ConfigFile, FarmSettings, LoggingSettings};
pub use store::SettingsHandle;
