//! INI parsing logic for converting `Ini` → `ConfigFile`.
//!
//! Farm settings are read through [`SettingKey`], so the INI path clamps
//! exactly like the key-value path does.

use ini::Ini;
use std::path::PathBuf;

use super::file::ConfigFileError;
use super::keys::{SettingKey, SettingKeyError};
use super::settings::ConfigFile;

/// Parse an `Ini` object into a `ConfigFile`.
///
/// Starts from `ConfigFile::default()` and overlays any values found in the INI.
pub(super) fn parse_ini(ini: &Ini) -> Result<ConfigFile, ConfigFileError> {
    let mut config = ConfigFile::default();

    for key in SettingKey::all() {
        let Some(value) = ini
            .section(Some(key.section()))
            .and_then(|section| section.get(key.field()))
        else {
            continue;
        };

        key.set(&mut config.farm, value).map_err(|e| {
            let reason = match e {
                SettingKeyError::InvalidValue { reason, .. } => reason,
                SettingKeyError::UnknownKey(k) => format!("unknown key {k}"),
            };
            ConfigFileError::InvalidValue {
                section: key.section().to_string(),
                key: key.field().to_string(),
                value: value.to_string(),
                reason,
            }
        })?;
    }

    // [logging] section
    if let Some(section) = ini.section(Some("logging")) {
        if let Some(v) = section.get("file") {
            let v = v.trim();
            if !v.is_empty() {
                config.logging.file = expand_tilde(v);
            }
        }
        if let Some(v) = section.get("debug") {
            config.logging.debug = match v.trim().to_lowercase().as_str() {
                "true" | "yes" | "on" | "1" => true,
                "false" | "no" | "off" | "0" | "" => false,
                _ => {
                    return Err(ConfigFileError::InvalidValue {
                        section: "logging".to_string(),
                        key: "debug".to_string(),
                        value: v.to_string(),
                        reason: "must be true or false".to_string(),
                    })
                }
            };
        }
    }

    Ok(config)
}

/// Expands a leading `~/` to the home directory.
pub(super) fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}
