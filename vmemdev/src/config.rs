//! Device startup configuration
//!
//! Mirrors load-time module parameters: the device name and the size of
//! its buffer. Values come either from `key=value` parameters or from a
//! JSON object.

use serde::Deserialize;
use std::io;

use crate::error::ConfigError;

/// Name the device is attached under when none is configured
pub const DEFAULT_NAME: &str = "vmemdev";

/// Buffer size used when none is configured (1 MiB)
pub const DEFAULT_BUF_SIZE: usize = 1 << 20;

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct DeviceConfig {
    /// Name the store is attached under, reachable as `/dev/<name>`
    pub name: String,
    /// Capacity of the store in bytes
    pub buf_size: usize,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_NAME.to_string(),
            buf_size: DEFAULT_BUF_SIZE,
        }
    }
}

impl DeviceConfig {
    /// Parse module-parameter style settings such as `buf_size=4096`.
    ///
    /// Settings not given keep their defaults. A zero `buf_size` is
    /// accepted here and rejected when the device is initialized.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - A parameter has no `=`
    /// - The key is not `name` or `buf_size`
    /// - `buf_size` is not a non-negative integer, or `name` is empty
    pub fn from_params<I, S>(params: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut config = Self::default();
        for param in params {
            let param = param.as_ref();
            let (key, value) = param
                .split_once('=')
                .ok_or_else(|| ConfigError::Malformed(param.to_string()))?;
            let invalid = || ConfigError::InvalidValue {
                key: key.to_string(),
                value: value.to_string(),
            };

            match key.trim() {
                "buf_size" => {
                    config.buf_size = value.trim().parse().map_err(|_| invalid())?;
                }
                "name" => {
                    let name = value.trim();
                    if !is_valid_name(name) {
                        return Err(invalid());
                    }
                    config.name = name.to_string();
                }
                other => return Err(ConfigError::UnknownKey(other.to_string())),
            }
        }
        Ok(config)
    }

    /// Read the configuration from a JSON object, e.g.
    /// `{"name": "scratch", "buf_size": 4096}`.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - There are I/O errors reading from the provided reader
    /// - The JSON input is invalid or has unknown fields
    /// - `name` is empty or contains `/`
    pub fn from_json_reader(mut reader: impl io::Read) -> Result<Self, ConfigError> {
        let mut buffer = Vec::new();
        reader.read_to_end(&mut buffer)?;
        let config: Self = serde_json::from_slice(&buffer)?;
        if !is_valid_name(&config.name) {
            return Err(ConfigError::InvalidValue {
                key: "name".to_string(),
                value: config.name,
            });
        }
        Ok(config)
    }

    /// Device path clients open, e.g. `/dev/vmemdev`
    #[must_use]
    pub fn path(&self) -> String {
        format!("{}{}", crate::registry::DEV_PREFIX, self.name)
    }
}

/// A name must be usable as a single `/dev` path component
fn is_valid_name(name: &str) -> bool {
    !name.is_empty() && !name.contains('/')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = DeviceConfig::default();
        assert_eq!(config.name, "vmemdev");
        assert_eq!(config.buf_size, 1024 * 1024);
        assert_eq!(config.path(), "/dev/vmemdev");
    }

    #[test]
    fn test_from_params() {
        let config = DeviceConfig::from_params(["buf_size=4096", "name=scratch"]).unwrap();
        assert_eq!(config.buf_size, 4096);
        assert_eq!(config.name, "scratch");

        let config = DeviceConfig::from_params(Vec::<String>::new()).unwrap();
        assert_eq!(config, DeviceConfig::default());
    }

    #[test]
    fn test_from_params_zero_size_is_parsed() {
        let config = DeviceConfig::from_params(["buf_size=0"]).unwrap();
        assert_eq!(config.buf_size, 0);
    }

    #[test]
    fn test_from_params_errors() {
        assert!(matches!(
            DeviceConfig::from_params(["buf_size"]),
            Err(ConfigError::Malformed(p)) if p == "buf_size"
        ));
        assert!(matches!(
            DeviceConfig::from_params(["size=1"]),
            Err(ConfigError::UnknownKey(k)) if k == "size"
        ));
        assert!(matches!(
            DeviceConfig::from_params(["buf_size=-1"]),
            Err(ConfigError::InvalidValue { key, .. }) if key == "buf_size"
        ));
        assert!(matches!(
            DeviceConfig::from_params(["name="]),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_from_json_reader() {
        let json = br#"{"buf_size": 16}"#;
        let config = DeviceConfig::from_json_reader(&json[..]).unwrap();
        assert_eq!(config.buf_size, 16);
        assert_eq!(config.name, "vmemdev");

        let err = DeviceConfig::from_json_reader(&br#"{"size": 16}"#[..]).unwrap_err();
        assert!(matches!(err, ConfigError::Json(_)));
    }

    #[test]
    fn test_from_json_reader_rejects_bad_names() {
        for json in [&br#"{"name": ""}"#[..], &br#"{"name": "a/b"}"#[..]] {
            assert!(matches!(
                DeviceConfig::from_json_reader(json),
                Err(ConfigError::InvalidValue { key, .. }) if key == "name"
            ));
        }

        let config = DeviceConfig::from_json_reader(&br#"{"name": "scratch"}"#[..]).unwrap();
        assert_eq!(config.path(), "/dev/scratch");
    }
}
