//! Application configuration.
//!
//! Everything has a sensible default; a handful of knobs can be overridden
//! from the environment so the binary needs no argument parsing.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::{Error, Result};

/// Environment variable overriding [`AppConfig::shader_path`].
pub const ENV_SHADER: &str = "HELLO_TRIANGLE_SHADER";
/// Environment variable overriding [`AppConfig::enable_validation`].
pub const ENV_VALIDATION: &str = "HELLO_TRIANGLE_VALIDATION";
/// Environment variable overriding [`AppConfig::frames_in_flight`].
pub const ENV_FRAMES_IN_FLIGHT: &str = "HELLO_TRIANGLE_FRAMES_IN_FLIGHT";

/// Runtime configuration for the window and the frame loop.
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    /// Initial window width in logical pixels
    pub width: u32,
    /// Initial window height in logical pixels
    pub height: u32,
    /// Window title
    pub title: String,
    /// Number of frame slots (in-flight depth)
    pub frames_in_flight: usize,
    /// Upper bound for a single wait on a frame slot's fence before retrying
    pub slot_wait_timeout: Duration,
    /// SPIR-V module holding both `vertMain` and `fragMain`
    pub shader_path: PathBuf,
    /// Enable `VK_LAYER_KHRONOS_validation` and the debug messenger
    pub enable_validation: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            width: 800,
            height: 600,
            title: "Hello Triangle".to_string(),
            frames_in_flight: 2,
            slot_wait_timeout: Duration::from_nanos(u16::MAX as u64),
            shader_path: PathBuf::from("assets/shaders/hello_triangle/slang.spv"),
            enable_validation: cfg!(debug_assertions),
        }
    }
}

impl AppConfig {
    /// Defaults overlaid with the `HELLO_TRIANGLE_*` environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] when a variable is set to an unparsable value
    /// or the resulting configuration fails [`AppConfig::validate`].
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`AppConfig::from_env`] but reads variables through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(path) = lookup(ENV_SHADER) {
            config.shader_path = PathBuf::from(path);
        }

        if let Some(value) = lookup(ENV_VALIDATION) {
            config.enable_validation = parse_flag(ENV_VALIDATION, &value)?;
        }

        if let Some(value) = lookup(ENV_FRAMES_IN_FLIGHT) {
            config.frames_in_flight = value.trim().parse().map_err(|_| {
                Error::Config(format!("{ENV_FRAMES_IN_FLIGHT}: expected an integer, got {value:?}"))
            })?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the renderer cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(Error::Config(format!(
                "window size must be non-zero, got {}x{}",
                self.width, self.height
            )));
        }
        if self.frames_in_flight == 0 {
            return Err(Error::Config("frames_in_flight must be at least 1".into()));
        }
        if self.slot_wait_timeout.is_zero() {
            return Err(Error::Config("slot_wait_timeout must be non-zero".into()));
        }
        Ok(())
    }

    /// Slot wait timeout in nanoseconds, saturated to `u64`.
    pub fn slot_wait_timeout_ns(&self) -> u64 {
        u64::try_from(self.slot_wait_timeout.as_nanos()).unwrap_or(u64::MAX)
    }
}

fn parse_flag(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "on" | "yes" => Ok(true),
        "0" | "false" | "off" | "no" => Ok(false),
        other => Err(Error::Config(format!("{key}: expected a boolean, got {other:?}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!((config.width, config.height), (800, 600));
        assert_eq!(config.frames_in_flight, 2);
        assert_eq!(config.slot_wait_timeout_ns(), 65_535);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_overrides() {
        let config = AppConfig::from_lookup(lookup(&[
            (ENV_SHADER, "/tmp/other.spv"),
            (ENV_VALIDATION, "off"),
            (ENV_FRAMES_IN_FLIGHT, "3"),
        ]))
        .unwrap();

        assert_eq!(config.shader_path, PathBuf::from("/tmp/other.spv"));
        assert!(!config.enable_validation);
        assert_eq!(config.frames_in_flight, 3);
    }

    #[test]
    fn test_malformed_values() {
        let err = AppConfig::from_lookup(lookup(&[(ENV_VALIDATION, "maybe")])).unwrap_err();
        assert!(matches!(err, Error::Config(_)));

        let err = AppConfig::from_lookup(lookup(&[(ENV_FRAMES_IN_FLIGHT, "two")])).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_zero_frames_in_flight_rejected() {
        let err = AppConfig::from_lookup(lookup(&[(ENV_FRAMES_IN_FLIGHT, "0")])).unwrap_err();
        assert!(err.to_string().contains("frames_in_flight"));
    }

    #[test]
    fn test_zero_window_rejected() {
        let config = AppConfig {
            width: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
