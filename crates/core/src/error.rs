//! Application-level error type.

use thiserror::Error;

/// Error type shared by the application crates.
///
/// Vulkan failures from the RHI layer are flattened into [`Error::Vulkan`]
/// at the crate boundary so the binary only deals with one type.
#[derive(Error, Debug)]
pub enum Error {
    /// Vulkan-related errors
    #[error("Vulkan error: {0}")]
    Vulkan(String),

    /// Window creation or event loop errors
    #[error("Window error: {0}")]
    Window(String),

    /// Shader loading errors
    #[error("Shader error: {0}")]
    Shader(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid configuration value
    #[error("Config error: {0}")]
    Config(String),

    /// Generic internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using the application's [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_converts() {
        fn open() -> Result<()> {
            Err(std::io::Error::new(std::io::ErrorKind::NotFound, "slang.spv"))?;
            Ok(())
        }

        let err = open().unwrap_err();
        assert!(matches!(err, Error::Io(_)));
        assert!(err.to_string().contains("slang.spv"));
    }

    #[test]
    fn test_display_prefixes() {
        assert_eq!(
            Error::Config("frames_in_flight must be > 0".into()).to_string(),
            "Config error: frames_in_flight must be > 0"
        );
        assert_eq!(
            Error::Vulkan("ERROR_DEVICE_LOST".into()).to_string(),
            "Vulkan error: ERROR_DEVICE_LOST"
        );
    }
}
