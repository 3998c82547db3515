use std::time::Duration;
use thiserror::Error;

/// A specialized `Result` type for ADB operations.
pub type AdbResult<T> = Result<T, AdbError>;

/// The error type for all ADB-related operations.
#[derive(Debug, Error)]
pub enum AdbError {
    #[error("Failed to list devices from the ADB server: {source}")]
    DeviceEnumerationFailed {
        #[from]
        source: adb_client::RustADBError,
    },

    #[error("No device attached to the ADB server")]
    NoDevice,

    #[error("Failed to open device '{device}': {source}")]
    ConnectionFailed {
        device: String,
        source: adb_client::RustADBError,
    },

    #[error("Shell command '{command}' failed: {source}")]
    ShellCommandFailed {
        command: String,
        source: adb_client::RustADBError,
    },

    #[error("Operation timed out after {duration:?}: {description}")]
    Timeout { duration: Duration, description: String },

    #[error("Task failed to complete: {source}")]
    JoinError {
        #[from]
        source: tokio::task::JoinError,
    },

    #[error("Could not parse screen size from 'wm size' output.")]
    ScreenSizeParseFailed,

    #[error("Screencap output is not a readable image: {description}")]
    ScreencapDecodeFailed { description: String },

    #[error("Input coordinates are out of bounds: x={x}, y={y}")]
    OutOfBounds { x: i32, y: i32 },
}

impl AdbError {
    /// Whether the device most likely went away (cable pulled, server restarted).
    pub fn is_disconnect(&self) -> bool {
        match self {
            AdbError::ShellCommandFailed { source, .. }
            | AdbError::ConnectionFailed { source, .. } => {
                let text = source.to_string().to_lowercase();
                ["closed", "broken pipe", "not found", "offline", "no write endpoint", "clse"]
                    .iter()
                    .any(|needle| text.contains(needle))
            }
            AdbError::Timeout { .. } | AdbError::NoDevice => true,
            _ => false,
        }
    }
}
