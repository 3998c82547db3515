use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::adb::AdbError;

/// A specialized `Result` type for recognition and navigation operations.
pub type AutomationResult<T> = Result<T, AutomationError>;

/// The error type for everything above the display channel.
///
/// A detection that simply does not see its element is not an error; it is
/// reported as `Ok(false)`.
#[derive(Debug, Error)]
pub enum AutomationError {
    #[error("Screen capture failed: {description}")]
    Capture { description: String },

    #[error("Input injection failed: {description}")]
    Input { description: String },

    #[error("Failed to load reference asset {path:?}: {description}")]
    Asset { path: PathBuf, description: String },

    #[error("Unknown page: no page check matched within {elapsed:?}")]
    UnknownPage { elapsed: Duration },

    #[error("Unknown state in {widget}: {description}")]
    UnknownState { widget: String, description: String },

    #[error("Invalid configuration: {description}")]
    Configuration { description: String },

    #[error("Request human takeover: {reason}")]
    RuntimeTakeover { reason: String },

    #[error("Navigation to '{destination}' did not finish within {duration:?}")]
    NavigationTimeout {
        destination: String,
        duration: Duration,
    },

    #[error("Image encoding failed: {source}")]
    Image {
        #[from]
        source: image::ImageError,
    },

    #[error("ADB transport error: {source}")]
    Adb {
        #[from]
        source: AdbError,
    },
}

impl AutomationError {
    pub fn configuration(description: impl Into<String>) -> Self {
        AutomationError::Configuration {
            description: description.into(),
        }
    }

    /// True for errors that only a person at the device can resolve.
    pub fn requires_takeover(&self) -> bool {
        matches!(
            self,
            AutomationError::RuntimeTakeover { .. }
                | AutomationError::UnknownPage { .. }
                | AutomationError::UnknownState { .. }
        )
    }
}
