use std::path::PathBuf;

use thiserror::Error;

/// Library error type for catalog, settings and render operations.
#[derive(Debug, Error)]
pub enum Error {
    /// A configured image folder is missing or not a directory.
    #[error("invalid image folder: {}", .0.display())]
    BadDir(PathBuf),

    /// Underlying IO error.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Settings (de)serialization error.
    #[error(transparent)]
    Settings(#[from] serde_json::Error),

    /// The settings blob parsed as JSON but is not an object.
    #[error("settings file must contain a JSON object")]
    SettingsNotObject,

    /// A display size that is not a number or lies outside the accepted range.
    #[error("invalid viewport: {0}")]
    BadViewport(String),

    /// The presenter could not produce a displayable bitmap.
    #[error("render error for {}: {reason}", path.display())]
    Render { path: PathBuf, reason: String },
}
