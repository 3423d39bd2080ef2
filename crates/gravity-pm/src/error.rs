use std::path::PathBuf;

use thiserror::Error;

use crate::http::HttpError;
use crate::registry::RegistryError;

#[derive(Error, Debug)]
pub enum GravityError {
    // Config errors
    #[error("Could not parse config file at {}: {source}", path.display())]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    // Registry errors
    #[error(transparent)]
    Registry(#[from] RegistryError),

    // Download errors
    #[error("Download failed: {0}")]
    Download(#[from] HttpError),

    // Installation errors
    #[error("Extraction failed: {0}")]
    Extraction(String),

    // Usage errors
    #[error("Invalid usage: {0}")]
    Usage(String),

    #[error("The folder {} already exists", path.display())]
    TargetExists { path: PathBuf },

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl GravityError {
    /// Process exit status for this error. Every failure is terminal.
    pub fn exit_code(&self) -> i32 {
        match self {
            GravityError::ConfigParse { .. }
            | GravityError::Config(_)
            | GravityError::Registry(_)
            | GravityError::Download(_)
            | GravityError::Extraction(_)
            | GravityError::Usage(_)
            | GravityError::TargetExists { .. }
            | GravityError::Io(_) => 1,
        }
    }
}

pub type Result<T> = std::result::Result<T, GravityError>;
