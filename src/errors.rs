use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur during the type generation process.
#[derive(Debug, Error)]
pub enum ConfectTypegenError
{
    /// The Convex source directory could not be found at the specified path
    #[error("Convex directory not found: {}", .0.display())]
    MissingConvexDir(PathBuf),

    /// An IO error occurred while reading or writing files
    #[error("IO error while accessing '{file}': {error}")]
    IOError
    {
        /// Path to the file where the error occurred
        file: String,
        /// The underlying IO error
        #[source]
        error: std::io::Error,
    },

    /// A source file or schema expression could not be parsed
    #[error("Failed to parse {file}: {details}")]
    ParsingFailed
    {
        /// File (or expression) that failed to parse
        file: String,
        /// Details about the parse failure
        details: String,
    },

    /// Failed to serialize or deserialize JSON
    #[error("Failed to serialize: {0}")]
    SerializationFailed(#[from] serde_json::Error),

    /// The directory traversal failed
    #[error("Failed to walk directory: {0}")]
    Walk(#[from] walkdir::Error),

    /// A `package.json` manifest has an unexpected shape
    #[error("Invalid manifest at {file}: {details}")]
    InvalidManifest
    {
        /// Path to the manifest
        file: String,
        /// Details about why the manifest is invalid
        details: String,
    },

    /// The file watcher could not be created or registered
    #[error("Watch error: {0}")]
    Watch(#[from] notify::Error),

    /// The provided path doesn't have a usable file name or parent
    #[error("Invalid path: {0}")]
    InvalidPath(String),
}

impl From<std::io::Error> for ConfectTypegenError
{
    fn from(error: std::io::Error) -> Self
    {
        ConfectTypegenError::IOError {
            file: String::new(),
            error,
        }
    }
}

impl ConfectTypegenError
{
    /// Adds file context to an IO error
    pub fn with_file_context(self, file: impl Into<String>) -> Self
    {
        match self {
            Self::IOError { error, .. } => Self::IOError {
                file: file.into(),
                error,
            },
            other => other,
        }
    }
}
