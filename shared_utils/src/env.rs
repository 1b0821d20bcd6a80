use std::path::{Path, PathBuf};

use thiserror::Error;

/// An environment variable required by the application is not set.
#[derive(Debug, Error)]
#[error("Missing environment variable: {0}")]
pub struct MissingEnvVarError(pub String);

/// Reads an environment variable, returning a structured error if it's missing.
///
/// This is a thin wrapper around `std::env::var` that provides a more
/// ergonomic and specific error type for missing variables. An empty value
/// counts as missing.
///
/// # Arguments
/// * `name` - The name of the environment variable to read.
pub fn get_env_var(name: &str) -> Result<String, MissingEnvVarError> {
    optional_env_var(name).ok_or_else(|| MissingEnvVarError(name.to_string()))
}

/// Reads an environment variable, treating unset and empty values alike as `None`.
pub fn optional_env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// What a `.env` lookup found.
///
/// Loading happens before logging is set up (the file may carry `RUST_LOG`),
/// so the outcome is returned and reported with [`DotenvStatus::log`] once a
/// subscriber exists.
#[derive(Debug)]
pub enum DotenvStatus {
    /// Variables were read from this file.
    Loaded(PathBuf),
    /// No `.env` file was found.
    Absent,
    /// A file was found but could not be read or parsed.
    Unreadable(dotenvy::Error),
}

impl DotenvStatus {
    fn from_result(result: Result<PathBuf, dotenvy::Error>) -> Self {
        match result {
            Ok(path) => Self::Loaded(path),
            Err(e) if e.not_found() => Self::Absent,
            Err(e) => Self::Unreadable(e),
        }
    }

    /// Emits the outcome as a tracing event.
    pub fn log(&self) {
        match self {
            Self::Loaded(path) => tracing::debug!(path = %path.display(), "loaded .env file"),
            Self::Absent => {}
            Self::Unreadable(e) => tracing::warn!(error = %e, "ignoring unreadable .env file"),
        }
    }
}

/// Loads a `.env` file from the working directory (or a parent) if one exists.
///
/// Variables already present in the process environment win over the file.
pub fn load_dotenv() -> DotenvStatus {
    DotenvStatus::from_result(dotenvy::dotenv())
}

/// Loads the env file at `path`, with the same precedence as [`load_dotenv`].
pub fn load_dotenv_from(path: &Path) -> DotenvStatus {
    DotenvStatus::from_result(dotenvy::from_path(path).map(|()| path.to_path_buf()))
}
