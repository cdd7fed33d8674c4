//! Core runtime configuration.
//!
//! Configuration is resolved once at process startup and then passed into core services.
//! Request handling never reads process-wide environment variables, which keeps behaviour
//! consistent across threads and test harnesses.

use crate::constants::{
    DEFAULT_MAX_DEPTH, DEFAULT_TOKEN_TTL_SECS, METADATA_DIR_NAME, USERS_DIR_NAME,
};
use crate::{DriveError, DriveResult};
use chrono::Duration;
use drive_files::CONTENT_FOLDER_NAME;
use std::path::{Path, PathBuf};

/// Core configuration resolved at startup.
#[derive(Clone, Debug)]
pub struct CoreConfig {
    data_dir: PathBuf,
    token_ttl: Duration,
    max_depth: usize,
}

impl CoreConfig {
    /// Create a new `CoreConfig`.
    ///
    /// # Errors
    ///
    /// Returns `DriveError::InvalidInput` if the TTL is not positive or the depth is zero.
    pub fn new(data_dir: PathBuf, token_ttl: Duration, max_depth: usize) -> DriveResult<Self> {
        if token_ttl <= Duration::zero() {
            return Err(DriveError::InvalidInput(
                "token ttl must be positive".into(),
            ));
        }
        if max_depth == 0 {
            return Err(DriveError::InvalidInput(
                "max depth must be at least 1".into(),
            ));
        }

        Ok(Self {
            data_dir,
            token_ttl,
            max_depth,
        })
    }

    /// Configuration with default TTL and depth rooted at `data_dir`.
    pub fn with_defaults(data_dir: PathBuf) -> Self {
        Self {
            data_dir,
            token_ttl: Duration::seconds(DEFAULT_TOKEN_TTL_SECS),
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn metadata_dir(&self) -> PathBuf {
        self.data_dir.join(METADATA_DIR_NAME)
    }

    pub fn users_dir(&self) -> PathBuf {
        self.data_dir.join(USERS_DIR_NAME)
    }

    pub fn content_dir(&self) -> PathBuf {
        self.data_dir.join(CONTENT_FOLDER_NAME)
    }

    pub fn token_ttl(&self) -> Duration {
        self.token_ttl
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }
}

/// Parse the session lifetime (in seconds) from an optional string value.
///
/// If `value` is `None` or empty/whitespace, returns the 24 hour default.
pub fn token_ttl_from_env_value(value: Option<String>) -> DriveResult<Duration> {
    let secs = parse_optional::<i64>("DRIVE_TOKEN_TTL_SECS", value)?;
    Ok(Duration::seconds(secs.unwrap_or(DEFAULT_TOKEN_TTL_SECS)))
}

/// Parse the maximum hierarchy depth from an optional string value.
///
/// If `value` is `None` or empty/whitespace, returns the default of 1000.
pub fn max_depth_from_env_value(value: Option<String>) -> DriveResult<usize> {
    let depth = parse_optional::<usize>("DRIVE_MAX_DEPTH", value)?;
    Ok(depth.unwrap_or(DEFAULT_MAX_DEPTH))
}

fn parse_optional<T: std::str::FromStr>(name: &str, value: Option<String>) -> DriveResult<Option<T>> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .map(|v| {
            v.parse::<T>()
                .map_err(|_| DriveError::InvalidInput(format!("{name} is not a valid number: '{v}'")))
        })
        .transpose()
}
