use serde::Deserialize;
use std::path::PathBuf;

use crate::errors::{ConfigError, ConfigResult};

/// `[log]` section: where rows go and how they are labelled
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    pub location: String,
    /// Directory holding the daily files; a leading `~` expands to `$HOME`
    pub data_dir: String,
    /// Overrides the kernel hostname in file names and rows
    pub hostname: Option<String>,
    pub create_dirs: bool,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            location: "unique_location".to_string(),
            data_dir: "~/DATA/environmental".to_string(),
            hostname: None,
            create_dirs: true,
        }
    }
}

impl LogSettings {
    pub fn resolved_data_dir(&self) -> ConfigResult<PathBuf> {
        expand_home(&self.data_dir, std::env::var_os("HOME").map(PathBuf::from))
    }
}

fn expand_home(path: &str, home: Option<PathBuf>) -> ConfigResult<PathBuf> {
    let rest = match path.strip_prefix('~') {
        Some(rest) if rest.is_empty() || rest.starts_with('/') => rest.trim_start_matches('/'),
        _ => return Ok(PathBuf::from(path)),
    };

    let home = home.ok_or_else(|| ConfigError::InvalidValue {
        field: "log.data_dir".to_string(),
        reason: format!("'{}' needs $HOME, which is not set", path),
    })?;

    Ok(if rest.is_empty() { home } else { home.join(rest) })
}
