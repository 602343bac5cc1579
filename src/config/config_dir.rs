use std::path::PathBuf;

use super::error::{ConfigError, ConfigResult};

/// Environment variable that points at an explicit config file.
pub static CONFIG_ENV: &str = "LMS_CONFIG";

static CONFIG_FILE: &str = "config.toml";

#[cfg(unix)]
static HOME_ENV: &str = "HOME";
#[cfg(windows)]
static HOME_ENV: &str = "APPDATA";

/// Per-user location, `~/.config/lms/config.toml` on unix.
fn user_config_file(home: PathBuf) -> PathBuf {
    let base = if cfg!(unix) { home.join(".config") } else { home };
    base.join(crate::APPLICATION_NAME).join(CONFIG_FILE)
}

/// Locations to try in order of preference.
fn candidates(use_local: bool, explicit: Option<PathBuf>, home: Option<PathBuf>) -> Vec<PathBuf> {
    let mut paths: Vec<PathBuf> = explicit.into_iter().collect();
    if use_local {
        paths.push(PathBuf::from(".").join(CONFIG_FILE));
    }
    paths.extend(home.map(user_config_file));
    paths
}

/// First existing candidate, or the working directory file when none exists.
pub fn find_config_file(use_local: bool) -> PathBuf {
    let explicit = std::env::var_os(CONFIG_ENV).map(PathBuf::from);
    let home = std::env::var_os(HOME_ENV).map(PathBuf::from);

    candidates(use_local, explicit, home)
        .into_iter()
        .find(|path| path.exists())
        .unwrap_or_else(|| PathBuf::from(".").join(CONFIG_FILE))
}

pub fn read_config(use_local: bool) -> ConfigResult<Vec<u8>> {
    let path = find_config_file(use_local);
    tracing::trace!("looking for config at: {}", path.display());

    if !path.is_file() {
        return Err(ConfigError::ConfigNotFound);
    }

    let path = path.canonicalize()?;
    tracing::debug!("using {} as configuration file", path.display());
    Ok(std::fs::read(path)?)
}
