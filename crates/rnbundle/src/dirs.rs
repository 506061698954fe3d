use std::{
    env,
    path::{Path, PathBuf},
};

use etcetera::BaseStrategy;

/// Configuration and cache directory name
const APP_DIR: &str = "rnbundle";

/// Configuration file name
pub const CONFIG_FILE: &str = "rnbundle.toml";

fn base_strategy() -> Option<impl BaseStrategy> {
    match etcetera::choose_base_strategy() {
        Ok(dirs) => Some(dirs),
        Err(err) => {
            log::debug!("No home directory available: {err}");
            None
        }
    }
}

/// Returns the path to the user configuration directory for rnbundle.
///
/// On Windows, use, e.g., C:\Users\Alice\AppData\Roaming\rnbundle
/// On Linux and macOS, use `XDG_CONFIG_HOME` or $HOME/.config, e.g., /home/alice/.config/rnbundle.
pub fn user_config_dir() -> Option<PathBuf> {
    base_strategy().map(|dirs| dirs.config_dir().join(APP_DIR))
}

/// Returns the directory the bundler server stages its builds in.
///
/// Falls back to the system temporary directory when there is no home directory.
pub fn user_cache_dir() -> PathBuf {
    base_strategy().map_or_else(
        || env::temp_dir().join(APP_DIR),
        |dirs| dirs.cache_dir().join(APP_DIR),
    )
}

#[cfg(not(windows))]
fn locate_system_config_xdg(value: Option<&str>) -> Option<PathBuf> {
    let default = "/etc/xdg";
    let config_dirs = value.filter(|s| !s.is_empty()).unwrap_or(default);

    for dir in config_dirs.split(':').take_while(|s| !s.is_empty()) {
        let candidate = Path::new(dir).join(APP_DIR).join(CONFIG_FILE);
        if candidate.is_file() {
            return Some(candidate);
        }
    }
    None
}

#[cfg(windows)]
fn locate_system_config_windows(system_drive: impl AsRef<Path>) -> Option<PathBuf> {
    let candidate = system_drive
        .as_ref()
        .join("ProgramData")
        .join(APP_DIR)
        .join(CONFIG_FILE);
    candidate.as_path().is_file().then_some(candidate)
}

/// Returns the path to the system configuration file.
///
/// On Unix-like systems, searches `XDG_CONFIG_DIRS` (falling back to `/etc/xdg` if unset or
/// empty) and then `/etc/rnbundle/rnbundle.toml`.
///
/// On Windows, uses `%SYSTEMDRIVE%\ProgramData\rnbundle\rnbundle.toml`.
pub fn system_config_file() -> Option<PathBuf> {
    #[cfg(windows)]
    {
        env::var("SYSTEMDRIVE")
            .ok()
            .and_then(|system_drive| locate_system_config_windows(PathBuf::from(system_drive)))
    }

    #[cfg(not(windows))]
    {
        let xdg_config_dirs = env::var("XDG_CONFIG_DIRS").ok();
        if let Some(path) = locate_system_config_xdg(xdg_config_dirs.as_deref()) {
            return Some(path);
        }

        let candidate = Path::new("/etc").join(APP_DIR).join(CONFIG_FILE);
        match candidate.try_exists() {
            Ok(true) => Some(candidate),
            Ok(false) => None,
            Err(err) => {
                log::warn!("Failed to query system configuration file: {err}");
                None
            }
        }
    }
}
