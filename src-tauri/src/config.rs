//! Resolved shell configuration.
//!
//! Loaded once from `config.json` in the per-user config directory before the
//! controller starts, then shared read-only. Keys are camelCase, and older
//! spellings of the inhibition method are still accepted.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, ShellError};

/// Directory name used under the per-user config and data directories.
pub const APP_DIR_NAME: &str = "teams-shell";

const CONFIG_FILE_NAME: &str = "config.json";

pub const DEFAULT_URL: &str = "https://teams.microsoft.com";

const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

const DEFAULT_PARTITION: &str = "persist:teams-4-linux";

/// How the screen lock is held off while a call is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ScreenLockInhibitionMethod {
    /// An OS-level inhibition held by the shell itself.
    #[default]
    #[serde(rename = "os-native", alias = "Electron")]
    OsNative,
    /// The hosted page is told to take a wake lock itself.
    #[serde(rename = "wake-lock-signal", alias = "WakeLockSentinel")]
    WakeLockSignal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AppConfig {
    pub url: String,
    pub chrome_user_agent: String,
    pub partition: String,
    pub app_icon: Option<PathBuf>,
    pub screen_lock_inhibition_method: ScreenLockInhibitionMethod,
    pub minimized: bool,
    pub web_debug: bool,
    pub clear_storage: bool,
    pub client_cert_path: Option<PathBuf>,
    pub client_cert_password: Option<String>,
    pub spell_checker_languages: Vec<String>,
    pub online_offline_reload: bool,
    pub app_log_levels: String,
    #[serde(rename = "customCSSLocation")]
    pub custom_css_location: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_URL.to_string(),
            chrome_user_agent: DEFAULT_USER_AGENT.to_string(),
            partition: DEFAULT_PARTITION.to_string(),
            app_icon: None,
            screen_lock_inhibition_method: ScreenLockInhibitionMethod::default(),
            minimized: false,
            web_debug: false,
            clear_storage: false,
            client_cert_path: None,
            client_cert_password: None,
            spell_checker_languages: Vec::new(),
            online_offline_reload: true,
            app_log_levels: "error,warn".to_string(),
            custom_css_location: None,
        }
    }
}

impl AppConfig {
    /// `<config dir>/teams-shell/config.json`.
    pub fn default_path() -> Result<PathBuf> {
        let dir = dirs::config_dir().ok_or(ShellError::NoUserDirectory("config"))?;
        Ok(dir.join(APP_DIR_NAME).join(CONFIG_FILE_NAME))
    }

    /// Reads the config at `path`. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::info!("No config at {}, using defaults", path.display());
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(ShellError::Read {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        serde_json::from_str(&raw).map_err(|source| ShellError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// The most verbose level named in `appLogLevels`, `Warn` when none parse.
    pub fn log_level(&self) -> log::LevelFilter {
        self.app_log_levels
            .split(',')
            .filter_map(|level| level.trim().parse::<log::LevelFilter>().ok())
            .max()
            .unwrap_or(log::LevelFilter::Warn)
    }

    /// Storage directory backing the configured partition.
    ///
    /// A `persist:` prefix is accepted and ignored; every partition is
    /// persistent here.
    pub fn partition_dir(&self) -> Result<PathBuf> {
        let name = self
            .partition
            .strip_prefix("persist:")
            .unwrap_or(&self.partition);
        let dir = dirs::data_dir().ok_or(ShellError::NoUserDirectory("data"))?;
        Ok(dir.join(APP_DIR_NAME).join("Partitions").join(name))
    }
}
