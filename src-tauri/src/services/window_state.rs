//! Persisted geometry of the primary surface.
//!
//! Stored as `window-state.json` in the per-user data directory and restored
//! at the next launch.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::config::APP_DIR_NAME;
use crate::error::{Result, ShellError};

const STATE_FILE_NAME: &str = "window-state.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowGeometry {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl WindowGeometry {
    /// Zero-sized geometry is what a minimized or unmapped window reports.
    pub fn is_usable(&self) -> bool {
        self.width > 0 && self.height > 0
    }
}

#[derive(Debug, Clone)]
pub struct WindowStateStore {
    path: PathBuf,
}

impl WindowStateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at `<data dir>/teams-shell/window-state.json`.
    pub fn in_data_dir() -> Result<Self> {
        let dir = dirs::data_dir().ok_or(ShellError::NoUserDirectory("data"))?;
        Ok(Self::new(dir.join(APP_DIR_NAME).join(STATE_FILE_NAME)))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Last saved geometry; `None` when nothing usable was saved, in which
    /// case the platform defaults apply.
    pub fn load(&self) -> Option<WindowGeometry> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) => {
                if e.kind() != std::io::ErrorKind::NotFound {
                    log::warn!("Failed to read {}: {e}", self.path.display());
                }
                return None;
            }
        };

        match serde_json::from_str::<WindowGeometry>(&raw) {
            Ok(geometry) if geometry.is_usable() => {
                log::debug!("Restored window geometry {geometry:?}");
                Some(geometry)
            }
            Ok(_) => None,
            Err(e) => {
                log::warn!("Ignoring malformed {}: {e}", self.path.display());
                None
            }
        }
    }

    pub fn save(&self, geometry: &WindowGeometry) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|source| ShellError::Write {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let raw = serde_json::to_string_pretty(geometry)?;
        fs::write(&self.path, raw).map_err(|source| ShellError::Write {
            path: self.path.clone(),
            source,
        })
    }
}
