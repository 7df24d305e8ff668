//! Shared application state for the Tauri host.
//!
//! Holds the shell controller, the window-state store and the spell-check
//! provider. Managed via `tauri::Manager::manage()` and accessed in commands
//! via `tauri::State`.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Mutex, PoisonError};

use crate::services::spellcheck::HunspellDictionaries;
use crate::services::window::ShellController;
use crate::services::window_state::WindowStateStore;

pub struct AppState {
    /// Callbacks lock, compute effects, unlock, then apply the effects.
    controller: Mutex<ShellController>,
    pub window_state: WindowStateStore,
    pub spellcheck: Mutex<HunspellDictionaries>,
    /// Suffix for labels of popup and phantom surfaces.
    next_surface_id: AtomicU32,
}

impl AppState {
    pub fn new(controller: ShellController, window_state: WindowStateStore) -> Self {
        Self {
            controller: Mutex::new(controller),
            window_state,
            spellcheck: Mutex::new(HunspellDictionaries::default()),
            next_surface_id: AtomicU32::new(1),
        }
    }

    /// Runs `f` against the controller. Never apply effects from inside `f`.
    pub fn with_controller<T>(&self, f: impl FnOnce(&mut ShellController) -> T) -> T {
        let mut controller = self.controller.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut controller)
    }

    pub fn next_surface_label(&self, prefix: &str) -> String {
        let id = self.next_surface_id.fetch_add(1, Ordering::Relaxed);
        format!("{prefix}{id}")
    }
}
