//! Call-state commands invoked by the hosted page's bridge script.
//!
//! The page reports call start and end; the controller decides whether the
//! screen-lock inhibition changes and what, if anything, to tell the page.

use tauri::{AppHandle, State};

use crate::host;
use crate::services::window::ShellController;
use crate::state::AppState;

/// A call started. Returns whether the inhibition state changed.
#[tauri::command]
pub fn call_connected(app: AppHandle, state: State<'_, AppState>) -> bool {
    log::debug!("Call connected");
    let (changed, effects) = state.with_controller(ShellController::call_connected);
    host::apply(&app, effects);
    changed
}

/// A call ended. Returns whether the inhibition state changed.
#[tauri::command]
pub fn call_disconnected(app: AppHandle, state: State<'_, AppState>) -> bool {
    log::debug!("Call disconnected");
    let (changed, effects) = state.with_controller(ShellController::call_disconnected);
    host::apply(&app, effects);
    changed
}
