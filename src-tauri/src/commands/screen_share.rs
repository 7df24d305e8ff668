//! Screen-share source selection for the page's capture request.

use tauri::{AppHandle, Emitter, Manager};

use crate::host::{self, ScreenSource};

/// Picks the screen to share and announces it on `select-source`.
/// Returns `None` when no monitor could be resolved.
#[tauri::command]
pub fn select_source(app: AppHandle) -> Option<ScreenSource> {
    let window = app.get_webview_window(host::MAIN_WINDOW_LABEL)?;
    let source = host::pick_source(&window)?;

    log::info!("Selected screen-share source {} ({})", source.id, source.name);
    if let Err(e) = window.emit("select-source", &source) {
        log::warn!("Failed to announce screen-share source: {e}");
    }
    Some(source)
}
