//! Host-side integrations the controller delegates to: link prompt, tray
//! menu, custom styles, reconnect reload and screen-source selection.

use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use serde::Serialize;
use tauri::menu::{Menu, MenuItem};
use tauri::tray::TrayIconBuilder;
use tauri::{AppHandle, Manager, Url, WebviewWindow};
use tauri_plugin_dialog::{DialogExt, MessageDialogButtons, MessageDialogKind, MessageDialogResult};

use crate::config::AppConfig;
use crate::effects::Effect;
use crate::services::navigation::{LinkChoice, PendingLink, LINK_PROMPT_MESSAGE, LINK_PROMPT_TITLE};

use super::MAIN_WINDOW_LABEL;

const CONNECTIVITY_POLL_INTERVAL: Duration = Duration::from_secs(10);
const CONNECTIVITY_TIMEOUT: Duration = Duration::from_secs(3);

/// Asks how to open `pending` and applies the answer once the user responds.
/// The dialog does not block the event loop.
pub fn prompt_link(app: &AppHandle, pending: PendingLink) {
    let handle = app.clone();
    let mut dialog = app
        .dialog()
        .message(LINK_PROMPT_MESSAGE)
        .title(LINK_PROMPT_TITLE)
        .kind(MessageDialogKind::Info)
        .buttons(MessageDialogButtons::YesNoCancelCustom(
            LinkChoice::External.label().to_string(),
            LinkChoice::Internal.label().to_string(),
            LinkChoice::Deny.label().to_string(),
        ));

    if let Some(window) = app.get_webview_window(MAIN_WINDOW_LABEL) {
        dialog = dialog.parent(&window);
    }

    dialog.show_with_result(move |result| {
        let choice = match result {
            MessageDialogResult::Yes => LinkChoice::External,
            MessageDialogResult::No => LinkChoice::Internal,
            MessageDialogResult::Custom(label) => LinkChoice::from_label(&label),
            _ => LinkChoice::Deny,
        };
        super::apply(&handle, pending.resolve(choice));
    });
}

/// Tray icon with "Open" and "Quit", so a hidden surface can be brought back.
pub fn build_menu(app: &AppHandle, window: &WebviewWindow) -> tauri::Result<()> {
    let open = MenuItem::with_id(app, "open", "Open", true, None::<&str>)?;
    let quit = MenuItem::with_id(app, "quit", "Quit", true, None::<&str>)?;
    let menu = Menu::with_items(app, &[&open, &quit])?;

    let mut tray = TrayIconBuilder::with_id(MAIN_WINDOW_LABEL)
        .tooltip(window.title().unwrap_or_default())
        .menu(&menu)
        .on_menu_event(|app, event| match event.id().as_ref() {
            "open" => super::apply(app, vec![Effect::RestoreAndFocus]),
            "quit" => app.exit(0),
            _ => {}
        });

    if let Some(icon) = app.default_window_icon().cloned() {
        tray = tray.icon(icon);
    }

    tray.build(app)?;
    Ok(())
}

/// Appends the configured stylesheet to the loaded page.
pub fn inject_custom_css(window: &WebviewWindow, config: &AppConfig) -> Result<(), String> {
    let Some(path) = &config.custom_css_location else {
        return Ok(());
    };

    let css = std::fs::read_to_string(path)
        .map_err(|e| format!("Failed to read {}: {e}", path.display()))?;
    let css = serde_json::to_string(&css).map_err(|e| format!("Failed to encode css: {e}"))?;

    window
        .eval(&format!(
            "(() => {{\
               const style = document.createElement('style');\
               style.textContent = {css};\
               document.head.appendChild(style);\
             }})();"
        ))
        .map_err(|e| format!("Failed to inject styles: {e}"))
}

/// Reloads the page when the service becomes reachable again after an outage.
pub fn reload_on_reconnect(window: &WebviewWindow, config: &AppConfig) {
    let Some((host, port)) = Url::parse(&config.url).ok().and_then(|url| {
        let host = url.host_str()?.to_string();
        Some((host, url.port_or_known_default()?))
    }) else {
        log::warn!("Cannot watch connectivity for {}", config.url);
        return;
    };

    let window = window.clone();
    std::thread::spawn(move || {
        let mut online = true;
        loop {
            std::thread::sleep(CONNECTIVITY_POLL_INTERVAL);
            let reachable = is_reachable(&host, port);

            if reachable && !online {
                log::info!("{host} is reachable again, reloading");
                if window.eval("location.reload()").is_err() {
                    break;
                }
            } else if !reachable && online {
                log::info!("{host} is unreachable");
            }
            online = reachable;
        }
    });
}

fn is_reachable(host: &str, port: u16) -> bool {
    let Ok(mut addrs) = (host, port).to_socket_addrs() else {
        return false;
    };
    addrs.any(|addr| TcpStream::connect_timeout(&addr, CONNECTIVITY_TIMEOUT).is_ok())
}

/// A capturable screen, in the id format the page's capture request expects.
#[derive(Debug, Clone, Serialize)]
pub struct ScreenSource {
    pub id: String,
    pub name: String,
}

/// Picks the screen the primary surface is on.
pub fn pick_source(window: &WebviewWindow) -> Option<ScreenSource> {
    let monitor = window
        .current_monitor()
        .ok()
        .flatten()
        .or_else(|| window.primary_monitor().ok().flatten())?;

    Some(ScreenSource {
        id: "screen:0:0".to_string(),
        name: monitor
            .name()
            .cloned()
            .unwrap_or_else(|| "Entire Screen".to_string()),
    })
}
