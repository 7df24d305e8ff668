//! Tauri host: creates the primary surface, translates Tauri callbacks into
//! controller events and runs the resulting effects.

mod collaborators;

pub use collaborators::{pick_source, ScreenSource};

use std::sync::Arc;

use tauri::webview::{NewWindowFeatures, NewWindowResponse, PageLoadEvent};
use tauri::{
    AppHandle, Emitter, Manager, PhysicalPosition, PhysicalSize, Url, WebviewUrl, WebviewWindow,
    WebviewWindowBuilder, Window, WindowEvent, Wry,
};
use tauri_plugin_opener::OpenerExt;

use crate::config::AppConfig;
use crate::effects::{Effect, PageSignal};
use crate::services::certificate;
use crate::services::inhibitor::ProcessInhibitor;
use crate::services::navigation::{
    strip_child_menu, ChildSurfaces, NewWindowDecision, RequestSource, RequestVerdict,
};
use crate::services::spellcheck::apply_languages;
use crate::services::window::{ShellController, SurfaceEvent, SurfaceSpec};
use crate::services::window_state::{WindowGeometry, WindowStateStore};
use crate::state::AppState;

pub const MAIN_WINDOW_LABEL: &str = "main";
const POPUP_LABEL_PREFIX: &str = "popup-";
const PHANTOM_LABEL_PREFIX: &str = "phantom-";
const WINDOW_TITLE: &str = "Microsoft Teams";

/// Builds the controller and the primary surface, then runs the startup
/// effects. An error here is fatal.
pub fn initialize(app: &AppHandle, config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let config = Arc::new(config);
    let store = WindowStateStore::in_data_dir()?;
    let args: Vec<String> = std::env::args().collect();

    let startup = ShellController::initialize(
        Arc::clone(&config),
        &args,
        store.load(),
        Box::new(ProcessInhibitor::new()),
    );
    app.manage(AppState::new(startup.controller, store));

    let window = create_primary_surface(app, &startup.surface, &config)?;
    collaborators::build_menu(app, &window)?;

    apply(app, startup.effects);
    Ok(())
}

fn create_primary_surface(
    app: &AppHandle,
    spec: &SurfaceSpec,
    config: &AppConfig,
) -> Result<WebviewWindow, Box<dyn std::error::Error>> {
    let blank: Url = "about:blank".parse()?;
    let new_window_app = app.clone();

    let mut builder = WebviewWindowBuilder::new(app, MAIN_WINDOW_LABEL, WebviewUrl::External(blank))
        .title(WINDOW_TITLE)
        .visible(spec.visible)
        .user_agent(&spec.user_agent)
        .data_directory(config.partition_dir()?)
        .devtools(spec.devtools)
        .on_new_window(move |url, features| on_new_window(&new_window_app, url, features))
        .on_page_load(|window, payload| {
            if payload.event() == PageLoadEvent::Finished {
                dispatch(window.app_handle(), SurfaceEvent::ContentFinishedLoading);
            }
        })
        .on_document_title_changed(|window, title| {
            dispatch(window.app_handle(), SurfaceEvent::TitleChanged(title));
        });

    if let Some(icon) = &spec.icon {
        builder = builder.icon(tauri::image::Image::from_path(icon)?)?;
    }

    let window = builder.build()?;

    if let Some(geometry) = spec.geometry {
        window.set_position(PhysicalPosition::new(geometry.x, geometry.y))?;
        window.set_size(PhysicalSize::new(geometry.width, geometry.height))?;
        log::info!(
            "Restored window geometry {}x{} at ({}, {})",
            geometry.width,
            geometry.height,
            geometry.x,
            geometry.y
        );
    }

    Ok(window)
}

/// Routes a surface event through the controller and runs its effects.
pub fn dispatch(app: &AppHandle, event: SurfaceEvent) {
    let Some(state) = app.try_state::<AppState>() else {
        return;
    };
    let effects = state.with_controller(|controller| controller.handle_event(event));
    apply(app, effects);
}

/// Window events for the primary surface.
pub fn on_window_event(window: &Window, event: &WindowEvent) {
    if window.label() != MAIN_WINDOW_LABEL {
        return;
    }

    match event {
        WindowEvent::Destroyed => {
            log::info!("Main window destroyed, shutting down");
            dispatch(window.app_handle(), SurfaceEvent::Closed);
        }
        // Iconify on GTK and macOS moves nothing, but always drops focus.
        WindowEvent::Moved(_) | WindowEvent::Resized(_) | WindowEvent::Focused(_) => {
            let (Ok(position), Ok(size)) = (window.outer_position(), window.inner_size()) else {
                return;
            };
            let minimized = window.is_minimized().unwrap_or(false);
            dispatch(
                window.app_handle(),
                SurfaceEvent::GeometryChanged {
                    geometry: WindowGeometry {
                        x: position.x,
                        y: position.y,
                        width: size.width,
                        height: size.height,
                    },
                    minimized,
                },
            );
        }
        _ => {}
    }
}

/// Duplicate launch forwarded by the single-instance plugin.
pub fn on_second_instance(app: &AppHandle, args: Vec<String>) {
    let Some(state) = app.try_state::<AppState>() else {
        return;
    };
    let effects = state.with_controller(|controller| {
        controller.on_second_instance(&args, std::time::Instant::now())
    });
    apply(app, effects);
}

/// Top-level requests of a phantom surface. The first `https` one after a
/// blank popup goes to the browser and the phantom is closed.
fn on_phantom_navigation(app: &AppHandle, label: &str, url: &Url) -> bool {
    let Some(state) = app.try_state::<AppState>() else {
        return true;
    };
    let verdict =
        state.with_controller(|controller| controller.on_before_request(RequestSource::Phantom, url.as_str()));

    match verdict {
        RequestVerdict::Proceed => true,
        RequestVerdict::Cancel(effects) => {
            apply_later(app, effects);
            close_later(app, label);
            false
        }
    }
}

fn on_new_window(app: &AppHandle, url: Url, features: NewWindowFeatures) -> NewWindowResponse<Wry> {
    let Some(state) = app.try_state::<AppState>() else {
        return NewWindowResponse::Deny;
    };

    // The popup's contents are handed over in `features`.
    let decision = state.with_controller(|controller| controller.on_new_window(url.as_str(), true));

    let effects = match decision {
        NewWindowDecision::Deny(effects) => effects,
        NewWindowDecision::Prompt(pending) => {
            collaborators::prompt_link(app, pending);
            return NewWindowResponse::Deny;
        }
    };

    let mut features = Some(features);
    let mut response = NewWindowResponse::Deny;
    let mut deferred = Vec::with_capacity(effects.len());
    for effect in effects {
        match effect {
            Effect::OpenHiddenAuxiliary {
                url,
                reuse_contents: true,
            } if features.is_some() => match open_phantom(app, &url, features.take()) {
                Ok(window) => response = NewWindowResponse::Create { window },
                Err(e) => log::warn!("{e}"),
            },
            effect => deferred.push(effect),
        }
    }
    apply_later(app, deferred);
    response
}

fn close_later(app: &AppHandle, label: &str) {
    let app = app.clone();
    let label = label.to_string();
    tauri::async_runtime::spawn(async move {
        let Some(window) = app.get_webview_window(&label) else {
            return;
        };
        if let Err(e) = window.close() {
            log::warn!("Failed to close phantom surface {label}: {e}");
        }
    });
}

/// Runs effects off the webview callback that produced them.
fn apply_later(app: &AppHandle, effects: Vec<Effect>) {
    if effects.is_empty() {
        return;
    }
    let app = app.clone();
    tauri::async_runtime::spawn(async move { apply(&app, effects) });
}

pub fn apply(app: &AppHandle, effects: Vec<Effect>) {
    for effect in effects {
        log::debug!("Applying {effect:?}");
        if let Err(e) = apply_one(app, effect) {
            log::warn!("{e}");
        }
    }
}

fn apply_one(app: &AppHandle, effect: Effect) -> Result<(), String> {
    match effect {
        Effect::OpenExternal(url) => app
            .opener()
            .open_url(url.as_str(), None::<&str>)
            .map_err(|e| format!("Failed to open {url} externally: {e}")),
        Effect::OpenChild(url) => open_child(app, &url),
        Effect::OpenHiddenAuxiliary { url, .. } => open_phantom(app, &url, None).map(|_| ()),
        Effect::StripChildMenu => {
            let children = PopupSurfaces { app: app.clone() };
            tauri::async_runtime::spawn(async move {
                strip_child_menu(&children).await;
            });
            Ok(())
        }
        Effect::ImportCertificate { path, password } => {
            std::thread::spawn(move || certificate::import_and_log(&path, password.as_deref()));
            Ok(())
        }
        Effect::PersistGeometry(geometry) => {
            let state = app.state::<AppState>();
            state
                .window_state
                .save(&geometry)
                .map_err(|e| format!("Failed to persist window state: {e}"))
        }
        Effect::Quit => {
            app.exit(0);
            Ok(())
        }
        effect => {
            let Some(window) = app.get_webview_window(MAIN_WINDOW_LABEL) else {
                log::debug!("No primary surface for {effect:?}");
                return Ok(());
            };
            apply_to_surface(app, &window, effect)
        }
    }
}

fn apply_to_surface(app: &AppHandle, window: &WebviewWindow, effect: Effect) -> Result<(), String> {
    match effect {
        Effect::LoadUrl(url) => {
            let url: Url = url
                .parse()
                .map_err(|e| format!("Invalid navigation target {url}: {e}"))?;
            window
                .navigate(url)
                .map_err(|e| format!("Failed to navigate: {e}"))
        }
        Effect::Show => window.show().map_err(|e| format!("Failed to show window: {e}")),
        Effect::Hide => window.hide().map_err(|e| format!("Failed to hide window: {e}")),
        Effect::RestoreAndFocus => restore_and_focus(window).map_err(|e| format!("Failed to restore window: {e}")),
        Effect::OpenDevTools => {
            window.open_devtools();
            Ok(())
        }
        Effect::ClearStorage => window
            .clear_all_browsing_data()
            .map_err(|e| format!("Failed to clear storage: {e}")),
        Effect::SendToPage(signal) => {
            let channel = signal.channel();
            let sent = match signal {
                PageSignal::PageTitle(title) => window.emit(channel, title),
                PageSignal::EnableWakeLock | PageSignal::DisableWakeLock => window.emit(channel, ()),
            };
            sent.map_err(|e| format!("Failed to send {channel}: {e}"))
        }
        Effect::RunScript(script) => {
            // Probes for optional page elements; failure is expected.
            if let Err(e) = window.eval(script) {
                log::debug!("Probe script failed: {e}");
            }
            Ok(())
        }
        Effect::InjectStyles => {
            let config = app.state::<AppState>().with_controller(|c| c.shared_config());
            collaborators::inject_custom_css(window, &config)
        }
        Effect::WatchConnectivity => {
            let config = app.state::<AppState>().with_controller(|c| c.shared_config());
            collaborators::reload_on_reconnect(window, &config);
            Ok(())
        }
        Effect::ConfigureSpellCheck(languages) => {
            let state = app.state::<AppState>();
            let mut provider = state.spellcheck.lock().map_err(|e| e.to_string())?;
            let system_locales: Vec<String> = tauri_plugin_os::locale().into_iter().collect();
            apply_languages(&mut *provider, &languages, &system_locales);
            Ok(())
        }
        other => Err(format!("Unhandled surface effect {other:?}")),
    }
}

fn restore_and_focus(window: &WebviewWindow) -> tauri::Result<()> {
    if window.is_minimized()? {
        window.unminimize()?;
    } else if !window.is_visible()? {
        // Closed to tray.
        window.show()?;
    }
    window.set_focus()
}

/// Child surface sharing the primary surface's session.
///
/// Parented, not modal, and opened by the shell rather than the page, so it
/// has no `window.opener`. Sign-in flows that `postMessage` back to the
/// opener do not complete here.
fn open_child(app: &AppHandle, url: &str) -> Result<(), String> {
    let state = app.state::<AppState>();
    let config = state.with_controller(|c| c.shared_config());
    let parent = app
        .get_webview_window(MAIN_WINDOW_LABEL)
        .ok_or("No primary surface to parent the popup")?;
    let url: Url = url.parse().map_err(|e| format!("Invalid popup url {url}: {e}"))?;
    let label = state.next_surface_label(POPUP_LABEL_PREFIX);

    let partition = config.partition_dir().map_err(|e| e.to_string())?;
    WebviewWindowBuilder::new(app, &label, WebviewUrl::External(url))
        .title(WINDOW_TITLE)
        .user_agent(&config.chrome_user_agent)
        .data_directory(partition)
        .parent(&parent)
        .map_err(|e| format!("Failed to parent popup: {e}"))?
        .build()
        .map_err(|e| format!("Failed to open popup: {e}"))?;

    log::debug!("Opened popup surface {label}");
    Ok(())
}

/// Hidden surface for a blank popup. With `features` it adopts the popup
/// the page opened, so the page's later redirect reaches it; without, it
/// starts fresh in the shared session.
fn open_phantom(
    app: &AppHandle,
    url: &str,
    features: Option<NewWindowFeatures>,
) -> Result<WebviewWindow, String> {
    let state = app.state::<AppState>();
    let config = state.with_controller(|c| c.shared_config());
    let url: Url = url.parse().map_err(|e| format!("Invalid phantom url {url}: {e}"))?;
    let label = state.next_surface_label(PHANTOM_LABEL_PREFIX);
    let navigation_app = app.clone();
    let navigation_label = label.clone();

    let mut builder = WebviewWindowBuilder::new(app, &label, WebviewUrl::External(url))
        .visible(false)
        .skip_taskbar(true)
        .user_agent(&config.chrome_user_agent)
        .on_navigation(move |url| on_phantom_navigation(&navigation_app, &navigation_label, url))
        .on_page_load(|window, payload| {
            // Only reached when the redirect was let through.
            if payload.event() == PageLoadEvent::Finished && payload.url().scheme() == "https" {
                if let Err(e) = window.close() {
                    log::warn!("Failed to close phantom surface {}: {e}", window.label());
                }
            }
        });

    builder = match features {
        Some(features) => builder.window_features(features),
        None => builder.data_directory(config.partition_dir().map_err(|e| e.to_string())?),
    };

    let window = builder
        .build()
        .map_err(|e| format!("Failed to open phantom surface: {e}"))?;

    log::debug!("Opened hidden surface {label}");
    Ok(window)
}

struct PopupSurfaces {
    app: AppHandle,
}

impl ChildSurfaces for PopupSurfaces {
    fn strip_first_child_menu(&self) -> bool {
        let Some(popup) = self
            .app
            .webview_windows()
            .into_iter()
            .filter(|(label, _)| label.starts_with(POPUP_LABEL_PREFIX))
            .min_by(|(a, _), (b, _)| a.cmp(b))
            .map(|(_, window)| window)
        else {
            return false;
        };

        match popup.remove_menu() {
            Ok(_) => true,
            Err(e) => {
                log::debug!("Failed to strip popup menu: {e}");
                false
            }
        }
    }
}
