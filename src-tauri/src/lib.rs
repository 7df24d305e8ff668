//! Desktop shell around the Microsoft Teams web application.
//!
//! The shell's decisions live in `services` and never touch a webview; the
//! Tauri host behind the `desktop` feature turns webview callbacks into
//! controller events and applies the resulting effects.

pub mod config;
pub mod effects;
pub mod error;
pub mod services;

#[cfg(feature = "desktop")]
mod commands;
#[cfg(feature = "desktop")]
mod host;
#[cfg(feature = "desktop")]
mod state;

/// Application entry point. Sets up all plugins and initializes the app.
#[cfg(feature = "desktop")]
#[cfg_attr(mobile, tauri::mobile_entry_point)]
pub fn run() {
    use config::AppConfig;

    // Read before the logger exists; failures are reported from `setup`.
    let (config, config_error) = match AppConfig::default_path().and_then(|path| AppConfig::load(&path)) {
        Ok(config) => (config, None),
        Err(e) => (AppConfig::default(), Some(e)),
    };

    let mut app_builder = tauri::Builder::default();

    // Single instance plugin must be registered FIRST
    #[cfg(desktop)]
    {
        app_builder = app_builder.plugin(tauri_plugin_single_instance::init(|app, args, _cwd| {
            host::on_second_instance(app, args);
        }));
    }

    app_builder
        .plugin(
            tauri_plugin_log::Builder::new()
                .level(config.log_level())
                .targets([
                    tauri_plugin_log::Target::new(tauri_plugin_log::TargetKind::Stdout),
                    tauri_plugin_log::Target::new(tauri_plugin_log::TargetKind::Webview),
                ])
                .build(),
        )
        .plugin(tauri_plugin_opener::init())
        .plugin(tauri_plugin_dialog::init())
        .plugin(tauri_plugin_os::init())
        .setup(move |app| {
            log::info!("Application starting up");
            log::debug!(
                "App handle initialized for package: {}",
                app.package_info().name
            );

            if let Some(e) = config_error {
                log::error!("Failed to load config, using defaults: {e}");
            }

            host::initialize(app.handle(), config)?;
            Ok(())
        })
        .invoke_handler(tauri::generate_handler![
            commands::calls::call_connected,
            commands::calls::call_disconnected,
            commands::screen_share::select_source,
        ])
        .on_window_event(host::on_window_event)
        .run(tauri::generate_context!())
        .expect("error while running tauri application");
}
