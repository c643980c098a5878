//! Pod control panel backend
//! Terminal sessions for a desktop app that manages remote compute pods
//!
//! Module structure:
//! - services: session multiplexer, shell/environment resolution, tabs,
//!   command templates, settings
//! - commands: Tauri IPC handlers (frontend → backend), `tauri` feature only
//! - models: Shared data types
//!
//! A desktop host wires it up like this:
//!
//! ```ignore
//! tauri::Builder::default()
//!     .setup(|app| Ok(podpanel_lib::setup(app.handle())?))
//!     .invoke_handler(podpanel_lib::invoke_handler())
//!     .build(tauri::generate_context!())?
//!     .run(podpanel_lib::on_run_event);
//! ```

#[cfg(feature = "tauri")]
pub mod commands;
pub mod error;
pub mod models;
pub mod services;

pub use error::{AppError, Result};

#[cfg(feature = "tauri")]
use tauri::{ipc::Invoke, AppHandle, Manager, RunEvent, Runtime};

/// Create the session manager, the initial tab and the settings store, and
/// hand them to Tauri's state.
#[cfg(feature = "tauri")]
pub fn setup<R: Runtime>(app: &AppHandle<R>) -> std::result::Result<(), Box<dyn std::error::Error>> {
    use parking_lot::Mutex;
    use std::sync::Arc;

    use commands::{SettingsState, TerminalState, WebviewSink};
    use services::settings::SETTINGS_FILE_NAME;
    use services::{SessionManager, SettingsStore, TabController};

    if cfg!(debug_assertions) {
        app.plugin(
            tauri_plugin_log::Builder::default()
                .level(log::LevelFilter::Info)
                .build(),
        )?;
    }

    let settings_path = app.path().app_config_dir()?.join(SETTINGS_FILE_NAME);
    app.manage(SettingsState(Mutex::new(SettingsStore::open(settings_path)?)));

    let sessions = Arc::new(SessionManager::new());
    sessions.set_sink(Arc::new(WebviewSink(app.clone())));
    let tabs = TabController::open(sessions.clone())?;
    app.manage(TerminalState {
        sessions,
        tabs: Mutex::new(tabs),
    });

    Ok(())
}

#[cfg(feature = "tauri")]
pub fn invoke_handler<R: Runtime>() -> impl Fn(Invoke<R>) -> bool + Send + Sync + 'static {
    tauri::generate_handler![
        commands::terminal::terminal_create,
        commands::terminal::terminal_write,
        commands::terminal::terminal_resize,
        commands::terminal::terminal_kill,
        commands::terminal::terminal_count,
        commands::tabs::tabs_list,
        commands::tabs::tabs_new,
        commands::tabs::tabs_select,
        commands::tabs::tabs_close,
        commands::tabs::tabs_route_command,
        commands::templates::template_substitute,
        commands::templates::template_variables,
        commands::templates::template_build,
        commands::settings::settings_get,
        commands::settings::settings_update,
        commands::settings::settings_reset,
        commands::settings::settings_export,
        commands::settings::settings_import,
    ]
}

/// Kill every terminal when the app exits.
#[cfg(feature = "tauri")]
pub fn on_run_event<R: Runtime>(app: &AppHandle<R>, event: RunEvent) {
    if let RunEvent::Exit = event {
        log::info!("App shutting down - cleaning up PTY processes");
        if let Some(state) = app.try_state::<commands::TerminalState>() {
            state.sessions.shutdown();
        }
    }
}
