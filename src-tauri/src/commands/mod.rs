//! Commands module
//! All Tauri commands (IPC handlers) are defined here
//! Commands act as the boundary between frontend (React/TS) and backend (Rust)

pub mod settings;
pub mod tabs;
pub mod templates;
pub mod terminal;

use parking_lot::Mutex;
use std::sync::Arc;
use tauri::{AppHandle, Emitter, Runtime};

use crate::models::ExitPayload;
use crate::services::{OutputSink, SessionManager, SettingsStore, TabController};

/// Terminal sessions and the tabs bound to them
pub struct TerminalState {
    pub sessions: Arc<SessionManager>,
    pub tabs: Mutex<TabController<Arc<SessionManager>>>,
}

pub struct SettingsState(pub Mutex<SettingsStore>);

/// Forwards session output to the webview as `terminal:data:<id>` / `terminal:exit:<id>`
pub struct WebviewSink<R: Runtime>(pub AppHandle<R>);

impl<R: Runtime> OutputSink for WebviewSink<R> {
    fn on_output(&self, id: &str, data: &str) {
        // Window may be gone during shutdown; dropping output is fine then
        let _ = self.0.emit(&format!("terminal:data:{}", id), data);
    }

    fn on_exit(&self, id: &str, exit_code: i32, signal: Option<i32>) {
        let _ = self
            .0
            .emit(&format!("terminal:exit:{}", id), ExitPayload { exit_code, signal });
    }
}
