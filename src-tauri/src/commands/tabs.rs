//! Tab commands
//! Every command returns the tab list after the change so the UI can re-render

use tauri::State;

use super::{SettingsState, TerminalState};
use crate::error::AppError;
use crate::models::{Tab, TerminalBehavior};

#[tauri::command]
pub fn tabs_list(state: State<'_, TerminalState>) -> Vec<Tab> {
    state.tabs.lock().tabs().to_vec()
}

#[tauri::command]
pub fn tabs_new(state: State<'_, TerminalState>) -> Result<Vec<Tab>, AppError> {
    let mut tabs = state.tabs.lock();
    tabs.new_tab()?;
    Ok(tabs.tabs().to_vec())
}

#[tauri::command]
pub fn tabs_select(state: State<'_, TerminalState>, id: String) -> Vec<Tab> {
    let mut tabs = state.tabs.lock();
    tabs.select_tab(&id);
    tabs.tabs().to_vec()
}

#[tauri::command]
pub fn tabs_close(state: State<'_, TerminalState>, id: String) -> Result<Vec<Tab>, AppError> {
    let mut tabs = state.tabs.lock();
    tabs.close_tab(&id)?;
    Ok(tabs.tabs().to_vec())
}

/// Run `command` in the current or a new tab; `behavior` defaults to the settings value
#[tauri::command]
pub fn tabs_route_command(
    state: State<'_, TerminalState>,
    settings: State<'_, SettingsState>,
    command: String,
    behavior: Option<TerminalBehavior>,
) -> Result<Vec<Tab>, AppError> {
    let behavior =
        behavior.unwrap_or_else(|| settings.0.lock().get().default_terminal_behavior);
    let mut tabs = state.tabs.lock();
    tabs.route_command(&command, behavior)?;
    Ok(tabs.tabs().to_vec())
}
