//! Terminal commands
//! Session-level operations keyed by the tab id the frontend supplies

use tauri::State;

use super::TerminalState;
use crate::error::AppError;

/// Spawn a shell for `id`; a live session with that id is left as is
#[tauri::command]
pub fn terminal_create(state: State<'_, TerminalState>, id: String) -> Result<(), AppError> {
    state.sessions.create(&id)?;
    Ok(())
}

#[tauri::command]
pub fn terminal_write(state: State<'_, TerminalState>, id: String, data: String) {
    state.sessions.write(&id, &data);
}

#[tauri::command]
pub fn terminal_resize(state: State<'_, TerminalState>, id: String, cols: u16, rows: u16) {
    state.sessions.resize(&id, cols, rows);
}

#[tauri::command]
pub fn terminal_kill(state: State<'_, TerminalState>, id: String) {
    state.sessions.kill(&id);
}

#[tauri::command]
pub fn terminal_count(state: State<'_, TerminalState>) -> usize {
    state.sessions.count()
}
