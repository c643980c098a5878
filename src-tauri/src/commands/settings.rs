//! Settings commands

use tauri::State;

use super::SettingsState;
use crate::error::AppError;
use crate::services::{Settings, SettingsPatch};

#[tauri::command]
pub fn settings_get(state: State<'_, SettingsState>) -> Settings {
    state.0.lock().get().clone()
}

#[tauri::command]
pub fn settings_update(state: State<'_, SettingsState>, patch: SettingsPatch) -> Result<Settings, AppError> {
    state.0.lock().update(patch)
}

#[tauri::command]
pub fn settings_reset(state: State<'_, SettingsState>) -> Result<Settings, AppError> {
    state.0.lock().reset()
}

#[tauri::command]
pub fn settings_export(state: State<'_, SettingsState>) -> Result<String, AppError> {
    state.0.lock().export()
}

#[tauri::command]
pub fn settings_import(state: State<'_, SettingsState>, json: String) -> Result<Settings, AppError> {
    state.0.lock().import(&json)
}
