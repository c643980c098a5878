//! Template commands
//! Turn stored commands and pod records into literal shell commands

use serde::Deserialize;
use tauri::State;

use super::SettingsState;
use crate::models::PodRecord;
use crate::services::templates;

/// Which standard command to build
#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum BuildRequest {
    Ssh,
    Tunnel { remote_port: Option<u16> },
    Upload { local_file: String, remote_target: String },
    Download { remote_file: String, local_target: String },
}

fn key_path(settings: &SettingsState, ssh_key_path: Option<String>) -> String {
    ssh_key_path
        .filter(|p| !p.trim().is_empty())
        .unwrap_or_else(|| settings.0.lock().get().effective_ssh_key_path().to_string())
}

#[tauri::command]
pub fn template_substitute(
    settings: State<'_, SettingsState>,
    template: String,
    pod: PodRecord,
    ssh_key_path: Option<String>,
) -> String {
    let key = key_path(&settings, ssh_key_path);
    templates::substitute(&template, &pod, &key)
}

#[tauri::command]
pub fn template_variables(template: String) -> Vec<String> {
    templates::extract_variables(&template)
        .into_iter()
        .map(String::from)
        .collect()
}

#[tauri::command]
pub fn template_build(
    settings: State<'_, SettingsState>,
    pod: PodRecord,
    request: BuildRequest,
    ssh_key_path: Option<String>,
) -> String {
    let key = key_path(&settings, ssh_key_path);
    match request {
        BuildRequest::Ssh => templates::build_ssh(&pod, &key),
        BuildRequest::Tunnel { remote_port } => templates::build_tunnel(
            &pod,
            &key,
            remote_port.unwrap_or(templates::DEFAULT_TUNNEL_REMOTE_PORT),
        ),
        BuildRequest::Upload {
            local_file,
            remote_target,
        } => templates::build_upload(&pod, &key, &local_file, &remote_target),
        BuildRequest::Download {
            remote_file,
            local_target,
        } => templates::build_download(&pod, &key, &remote_file, &local_target),
    }
}
