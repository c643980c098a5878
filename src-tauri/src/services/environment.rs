//! Environment builder
//! Bundled desktop apps start with a minimal PATH, so tools installed through
//! package managers or version managers are invisible to spawned shells.
//! This module extends the inherited environment with the usual locations.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use super::platform::Platform;

/// Variable name to value, keys unique.
pub type EnvironmentMap = BTreeMap<String, String>;

/// Snapshot of the current process environment. Non-unicode entries are skipped.
pub fn from_process() -> EnvironmentMap {
    std::env::vars_os()
        .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)))
        .collect()
}

/// Find a variable, honoring the platform's case rules. Returns the stored key and value.
pub fn lookup<'a>(
    env: &'a EnvironmentMap,
    name: &str,
    platform: Platform,
) -> Option<(&'a str, &'a str)> {
    if let Some((key, value)) = env.get_key_value(name) {
        return Some((key.as_str(), value.as_str()));
    }
    env.iter()
        .find(|(key, _)| platform.same_var_name(key, name))
        .map(|(key, value)| (key.as_str(), value.as_str()))
}

fn lookup_value<'a>(env: &'a EnvironmentMap, name: &str, platform: Platform) -> Option<&'a str> {
    lookup(env, name, platform)
        .map(|(_, value)| value)
        .filter(|value| !value.is_empty())
}

/// Common binary directories for the platform, in the order they should be searched.
pub fn common_paths(env: &EnvironmentMap, platform: Platform) -> Vec<String> {
    let mut paths = Vec::new();

    match platform {
        Platform::Windows => {
            let program_files =
                lookup_value(env, "ProgramFiles", platform).unwrap_or(r"C:\Program Files");
            let program_data =
                lookup_value(env, "ProgramData", platform).unwrap_or(r"C:\ProgramData");
            let system_root = lookup_value(env, "SystemRoot", platform).unwrap_or(r"C:\Windows");

            paths.push(format!(r"{program_files}\nodejs"));
            if let Some(app_data) = lookup_value(env, "APPDATA", platform) {
                paths.push(format!(r"{app_data}\npm"));
            }
            if let Some(profile) = lookup_value(env, "USERPROFILE", platform) {
                paths.push(format!(r"{profile}\scoop\shims"));
            }
            paths.push(format!(r"{program_data}\chocolatey\bin"));
            paths.push(format!(r"{system_root}\System32"));
            if let Some(local) = lookup_value(env, "LOCALAPPDATA", platform) {
                paths.push(format!(r"{local}\Microsoft\WindowsApps"));
            }
        }
        Platform::MacOs { .. } | Platform::Linux => {
            let home = lookup_value(env, "HOME", platform);

            // Node bin picked by nvm, ahead of everything else
            if let Some(nvm_bin) = home.and_then(|h| nvm_node_bin(Path::new(h))) {
                paths.push(nvm_bin.to_string_lossy().into_owned());
            }
            if let Platform::MacOs {
                apple_silicon: true,
            } = platform
            {
                paths.push("/opt/homebrew/bin".to_string());
                paths.push("/opt/homebrew/sbin".to_string());
            }
            paths.push("/usr/local/bin".to_string());
            paths.push("/usr/local/sbin".to_string());
            if let Some(home) = home {
                paths.push(format!("{}/.local/bin", home.trim_end_matches('/')));
            }
            paths.push("/usr/bin".to_string());
            paths.push("/bin".to_string());
            paths.push("/usr/sbin".to_string());
            paths.push("/sbin".to_string());
        }
    }

    paths
}

/// Entries of `candidates` not already contained in `current_path`.
fn missing_entries(current_path: &str, candidates: &[String], platform: Platform) -> Vec<String> {
    let fold = |s: &str| {
        if platform.is_windows() {
            s.to_lowercase()
        } else {
            s.to_string()
        }
    };
    let haystack = fold(current_path);

    let mut missing: Vec<String> = Vec::new();
    for candidate in candidates {
        let needle = fold(candidate.as_str());
        if haystack.contains(&needle) || missing.iter().any(|m| fold(m.as_str()) == needle) {
            continue;
        }
        missing.push(candidate.clone());
    }
    missing
}

/// Build the environment for a spawned shell.
///
/// Missing common directories are prepended to the search path; existing
/// entries keep their order and every other variable is left untouched.
/// Running it on its own output adds nothing.
pub fn build(base: &EnvironmentMap, platform: Platform) -> EnvironmentMap {
    let (key, current) = match lookup(base, "PATH", platform) {
        Some((key, value)) => (key.to_string(), value.to_string()),
        None => ("PATH".to_string(), String::new()),
    };

    let missing = missing_entries(&current, &common_paths(base, platform), platform);
    let mut env = base.clone();
    if missing.is_empty() {
        return env;
    }

    let separator = platform.path_separator();
    let mut value = missing.join(&separator.to_string());
    if !current.is_empty() {
        value.push(separator);
        value.push_str(&current);
    }

    log::debug!("Extended {} with {} entries", key, missing.len());
    env.insert(key, value);
    env
}

/// Node bin directory selected by nvm: the version matching the default
/// alias, or the newest installed version when there is no usable alias.
fn nvm_node_bin(home: &Path) -> Option<PathBuf> {
    let nvm_dir = home.join(".nvm");
    let versions_dir = nvm_dir.join("versions").join("node");

    let mut versions: Vec<String> = std::fs::read_dir(&versions_dir)
        .ok()?
        .filter_map(|e| e.ok())
        .filter_map(|e| e.file_name().into_string().ok())
        .filter(|name| name.starts_with('v'))
        .collect();

    if versions.is_empty() {
        return None;
    }
    sort_versions_semver(&mut versions);

    let default_alias = std::fs::read_to_string(nvm_dir.join("alias").join("default"))
        .ok()
        .map(|s| s.trim().trim_start_matches('v').to_string())
        .filter(|s| !s.is_empty());

    // "22" matches "v22.16.0"; prefer the newest match
    let selected = default_alias
        .and_then(|alias| {
            versions
                .iter()
                .rev()
                .find(|v| v.trim_start_matches('v').starts_with(&alias))
                .cloned()
        })
        .or_else(|| versions.last().cloned())?;

    let node_bin = versions_dir.join(selected).join("bin");
    node_bin.is_dir().then_some(node_bin)
}

/// Sort node versions by semver (e.g., v18.20.8 < v20.19.5 < v22.16.0)
fn sort_versions_semver(versions: &mut [String]) {
    let parse_version = |v: &str| -> (u32, u32, u32) {
        let nums: Vec<u32> = v
            .trim_start_matches('v')
            .split('.')
            .filter_map(|s| s.parse().ok())
            .collect();
        (
            nums.first().copied().unwrap_or(0),
            nums.get(1).copied().unwrap_or(0),
            nums.get(2).copied().unwrap_or(0),
        )
    };
    versions.sort_by_key(|v| parse_version(v.as_str()));
}
