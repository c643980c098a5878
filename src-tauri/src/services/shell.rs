//! Shell resolution
//! Picks the shell binary and arguments for a new terminal session.

use std::path::{Path, PathBuf};

use super::environment::{lookup, EnvironmentMap};
use super::platform::Platform;

/// Executable plus ordered arguments, computed once per session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellConfig {
    pub executable: String,
    pub arguments: Vec<String>,
}

impl ShellConfig {
    pub fn new(executable: impl Into<String>, arguments: &[&str]) -> Self {
        Self {
            executable: executable.into(),
            arguments: arguments.iter().map(|a| a.to_string()).collect(),
        }
    }
}

/// Filesystem probes used while resolving a shell.
pub trait ShellProbe {
    /// Look `name` up in the given search-path value.
    fn find_on_path(&self, name: &str, search_path: &str) -> Option<PathBuf>;
    fn is_file(&self, path: &Path) -> bool;
}

/// Probes the real filesystem.
pub struct SystemProbe;

impl ShellProbe for SystemProbe {
    fn find_on_path(&self, name: &str, search_path: &str) -> Option<PathBuf> {
        let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        which::which_in(name, Some(search_path), cwd).ok()
    }

    fn is_file(&self, path: &Path) -> bool {
        path.is_file()
    }
}

const PWSH: &str = "pwsh.exe";
const WINDOWS_FALLBACK_SHELL: &str = "powershell.exe";
const POWERSHELL_ARGS: &[&str] = &["-NoLogo", "-ExecutionPolicy", "Bypass"];
const LOGIN_FLAG: &str = "-l";

/// Resolve the shell for `platform` against the real filesystem.
pub fn resolve(platform: Platform, env: &EnvironmentMap) -> ShellConfig {
    resolve_with(platform, env, &SystemProbe)
}

/// Resolve the shell for `platform`. Never fails: the platform default is
/// returned when no preferred shell is installed.
pub fn resolve_with(platform: Platform, env: &EnvironmentMap, probe: &dyn ShellProbe) -> ShellConfig {
    match platform {
        Platform::Windows => {
            let executable = find_pwsh(env, probe)
                .unwrap_or_else(|| WINDOWS_FALLBACK_SHELL.to_string());
            ShellConfig::new(executable, POWERSHELL_ARGS)
        }
        Platform::MacOs { .. } | Platform::Linux => {
            let default_shell = if matches!(platform, Platform::MacOs { .. }) {
                "/bin/zsh"
            } else {
                "/bin/bash"
            };
            let shell = lookup(env, "SHELL", platform)
                .map(|(_, value)| value.trim())
                .filter(|value| !value.is_empty())
                .unwrap_or(default_shell);
            // Login shell so profile-configured paths and version managers load
            ShellConfig::new(shell, &[LOGIN_FLAG])
        }
    }
}

/// PowerShell 7: search path first, then the two standard install locations.
fn find_pwsh(env: &EnvironmentMap, probe: &dyn ShellProbe) -> Option<String> {
    let platform = Platform::Windows;

    if let Some((_, search_path)) = lookup(env, "PATH", platform) {
        if let Some(found) = probe.find_on_path(PWSH, search_path) {
            return Some(found.to_string_lossy().into_owned());
        }
    }

    let program_files = lookup(env, "ProgramFiles", platform)
        .map(|(_, v)| v.to_string())
        .unwrap_or_else(|| r"C:\Program Files".to_string());
    let program_files_x86 = lookup(env, "ProgramFiles(x86)", platform)
        .map(|(_, v)| v.to_string())
        .unwrap_or_else(|| r"C:\Program Files (x86)".to_string());

    [program_files, program_files_x86]
        .iter()
        .map(|base| format!(r"{base}\PowerShell\7\{PWSH}"))
        .find(|candidate| probe.is_file(Path::new(candidate)))
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FakeProbe {
        on_path: Option<&'static str>,
        files: Vec<&'static str>,
    }

    impl ShellProbe for FakeProbe {
        fn find_on_path(&self, _name: &str, _search_path: &str) -> Option<PathBuf> {
            self.on_path.map(PathBuf::from)
        }

        fn is_file(&self, path: &Path) -> bool {
            self.files.iter().any(|f| Path::new(f) == path)
        }
    }

    fn no_shells() -> FakeProbe {
        FakeProbe {
            on_path: None,
            files: Vec::new(),
        }
    }

    fn env(pairs: &[(&str, &str)]) -> EnvironmentMap {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn unix_uses_configured_shell_as_login_shell() {
        let config = resolve_with(Platform::Linux, &env(&[("SHELL", "/usr/bin/fish")]), &no_shells());
        assert_eq!(config, ShellConfig::new("/usr/bin/fish", &["-l"]));
    }

    #[test]
    fn unix_falls_back_when_shell_unset() {
        let linux = resolve_with(Platform::Linux, &env(&[]), &no_shells());
        assert_eq!(linux.executable, "/bin/bash");

        let mac = resolve_with(
            Platform::MacOs { apple_silicon: true },
            &env(&[("SHELL", "")]),
            &no_shells(),
        );
        assert_eq!(mac, ShellConfig::new("/bin/zsh", &["-l"]));
    }

    #[test]
    fn windows_prefers_pwsh_on_path() {
        let probe = FakeProbe {
            on_path: Some(r"C:\tools\pwsh.exe"),
            files: vec![r"C:\Program Files\PowerShell\7\pwsh.exe"],
        };
        let config = resolve_with(Platform::Windows, &env(&[("Path", r"C:\tools")]), &probe);
        assert_eq!(config.executable, r"C:\tools\pwsh.exe");
        assert_eq!(config.arguments, vec!["-NoLogo", "-ExecutionPolicy", "Bypass"]);
    }

    #[test]
    fn windows_checks_install_directories_in_order() {
        let probe = FakeProbe {
            on_path: None,
            files: vec![r"C:\Program Files (x86)\PowerShell\7\pwsh.exe"],
        };
        let config = resolve_with(Platform::Windows, &env(&[("Path", r"C:\Windows")]), &probe);
        assert_eq!(config.executable, r"C:\Program Files (x86)\PowerShell\7\pwsh.exe");
    }

    #[test]
    fn windows_falls_back_to_bundled_powershell() {
        let config = resolve_with(Platform::Windows, &env(&[]), &no_shells());
        assert_eq!(
            config,
            ShellConfig::new("powershell.exe", &["-NoLogo", "-ExecutionPolicy", "Bypass"])
        );
    }
}
