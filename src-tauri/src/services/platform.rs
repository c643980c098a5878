//! Host platform, as far as shell and search-path resolution care.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Windows,
    MacOs { apple_silicon: bool },
    Linux,
}

impl Platform {
    /// The platform this binary was compiled for.
    pub fn current() -> Self {
        if cfg!(windows) {
            Platform::Windows
        } else if cfg!(target_os = "macos") {
            Platform::MacOs {
                apple_silicon: cfg!(target_arch = "aarch64"),
            }
        } else {
            Platform::Linux
        }
    }

    pub fn is_windows(self) -> bool {
        matches!(self, Platform::Windows)
    }

    /// Separator between entries of the search-path variable.
    pub fn path_separator(self) -> char {
        if self.is_windows() {
            ';'
        } else {
            ':'
        }
    }

    /// Environment variable names are case-insensitive on Windows.
    pub fn same_var_name(self, a: &str, b: &str) -> bool {
        if self.is_windows() {
            a.eq_ignore_ascii_case(b)
        } else {
            a == b
        }
    }
}
