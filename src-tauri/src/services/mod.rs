//! Services module
//! Business logic for terminal sessions, shell resolution and command templates.
//! Separated from commands module so it runs without a webview

pub mod environment;
pub mod platform;
pub mod pty;
pub mod settings;
pub mod shell;
pub mod tabs;
pub mod templates;

pub use platform::Platform;
pub use pty::{OutputSink, SessionManager, SessionOptions, SpawnOutcome};
pub use settings::{Settings, SettingsPatch, SettingsStore};
pub use shell::ShellConfig;
pub use tabs::{SessionBackend, TabController};
