//! Models module
//! Shared data types and structures between frontend and backend
//! All types here should be serializable/deserializable for IPC

use serde::{Deserialize, Serialize};

/// Connection data of a remote pod, as stored by the pod library
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PodRecord {
    pub ip: String,
    pub port: u16,
    pub local_port: u16,
    pub ssh_url: String,
}

/// Terminal tab info
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tab {
    pub id: String,
    pub title: String,
    pub active: bool,
}

/// Where an externally triggered command is executed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TerminalBehavior {
    #[serde(rename = "current")]
    CurrentTab,
    #[default]
    #[serde(rename = "new-tab")]
    NewTab,
}

/// Payload of the `terminal:exit:<id>` event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExitPayload {
    pub exit_code: i32,
    pub signal: Option<i32>,
}
