//! Terminal tabs
//! Ordered tab list, each tab bound 1:1 to a terminal session, plus the policy
//! deciding which session receives an externally triggered command.

use std::sync::Arc;

use uuid::Uuid;

use super::pty::SessionManager;
use crate::error::{AppError, Result};
use crate::models::{Tab, TerminalBehavior};

/// The session operations tabs rely on.
pub trait SessionBackend: Send + Sync {
    fn create(&self, id: &str) -> Result<()>;
    fn write(&self, id: &str, data: &str);
    fn kill(&self, id: &str);
}

impl SessionBackend for SessionManager {
    fn create(&self, id: &str) -> Result<()> {
        SessionManager::create(self, id).map(|_| ())
    }

    fn write(&self, id: &str, data: &str) {
        SessionManager::write(self, id, data)
    }

    fn kill(&self, id: &str) {
        SessionManager::kill(self, id)
    }
}

impl<B: SessionBackend + ?Sized> SessionBackend for Arc<B> {
    fn create(&self, id: &str) -> Result<()> {
        (**self).create(id)
    }

    fn write(&self, id: &str, data: &str) {
        (**self).write(id, data)
    }

    fn kill(&self, id: &str) {
        (**self).kill(id)
    }
}

/// Never empty; exactly one tab is active.
pub struct TabController<B: SessionBackend> {
    backend: B,
    tabs: Vec<Tab>,
}

fn generate_id() -> String {
    format!("terminal-{}", Uuid::new_v4())
}

impl<B: SessionBackend> TabController<B> {
    /// Start with a single active tab and its session.
    pub fn open(backend: B) -> Result<Self> {
        let mut controller = Self {
            backend,
            tabs: Vec::new(),
        };
        controller.new_tab()?;
        Ok(controller)
    }

    pub fn tabs(&self) -> &[Tab] {
        &self.tabs
    }

    pub fn active_tab(&self) -> Option<&Tab> {
        self.tabs.iter().find(|tab| tab.active)
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Activate `id`. Unknown ids leave the selection unchanged.
    pub fn select_tab(&mut self, id: &str) -> bool {
        if !self.tabs.iter().any(|tab| tab.id == id) {
            log::debug!("Tab {} not found for select", id);
            return false;
        }
        for tab in &mut self.tabs {
            tab.active = tab.id == id;
        }
        true
    }

    /// Open a new tab with its own session and make it active.
    ///
    /// Nothing changes when the session cannot be spawned.
    pub fn new_tab(&mut self) -> Result<String> {
        let id = generate_id();
        self.backend.create(&id)?;

        for tab in &mut self.tabs {
            tab.active = false;
        }
        self.tabs.push(Tab {
            id: id.clone(),
            title: format!("Terminal {}", self.tabs.len() + 1),
            active: true,
        });
        Ok(id)
    }

    /// Close `id` and kill its session.
    ///
    /// The last tab is replaced by a fresh tab and session instead of leaving
    /// the list empty. Closing the active tab activates the one before it.
    pub fn close_tab(&mut self, id: &str) -> Result<()> {
        let Some(index) = self.tabs.iter().position(|tab| tab.id == id) else {
            log::debug!("Tab {} not found for close", id);
            return Ok(());
        };

        if self.tabs.len() == 1 {
            let replacement = generate_id();
            self.backend.create(&replacement)?;
            self.backend.kill(id);
            self.tabs = vec![Tab {
                id: replacement,
                title: "Terminal 1".to_string(),
                active: true,
            }];
            return Ok(());
        }

        let closed = self.tabs.remove(index);
        self.backend.kill(&closed.id);
        if closed.active {
            let next = index.saturating_sub(1);
            self.tabs[next].active = true;
        }
        Ok(())
    }

    /// Execute `command` in a terminal chosen by `behavior`; returns the session written to.
    pub fn route_command(&mut self, command: &str, behavior: TerminalBehavior) -> Result<String> {
        let target = match behavior {
            // create() returns once the shell is spawned, so the session is ready for input
            TerminalBehavior::NewTab => self.new_tab()?,
            TerminalBehavior::CurrentTab => self
                .active_tab()
                .map(|tab| tab.id.clone())
                .ok_or_else(|| AppError::TabNotFound("no active tab".to_string()))?,
        };

        self.backend.write(&target, &format!("{}\n", command));
        Ok(target)
    }
}
