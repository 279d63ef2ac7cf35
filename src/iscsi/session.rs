//! Session table
//!
//! Tracks the connection state of each (target IQN, portal) pair. A pair with
//! no entry is disconnected. Transitions:
//!
//! ```text
//! Disconnected -> Connecting -> Connected -> Disconnecting -> Disconnected
//!                      |                          |
//!                      +-> Disconnected           +-> Connected (logout failed)
//! ```

use super::types::{AuthenticationType, TargetPortal};
use crate::error::ProxyError;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::fmt;

/// Identity of a session
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionKey {
    pub iqn: String,
    /// Always normalized
    pub portal: TargetPortal,
}

impl SessionKey {
    pub fn new(portal: &TargetPortal, iqn: &str) -> Self {
        Self {
            iqn: iqn.to_string(),
            portal: portal.normalized(),
        }
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} via {}", self.iqn, self.portal)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connecting,
    Connected,
    Disconnecting,
}

#[derive(Debug, Clone)]
pub struct SessionRecord {
    pub state: SessionState,
    pub auth_type: AuthenticationType,
    pub connected_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Default)]
pub struct SessionTable {
    sessions: HashMap<SessionKey, SessionRecord>,
}

impl SessionTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self, key: &SessionKey) -> Option<SessionState> {
        self.sessions.get(key).map(|r| r.state)
    }

    pub fn record(&self, key: &SessionKey) -> Option<&SessionRecord> {
        self.sessions.get(key)
    }

    /// Disconnected -> Connecting
    pub fn begin_connect(
        &mut self,
        key: &SessionKey,
        auth_type: AuthenticationType,
    ) -> Result<(), ProxyError> {
        match self.state(key) {
            None => {
                self.sessions.insert(
                    key.clone(),
                    SessionRecord {
                        state: SessionState::Connecting,
                        auth_type,
                        connected_at: None,
                    },
                );
                Ok(())
            }
            Some(SessionState::Connected) => {
                Err(ProxyError::Connect(format!("{} is already connected", key)))
            }
            Some(state) => Err(ProxyError::Connect(format!("{} is busy ({:?})", key, state))),
        }
    }

    /// Connecting -> Connected
    pub fn finish_connect(&mut self, key: &SessionKey) {
        if let Some(record) = self.sessions.get_mut(key) {
            record.state = SessionState::Connected;
            record.connected_at = Some(Utc::now());
        }
    }

    /// Connecting -> Disconnected
    pub fn abort_connect(&mut self, key: &SessionKey) {
        if self.state(key) == Some(SessionState::Connecting) {
            self.sessions.remove(key);
        }
    }

    /// Connected -> Disconnecting
    pub fn begin_disconnect(&mut self, key: &SessionKey) -> Result<(), ProxyError> {
        match self.sessions.get_mut(key) {
            Some(record) if record.state == SessionState::Connected => {
                record.state = SessionState::Disconnecting;
                Ok(())
            }
            Some(record) => Err(ProxyError::Disconnect(format!(
                "{} is busy ({:?})",
                key, record.state
            ))),
            None => Err(ProxyError::Disconnect(format!("{} is not connected", key))),
        }
    }

    /// Disconnecting -> Disconnected
    pub fn finish_disconnect(&mut self, key: &SessionKey) {
        if self.state(key) == Some(SessionState::Disconnecting) {
            self.sessions.remove(key);
        }
    }

    /// Disconnecting -> Connected
    pub fn abort_disconnect(&mut self, key: &SessionKey) {
        if let Some(record) = self.sessions.get_mut(key) {
            if record.state == SessionState::Disconnecting {
                record.state = SessionState::Connected;
            }
        }
    }

    pub fn require_connected(&self, key: &SessionKey) -> Result<(), ProxyError> {
        match self.state(key) {
            Some(SessionState::Connected) => Ok(()),
            _ => Err(ProxyError::Connect(format!("{} is not connected", key))),
        }
    }

    pub fn connected_count(&self) -> usize {
        self.sessions
            .values()
            .filter(|r| r.state == SessionState::Connected)
            .count()
    }
}
