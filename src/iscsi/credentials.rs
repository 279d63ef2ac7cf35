//! Mutual CHAP secret store
//!
//! The secret the initiator expects targets to answer mutual CHAP challenges
//! with. It is process wide and last write wins: two callers connecting with
//! different mutual secrets at the same time race on it and must serialize
//! themselves.

use crate::error::ProxyError;
use std::sync::{PoisonError, RwLock};

/// Where the iSCSI server keeps the mutual CHAP secret
pub trait MutualChapStore: Send + Sync {
    fn set_secret(&self, secret: String);

    fn secret(&self) -> Option<String>;
}

/// In-memory store, lost on restart
#[derive(Debug, Default)]
pub struct ProcessChapStore {
    secret: RwLock<Option<String>>,
}

impl ProcessChapStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl MutualChapStore for ProcessChapStore {
    fn set_secret(&self, secret: String) {
        *self.secret.write().unwrap_or_else(PoisonError::into_inner) = Some(secret);
    }

    fn secret(&self) -> Option<String> {
        self.secret.read().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

/// A secret must be non-empty and free of control characters
pub fn validate_secret(secret: &str) -> Result<(), ProxyError> {
    if secret.is_empty() {
        return Err(ProxyError::Validation("CHAP secret must not be empty".to_string()));
    }
    if secret.chars().any(char::is_control) {
        return Err(ProxyError::Validation(
            "CHAP secret must not contain control characters".to_string(),
        ));
    }
    Ok(())
}
