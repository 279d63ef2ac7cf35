//! Canonical iSCSI request and response shapes
//!
//! These are what [`IscsiServer`](super::IscsiServer) works with. Every wire
//! version converts to and from them.

use crate::error::ProxyError;
use std::fmt;

/// Port used when a portal does not name one
pub const DEFAULT_ISCSI_PORT: u32 = 3260;

/// Network address and port of an iSCSI listener
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct TargetPortal {
    pub target_address: String,
    /// Zero means [`DEFAULT_ISCSI_PORT`]
    pub target_port: u32,
}

impl TargetPortal {
    pub fn new(target_address: impl Into<String>, target_port: u32) -> Self {
        Self {
            target_address: target_address.into(),
            target_port,
        }
    }

    pub fn effective_port(&self) -> u32 {
        if self.target_port == 0 {
            DEFAULT_ISCSI_PORT
        } else {
            self.target_port
        }
    }

    /// Same portal with the default port filled in
    pub fn normalized(&self) -> Self {
        Self {
            target_address: self.target_address.clone(),
            target_port: self.effective_port(),
        }
    }

    pub fn validate(&self) -> Result<(), ProxyError> {
        if self.target_address.trim().is_empty() {
            return Err(ProxyError::Validation("target portal address is required".to_string()));
        }
        if self.target_port > u16::MAX as u32 {
            return Err(ProxyError::Validation(format!(
                "target portal port {} is out of range",
                self.target_port
            )));
        }
        Ok(())
    }
}

impl fmt::Display for TargetPortal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.target_address, self.effective_port())
    }
}

/// How the initiator and target authenticate each other
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum AuthenticationType {
    #[default]
    None,
    /// Target authenticates the initiator
    OneWayChap,
    /// Both sides authenticate each other
    MutualChap,
}

impl AuthenticationType {
    pub fn uses_chap(self) -> bool {
        !matches!(self, AuthenticationType::None)
    }
}

impl fmt::Display for AuthenticationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AuthenticationType::None => "NONE",
            AuthenticationType::OneWayChap => "ONE_WAY_CHAP",
            AuthenticationType::MutualChap => "MUTUAL_CHAP",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddTargetPortalRequest {
    pub target_portal: TargetPortal,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddTargetPortalResponse {}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoveTargetPortalRequest {
    pub target_portal: TargetPortal,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoveTargetPortalResponse {}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListTargetPortalsRequest {}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListTargetPortalsResponse {
    pub target_portals: Vec<TargetPortal>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiscoverTargetPortalRequest {
    pub target_portal: TargetPortal,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiscoverTargetPortalResponse {
    pub iqns: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectTargetRequest {
    pub target_portal: TargetPortal,
    pub iqn: String,
    pub auth_type: AuthenticationType,
    pub chap_username: String,
    pub chap_secret: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectTargetResponse {}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DisconnectTargetRequest {
    pub target_portal: TargetPortal,
    pub iqn: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DisconnectTargetResponse {}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GetTargetDisksRequest {
    pub target_portal: TargetPortal,
    pub iqn: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GetTargetDisksResponse {
    pub disk_ids: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SetMutualChapSecretRequest {
    pub mutual_chap_secret: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SetMutualChapSecretResponse {}
