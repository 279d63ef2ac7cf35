//! iSCSI API v1alpha1
//!
//! The first release. It knows only NONE and ONE_WAY_CHAP and has no way to
//! set a mutual CHAP secret.

use super::server::IscsiServer;
use super::types;
use crate::error::{ConversionError, ProxyResult};
use crate::server::dispatch::{Dispatcher, Versioned};
use crate::server::{registered_version, ApiGroup};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub const VERSION: &str = "v1alpha1";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TargetPortal {
    pub target_address: String,
    pub target_port: u32,
}

impl From<TargetPortal> for types::TargetPortal {
    fn from(p: TargetPortal) -> Self {
        types::TargetPortal::new(p.target_address, p.target_port)
    }
}

impl From<types::TargetPortal> for TargetPortal {
    fn from(p: types::TargetPortal) -> Self {
        Self {
            target_address: p.target_address,
            target_port: p.target_port,
        }
    }
}

pub mod auth_type {
    pub const NONE: i32 = 0;
    pub const ONE_WAY_CHAP: i32 = 1;
}

portal_message!(AddTargetPortalRequest, AddTargetPortalRequest);
empty_message!(AddTargetPortalResponse, AddTargetPortalResponse);
portal_message!(RemoveTargetPortalRequest, RemoveTargetPortalRequest);
empty_message!(RemoveTargetPortalResponse, RemoveTargetPortalResponse);
empty_message!(ListTargetPortalsRequest, ListTargetPortalsRequest);
portal_message!(DiscoverTargetPortalRequest, DiscoverTargetPortalRequest);
empty_message!(ConnectTargetResponse, ConnectTargetResponse);
session_message!(DisconnectTargetRequest, DisconnectTargetRequest);
empty_message!(DisconnectTargetResponse, DisconnectTargetResponse);
session_message!(GetTargetDisksRequest, GetTargetDisksRequest);

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ListTargetPortalsResponse {
    pub target_portals: Vec<TargetPortal>,
}

impl Versioned for ListTargetPortalsResponse {
    type Canonical = types::ListTargetPortalsResponse;

    fn to_canonical(self) -> Result<Self::Canonical, ConversionError> {
        Ok(types::ListTargetPortalsResponse {
            target_portals: self.target_portals.into_iter().map(Into::into).collect(),
        })
    }

    fn from_canonical(c: Self::Canonical) -> Result<Self, ConversionError> {
        Ok(Self {
            target_portals: c.target_portals.into_iter().map(Into::into).collect(),
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoverTargetPortalResponse {
    pub iqns: Vec<String>,
}

impl Versioned for DiscoverTargetPortalResponse {
    type Canonical = types::DiscoverTargetPortalResponse;

    fn to_canonical(self) -> Result<Self::Canonical, ConversionError> {
        Ok(types::DiscoverTargetPortalResponse { iqns: self.iqns })
    }

    fn from_canonical(c: Self::Canonical) -> Result<Self, ConversionError> {
        Ok(Self { iqns: c.iqns })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConnectTargetRequest {
    pub target_portal: TargetPortal,
    pub iqn: String,
    pub auth_type: i32,
    pub chap_username: String,
    pub chap_secret: String,
}

impl Versioned for ConnectTargetRequest {
    type Canonical = types::ConnectTargetRequest;

    fn to_canonical(self) -> Result<Self::Canonical, ConversionError> {
        let auth_type = match self.auth_type {
            auth_type::NONE => types::AuthenticationType::None,
            auth_type::ONE_WAY_CHAP => types::AuthenticationType::OneWayChap,
            other => {
                return Err(ConversionError::new(format!(
                    "authentication type {} is not supported by {}",
                    other, VERSION
                )))
            }
        };

        Ok(types::ConnectTargetRequest {
            target_portal: self.target_portal.into(),
            iqn: self.iqn,
            auth_type,
            chap_username: self.chap_username,
            chap_secret: self.chap_secret,
        })
    }

    fn from_canonical(c: Self::Canonical) -> Result<Self, ConversionError> {
        let auth_type = match c.auth_type {
            types::AuthenticationType::None => auth_type::NONE,
            types::AuthenticationType::OneWayChap => auth_type::ONE_WAY_CHAP,
            types::AuthenticationType::MutualChap => {
                return Err(ConversionError::new(format!("{} has no MUTUAL_CHAP", VERSION)))
            }
        };

        Ok(Self {
            target_portal: c.target_portal.into(),
            iqn: c.iqn,
            auth_type,
            chap_username: c.chap_username,
            chap_secret: c.chap_secret,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GetTargetDisksResponse {
    #[serde(rename = "diskIDs")]
    pub disk_ids: Vec<String>,
}

impl Versioned for GetTargetDisksResponse {
    type Canonical = types::GetTargetDisksResponse;

    fn to_canonical(self) -> Result<Self::Canonical, ConversionError> {
        Ok(types::GetTargetDisksResponse { disk_ids: self.disk_ids })
    }

    fn from_canonical(c: Self::Canonical) -> Result<Self, ConversionError> {
        Ok(Self { disk_ids: c.disk_ids })
    }
}

pub fn register(server: Arc<IscsiServer>, dispatcher: &mut Dispatcher) -> ProxyResult<()> {
    dispatcher
        .registrar(ApiGroup::Iscsi, registered_version(VERSION)?, server)
        .method::<AddTargetPortalRequest, AddTargetPortalResponse>(
            "AddTargetPortal",
            IscsiServer::add_target_portal,
        )?
        .method::<RemoveTargetPortalRequest, RemoveTargetPortalResponse>(
            "RemoveTargetPortal",
            IscsiServer::remove_target_portal,
        )?
        .method::<ListTargetPortalsRequest, ListTargetPortalsResponse>(
            "ListTargetPortals",
            IscsiServer::list_target_portals,
        )?
        .method::<DiscoverTargetPortalRequest, DiscoverTargetPortalResponse>(
            "DiscoverTargetPortal",
            IscsiServer::discover_target_portal,
        )?
        .method::<ConnectTargetRequest, ConnectTargetResponse>(
            "ConnectTarget",
            IscsiServer::connect_target,
        )?
        .method::<DisconnectTargetRequest, DisconnectTargetResponse>(
            "DisconnectTarget",
            IscsiServer::disconnect_target,
        )?
        .method::<GetTargetDisksRequest, GetTargetDisksResponse>(
            "GetTargetDisks",
            IscsiServer::get_target_disks,
        )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mutual_chap_is_not_representable() {
        let wire = ConnectTargetRequest {
            auth_type: 2,
            ..Default::default()
        };
        assert!(wire.to_canonical().is_err());

        let canonical = types::ConnectTargetRequest {
            auth_type: types::AuthenticationType::MutualChap,
            ..Default::default()
        };
        assert!(ConnectTargetRequest::from_canonical(canonical).is_err());
    }

    #[test]
    fn test_connect_request_round_trip() {
        for auth in [auth_type::NONE, auth_type::ONE_WAY_CHAP] {
            let wire = ConnectTargetRequest {
                target_portal: TargetPortal {
                    target_address: "10.0.0.5".to_string(),
                    target_port: 3261,
                },
                iqn: "iqn.2026-10.local:t1".to_string(),
                auth_type: auth,
                chap_username: "someuser".to_string(),
                chap_secret: "verysecretpass".to_string(),
            };
            let canonical = wire.clone().to_canonical().unwrap();
            assert_eq!(ConnectTargetRequest::from_canonical(canonical).unwrap(), wire);
        }
    }

    #[test]
    fn test_portal_round_trip() {
        let wire = AddTargetPortalRequest {
            target_portal: TargetPortal {
                target_address: "10.0.0.5".to_string(),
                target_port: 0,
            },
        };
        let canonical = wire.clone().to_canonical().unwrap();
        assert_eq!(canonical.target_portal, types::TargetPortal::new("10.0.0.5", 0));
        assert_eq!(AddTargetPortalRequest::from_canonical(canonical).unwrap(), wire);
    }
}
