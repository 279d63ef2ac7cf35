//! iSCSI API v1alpha2
//!
//! Adds mutual CHAP and `SetMutualChapSecret` on top of v1alpha1.

use super::server::IscsiServer;
use super::types;
use crate::error::{ConversionError, ProxyResult};
use crate::server::dispatch::{Dispatcher, Versioned};
use crate::server::{registered_version, ApiGroup};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub const VERSION: &str = "v1alpha2";

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

/// Wire numbering of the authentication type
pub mod auth_type {
    pub const NONE: i32 = 0;
    pub const ONE_WAY_CHAP: i32 = 1;
    pub const MUTUAL_CHAP: i32 = 2;
}

fn auth_type_to_canonical(value: i32) -> Result<types::AuthenticationType, ConversionError> {
    match value {
        auth_type::NONE => Ok(types::AuthenticationType::None),
        auth_type::ONE_WAY_CHAP => Ok(types::AuthenticationType::OneWayChap),
        auth_type::MUTUAL_CHAP => Ok(types::AuthenticationType::MutualChap),
        other => Err(ConversionError::new(format!("unknown authentication type {}", other))),
    }
}

fn auth_type_from_canonical(value: types::AuthenticationType) -> i32 {
    match value {
        types::AuthenticationType::None => auth_type::NONE,
        types::AuthenticationType::OneWayChap => auth_type::ONE_WAY_CHAP,
        types::AuthenticationType::MutualChap => auth_type::MUTUAL_CHAP,
    }
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
empty_message!(SetMutualChapSecretResponse, SetMutualChapSecretResponse);

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
#[serde(rename_all = "camelCase", default)]
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
        Ok(types::ConnectTargetRequest {
            target_portal: self.target_portal.into(),
            iqn: self.iqn,
            auth_type: auth_type_to_canonical(self.auth_type)?,
            chap_username: self.chap_username,
            chap_secret: self.chap_secret,
        })
    }

    fn from_canonical(c: Self::Canonical) -> Result<Self, ConversionError> {
        Ok(Self {
            target_portal: c.target_portal.into(),
            iqn: c.iqn,
            auth_type: auth_type_from_canonical(c.auth_type),
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

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SetMutualChapSecretRequest {
    pub mutual_chap_secret: String,
}

impl Versioned for SetMutualChapSecretRequest {
    type Canonical = types::SetMutualChapSecretRequest;

    fn to_canonical(self) -> Result<Self::Canonical, ConversionError> {
        Ok(types::SetMutualChapSecretRequest {
            mutual_chap_secret: self.mutual_chap_secret,
        })
    }

    fn from_canonical(c: Self::Canonical) -> Result<Self, ConversionError> {
        Ok(Self {
            mutual_chap_secret: c.mutual_chap_secret,
        })
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
        )?
        .method::<SetMutualChapSecretRequest, SetMutualChapSecretResponse>(
            "SetMutualChapSecret",
            IscsiServer::set_mutual_chap_secret,
        )?;
    Ok(())
}
