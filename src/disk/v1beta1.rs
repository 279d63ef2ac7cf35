//! Disk API v1beta1
//!
//! Sizes are signed and only the page 0x83 identifier is reported.

use super::server::DiskServer;
use super::types;
use crate::error::{ConversionError, ProxyResult};
use crate::server::dispatch::{Dispatcher, Versioned};
use crate::server::{registered_version, ApiGroup};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

pub const VERSION: &str = "v1beta1";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SetAttachStateRequest {
    #[serde(rename = "diskID")]
    pub disk_id: String,
    pub is_online: bool,
}

impl Versioned for SetAttachStateRequest {
    type Canonical = types::SetAttachStateRequest;

    fn to_canonical(self) -> Result<Self::Canonical, ConversionError> {
        Ok(types::SetAttachStateRequest {
            disk_id: self.disk_id,
            is_online: self.is_online,
        })
    }

    fn from_canonical(c: Self::Canonical) -> Result<Self, ConversionError> {
        Ok(Self {
            disk_id: c.disk_id,
            is_online: c.is_online,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GetAttachStateResponse {
    pub is_online: bool,
}

impl Versioned for GetAttachStateResponse {
    type Canonical = types::GetAttachStateResponse;

    fn to_canonical(self) -> Result<Self::Canonical, ConversionError> {
        Ok(types::GetAttachStateResponse {
            is_online: self.is_online,
        })
    }

    fn from_canonical(c: Self::Canonical) -> Result<Self, ConversionError> {
        Ok(Self { is_online: c.is_online })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiskIDs {
    pub page83: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ListDiskIDsResponse {
    #[serde(rename = "diskIDs")]
    pub disk_ids: BTreeMap<String, DiskIDs>,
}

impl Versioned for ListDiskIDsResponse {
    type Canonical = types::ListDiskIDsResponse;

    fn to_canonical(self) -> Result<Self::Canonical, ConversionError> {
        let disk_ids = self
            .disk_ids
            .into_iter()
            .map(|(id, ids)| {
                let ids = types::DiskIdentifiers {
                    page83: ids.page83,
                    serial_number: String::new(),
                };
                (id, ids)
            })
            .collect();
        Ok(types::ListDiskIDsResponse { disk_ids })
    }

    fn from_canonical(c: Self::Canonical) -> Result<Self, ConversionError> {
        let disk_ids = c
            .disk_ids
            .into_iter()
            .map(|(id, ids)| (id, DiskIDs { page83: ids.page83 }))
            .collect();
        Ok(Self { disk_ids })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiskLocation {
    #[serde(rename = "Adapter")]
    pub adapter: String,
    #[serde(rename = "Bus")]
    pub bus: String,
    #[serde(rename = "Target")]
    pub target: String,
    #[serde(rename = "LUNID")]
    pub lun_id: String,
}

impl From<DiskLocation> for types::DiskLocation {
    fn from(l: DiskLocation) -> Self {
        types::DiskLocation {
            adapter: l.adapter,
            bus: l.bus,
            target: l.target,
            lun_id: l.lun_id,
        }
    }
}

impl From<types::DiskLocation> for DiskLocation {
    fn from(l: types::DiskLocation) -> Self {
        Self {
            adapter: l.adapter,
            bus: l.bus,
            target: l.target,
            lun_id: l.lun_id,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ListDiskLocationsResponse {
    pub disk_locations: BTreeMap<String, DiskLocation>,
}

impl Versioned for ListDiskLocationsResponse {
    type Canonical = types::ListDiskLocationsResponse;

    fn to_canonical(self) -> Result<Self::Canonical, ConversionError> {
        Ok(types::ListDiskLocationsResponse {
            disk_locations: self.disk_locations.into_iter().map(|(k, v)| (k, v.into())).collect(),
        })
    }

    fn from_canonical(c: Self::Canonical) -> Result<Self, ConversionError> {
        Ok(Self {
            disk_locations: c.disk_locations.into_iter().map(|(k, v)| (k, v.into())).collect(),
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DiskStatsResponse {
    pub disk_size: i64,
}

impl Versioned for DiskStatsResponse {
    type Canonical = types::DiskStatsResponse;

    fn to_canonical(self) -> Result<Self::Canonical, ConversionError> {
        let total_bytes = u64::try_from(self.disk_size)
            .map_err(|_| ConversionError::new(format!("negative disk size {}", self.disk_size)))?;
        Ok(types::DiskStatsResponse { total_bytes })
    }

    fn from_canonical(c: Self::Canonical) -> Result<Self, ConversionError> {
        let disk_size = i64::try_from(c.total_bytes).map_err(|_| {
            ConversionError::new(format!("disk size {} does not fit in {}", c.total_bytes, VERSION))
        })?;
        Ok(Self { disk_size })
    }
}

empty_message!(SetAttachStateResponse, SetAttachStateResponse);
disk_message!(GetAttachStateRequest, GetAttachStateRequest);
disk_message!(PartitionDiskRequest, PartitionDiskRequest);
empty_message!(PartitionDiskResponse, PartitionDiskResponse);
empty_message!(RescanRequest, RescanRequest);
empty_message!(RescanResponse, RescanResponse);
empty_message!(ListDiskIDsRequest, ListDiskIDsRequest);
empty_message!(ListDiskLocationsRequest, ListDiskLocationsRequest);
disk_message!(DiskStatsRequest, DiskStatsRequest);

pub fn register(server: Arc<DiskServer>, dispatcher: &mut Dispatcher) -> ProxyResult<()> {
    dispatcher
        .registrar(ApiGroup::Disk, registered_version(VERSION)?, server)
        .method::<SetAttachStateRequest, SetAttachStateResponse>(
            "SetAttachState",
            DiskServer::set_attach_state,
        )?
        .method::<GetAttachStateRequest, GetAttachStateResponse>(
            "GetAttachState",
            DiskServer::get_attach_state,
        )?
        .method::<PartitionDiskRequest, PartitionDiskResponse>(
            "PartitionDisk",
            DiskServer::partition_disk,
        )?
        .method::<RescanRequest, RescanResponse>("Rescan", DiskServer::rescan)?
        .method::<ListDiskIDsRequest, ListDiskIDsResponse>(
            "ListDiskIDs",
            DiskServer::list_disk_ids,
        )?
        .method::<ListDiskLocationsRequest, ListDiskLocationsResponse>(
            "ListDiskLocations",
            DiskServer::list_disk_locations,
        )?
        .method::<DiskStatsRequest, DiskStatsResponse>("DiskStats", DiskServer::disk_stats)?;
    Ok(())
}
