//! Disk API v1

use super::server::DiskServer;
use super::types;
use crate::error::{ConversionError, ProxyResult};
use crate::server::dispatch::{Dispatcher, Versioned};
use crate::server::{registered_version, ApiGroup};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

pub const VERSION: &str = "v1";

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
#[serde(rename_all = "camelCase", default)]
pub struct DiskIDs {
    pub page83: String,
    pub serial_number: String,
}

impl From<DiskIDs> for types::DiskIdentifiers {
    fn from(ids: DiskIDs) -> Self {
        types::DiskIdentifiers {
            page83: ids.page83,
            serial_number: ids.serial_number,
        }
    }
}

impl From<types::DiskIdentifiers> for DiskIDs {
    fn from(ids: types::DiskIdentifiers) -> Self {
        Self {
            page83: ids.page83,
            serial_number: ids.serial_number,
        }
    }
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
        Ok(types::ListDiskIDsResponse {
            disk_ids: self.disk_ids.into_iter().map(|(k, v)| (k, v.into())).collect(),
        })
    }

    fn from_canonical(c: Self::Canonical) -> Result<Self, ConversionError> {
        Ok(Self {
            disk_ids: c.disk_ids.into_iter().map(|(k, v)| (k, v.into())).collect(),
        })
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
    pub total_bytes: u64,
}

impl Versioned for DiskStatsResponse {
    type Canonical = types::DiskStatsResponse;

    fn to_canonical(self) -> Result<Self::Canonical, ConversionError> {
        Ok(types::DiskStatsResponse {
            total_bytes: self.total_bytes,
        })
    }

    fn from_canonical(c: Self::Canonical) -> Result<Self, ConversionError> {
        Ok(Self {
            total_bytes: c.total_bytes,
        })
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

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_large_disk_fits() {
        let canonical = types::DiskStatsResponse { total_bytes: u64::MAX };
        let wire = DiskStatsResponse::from_canonical(canonical).unwrap();
        assert_eq!(serde_json::to_value(wire).unwrap(), json!({"totalBytes": u64::MAX}));
    }

    #[test]
    fn test_disk_ids_round_trip() {
        let wire: ListDiskIDsResponse = serde_json::from_value(json!({
            "diskIDs": {"3": {"page83": "60003FF4", "serialNumber": "S3Z9"}}
        }))
        .unwrap();
        let canonical = wire.clone().to_canonical().unwrap();
        assert_eq!(canonical.disk_ids["3"].serial_number, "S3Z9");
        assert_eq!(ListDiskIDsResponse::from_canonical(canonical).unwrap(), wire);
    }
}
