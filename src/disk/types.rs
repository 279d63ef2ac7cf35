//! Canonical disk request and response shapes

use std::collections::BTreeMap;

/// SCSI identifiers of a disk
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiskIdentifiers {
    /// Device identification VPD page (0x83) descriptor
    pub page83: String,
    pub serial_number: String,
}

/// Where a disk sits on the storage bus
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiskLocation {
    pub adapter: String,
    pub bus: String,
    pub target: String,
    pub lun_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SetAttachStateRequest {
    pub disk_id: String,
    pub is_online: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SetAttachStateResponse {}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GetAttachStateRequest {
    pub disk_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GetAttachStateResponse {
    pub is_online: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartitionDiskRequest {
    pub disk_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartitionDiskResponse {}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RescanRequest {}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RescanResponse {}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListDiskIDsRequest {}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListDiskIDsResponse {
    pub disk_ids: BTreeMap<String, DiskIdentifiers>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListDiskLocationsRequest {}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListDiskLocationsResponse {
    pub disk_locations: BTreeMap<String, DiskLocation>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiskStatsRequest {
    pub disk_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiskStatsResponse {
    pub total_bytes: u64,
}
