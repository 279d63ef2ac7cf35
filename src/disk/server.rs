//! Disk API group server

use super::host::DiskHost;
use super::types::*;
use crate::error::{ProxyError, ProxyResult};
use crate::server::CallContext;
use std::sync::{Arc, Mutex, PoisonError};

pub struct DiskServer {
    host: Arc<dyn DiskHost>,
    /// Serializes check-then-act sequences such as PartitionDisk
    ops: Mutex<()>,
}

impl DiskServer {
    pub fn new(host: Arc<dyn DiskHost>) -> Self {
        Self {
            host,
            ops: Mutex::new(()),
        }
    }

    pub fn set_attach_state(
        &self,
        ctx: &CallContext,
        req: SetAttachStateRequest,
    ) -> ProxyResult<SetAttachStateResponse> {
        validate_disk_id(&req.disk_id)?;
        let _ops = self.ops.lock().unwrap_or_else(PoisonError::into_inner);

        self.host.set_online(&req.disk_id, req.is_online)?;
        log::info!(
            "[{}] Disk {} is now {}",
            ctx.request_id,
            req.disk_id,
            if req.is_online { "online" } else { "offline" }
        );
        Ok(SetAttachStateResponse {})
    }

    pub fn get_attach_state(
        &self,
        _ctx: &CallContext,
        req: GetAttachStateRequest,
    ) -> ProxyResult<GetAttachStateResponse> {
        validate_disk_id(&req.disk_id)?;
        Ok(GetAttachStateResponse {
            is_online: self.host.is_online(&req.disk_id)?,
        })
    }

    /// Create one partition on an online disk. A disk that already has one
    /// is left alone.
    pub fn partition_disk(
        &self,
        ctx: &CallContext,
        req: PartitionDiskRequest,
    ) -> ProxyResult<PartitionDiskResponse> {
        validate_disk_id(&req.disk_id)?;
        let _ops = self.ops.lock().unwrap_or_else(PoisonError::into_inner);

        if !self.host.is_online(&req.disk_id)? {
            return Err(ProxyError::Disk(format!(
                "disk {} is offline, set it online before partitioning",
                req.disk_id
            )));
        }
        if self.host.is_partitioned(&req.disk_id)? {
            log::debug!("[{}] Disk {} is already partitioned", ctx.request_id, req.disk_id);
            return Ok(PartitionDiskResponse {});
        }

        self.host.partition(&req.disk_id)?;
        log::info!("[{}] Partitioned disk {}", ctx.request_id, req.disk_id);
        Ok(PartitionDiskResponse {})
    }

    pub fn rescan(&self, _ctx: &CallContext, _req: RescanRequest) -> ProxyResult<RescanResponse> {
        self.host.rescan()?;
        Ok(RescanResponse {})
    }

    pub fn list_disk_ids(
        &self,
        _ctx: &CallContext,
        _req: ListDiskIDsRequest,
    ) -> ProxyResult<ListDiskIDsResponse> {
        Ok(ListDiskIDsResponse {
            disk_ids: self.host.list_ids()?,
        })
    }

    pub fn list_disk_locations(
        &self,
        _ctx: &CallContext,
        _req: ListDiskLocationsRequest,
    ) -> ProxyResult<ListDiskLocationsResponse> {
        Ok(ListDiskLocationsResponse {
            disk_locations: self.host.list_locations()?,
        })
    }

    pub fn disk_stats(
        &self,
        _ctx: &CallContext,
        req: DiskStatsRequest,
    ) -> ProxyResult<DiskStatsResponse> {
        validate_disk_id(&req.disk_id)?;
        Ok(DiskStatsResponse {
            total_bytes: self.host.size(&req.disk_id)?,
        })
    }
}

fn validate_disk_id(disk_id: &str) -> ProxyResult<()> {
    if disk_id.is_empty() {
        return Err(ProxyError::Validation("disk ID is required".to_string()));
    }
    if disk_id.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(ProxyError::Validation(format!("invalid disk ID {:?}", disk_id)));
    }
    Ok(())
}
