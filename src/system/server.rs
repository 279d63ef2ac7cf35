//! System API group server

use super::types::*;
use crate::error::{ProxyError, ProxyResult};
use crate::host::{HostAutomation, ValueBag};
use crate::server::CallContext;
use serde::Deserialize;
use std::sync::Arc;

const START: &str = "Start-Service -Name $Env:ServiceName -ErrorAction Stop";

const STOP: &str = "Stop-Service -Name $Env:ServiceName -Force:([bool]::Parse($Env:Force)) \
     -ErrorAction Stop";

const GET: &str = "Get-Service -Name $Env:ServiceName -ErrorAction SilentlyContinue \
     | Select-Object DisplayName, Status, StartType | ConvertTo-Json";

/// Get-Service output. Enums arrive as their numeric values.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ServiceRow {
    #[serde(default)]
    display_name: String,
    status: i64,
    start_type: i64,
}

/// ServiceControllerStatus
fn status_from_host(value: i64) -> ServiceStatus {
    match value {
        1 => ServiceStatus::Stopped,
        2 => ServiceStatus::StartPending,
        3 => ServiceStatus::StopPending,
        4 => ServiceStatus::Running,
        5 => ServiceStatus::ContinuePending,
        6 => ServiceStatus::PausePending,
        7 => ServiceStatus::Paused,
        _ => ServiceStatus::Unknown,
    }
}

/// ServiceStartMode
fn start_type_from_host(value: i64) -> Option<StartType> {
    match value {
        0 => Some(StartType::Boot),
        1 => Some(StartType::System),
        2 => Some(StartType::Automatic),
        3 => Some(StartType::Manual),
        4 => Some(StartType::Disabled),
        _ => None,
    }
}

pub struct SystemServer {
    automation: Arc<dyn HostAutomation>,
}

impl SystemServer {
    pub fn new(automation: Arc<dyn HostAutomation>) -> Self {
        Self { automation }
    }

    pub fn start_service(
        &self,
        ctx: &CallContext,
        req: StartServiceRequest,
    ) -> ProxyResult<StartServiceResponse> {
        validate_name(&req.name)?;
        let values = ValueBag::new().with("ServiceName", req.name.as_str());
        self.automation
            .run(START, &values)
            .map_err(|f| f.into_error("Start-Service"))?;
        log::info!("[{}] Started service {}", ctx.request_id, req.name);
        Ok(StartServiceResponse {})
    }

    pub fn stop_service(
        &self,
        ctx: &CallContext,
        req: StopServiceRequest,
    ) -> ProxyResult<StopServiceResponse> {
        validate_name(&req.name)?;
        let values = ValueBag::new()
            .with("ServiceName", req.name.as_str())
            .with("Force", req.force.to_string());
        self.automation
            .run(STOP, &values)
            .map_err(|f| f.into_error("Stop-Service"))?;
        log::info!("[{}] Stopped service {} (force: {})", ctx.request_id, req.name, req.force);
        Ok(StopServiceResponse {})
    }

    pub fn get_service(
        &self,
        _ctx: &CallContext,
        req: GetServiceRequest,
    ) -> ProxyResult<GetServiceResponse> {
        validate_name(&req.name)?;
        let values = ValueBag::new().with("ServiceName", req.name.as_str());
        let output = self
            .automation
            .run(GET, &values)
            .map_err(|f| f.into_error("Get-Service"))?;

        if output.trim().is_empty() {
            return Err(ProxyError::NotFound(format!("service {}", req.name)));
        }

        let bad_output = |reason: String, output: &str| ProxyError::HostExecution {
            action: "Get-Service".to_string(),
            reason,
            output: output.to_string(),
        };
        let row: ServiceRow = serde_json::from_str(output.trim())
            .map_err(|e| bad_output(format!("unexpected output: {}", e), &output))?;
        let start_type = start_type_from_host(row.start_type)
            .ok_or_else(|| bad_output(format!("unknown start type {}", row.start_type), &output))?;

        Ok(GetServiceResponse {
            display_name: row.display_name,
            start_type,
            status: status_from_host(row.status),
        })
    }
}

fn validate_name(name: &str) -> ProxyResult<()> {
    if name.trim().is_empty() {
        return Err(ProxyError::Validation("service name is required".to_string()));
    }
    if name.chars().any(char::is_control) {
        return Err(ProxyError::Validation(format!("invalid service name {:?}", name)));
    }
    Ok(())
}
