//! System API v1alpha1

use super::server::SystemServer;
use super::types;
use crate::error::{ConversionError, ProxyResult};
use crate::server::dispatch::{Dispatcher, Versioned};
use crate::server::{registered_version, ApiGroup};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub const VERSION: &str = "v1alpha1";

/// Wire numbering of [`types::StartType`]
pub mod start_type {
    pub const BOOT: i32 = 0;
    pub const SYSTEM: i32 = 1;
    pub const AUTOMATIC: i32 = 2;
    pub const MANUAL: i32 = 3;
    pub const DISABLED: i32 = 4;
}

/// Wire numbering of [`types::ServiceStatus`]
pub mod service_status {
    pub const UNKNOWN: i32 = 0;
    pub const STOPPED: i32 = 1;
    pub const START_PENDING: i32 = 2;
    pub const STOP_PENDING: i32 = 3;
    pub const RUNNING: i32 = 4;
    pub const CONTINUE_PENDING: i32 = 5;
    pub const PAUSE_PENDING: i32 = 6;
    pub const PAUSED: i32 = 7;
}

fn start_type_to_canonical(value: i32) -> Result<types::StartType, ConversionError> {
    use types::StartType::*;
    match value {
        start_type::BOOT => Ok(Boot),
        start_type::SYSTEM => Ok(System),
        start_type::AUTOMATIC => Ok(Automatic),
        start_type::MANUAL => Ok(Manual),
        start_type::DISABLED => Ok(Disabled),
        other => Err(ConversionError::new(format!("unknown start type {}", other))),
    }
}

fn start_type_from_canonical(value: types::StartType) -> i32 {
    use types::StartType::*;
    match value {
        Boot => start_type::BOOT,
        System => start_type::SYSTEM,
        Automatic => start_type::AUTOMATIC,
        Manual => start_type::MANUAL,
        Disabled => start_type::DISABLED,
    }
}

fn status_to_canonical(value: i32) -> Result<types::ServiceStatus, ConversionError> {
    use types::ServiceStatus::*;
    match value {
        service_status::UNKNOWN => Ok(Unknown),
        service_status::STOPPED => Ok(Stopped),
        service_status::START_PENDING => Ok(StartPending),
        service_status::STOP_PENDING => Ok(StopPending),
        service_status::RUNNING => Ok(Running),
        service_status::CONTINUE_PENDING => Ok(ContinuePending),
        service_status::PAUSE_PENDING => Ok(PausePending),
        service_status::PAUSED => Ok(Paused),
        other => Err(ConversionError::new(format!("unknown service status {}", other))),
    }
}

fn status_from_canonical(value: types::ServiceStatus) -> i32 {
    use types::ServiceStatus::*;
    match value {
        Unknown => service_status::UNKNOWN,
        Stopped => service_status::STOPPED,
        StartPending => service_status::START_PENDING,
        StopPending => service_status::STOP_PENDING,
        Running => service_status::RUNNING,
        ContinuePending => service_status::CONTINUE_PENDING,
        PausePending => service_status::PAUSE_PENDING,
        Paused => service_status::PAUSED,
    }
}

/// Messages naming a single service
macro_rules! service_message {
    ($wire:ident, $canonical:ident) => {
        #[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
        #[serde(default)]
        pub struct $wire {
            pub name: String,
        }

        impl Versioned for $wire {
            type Canonical = types::$canonical;

            fn to_canonical(self) -> Result<Self::Canonical, ConversionError> {
                Ok(types::$canonical { name: self.name })
            }

            fn from_canonical(c: Self::Canonical) -> Result<Self, ConversionError> {
                Ok(Self { name: c.name })
            }
        }
    };
}

service_message!(StartServiceRequest, StartServiceRequest);
empty_message!(StartServiceResponse, StartServiceResponse);
empty_message!(StopServiceResponse, StopServiceResponse);
service_message!(GetServiceRequest, GetServiceRequest);

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StopServiceRequest {
    pub name: String,
    pub force: bool,
}

impl Versioned for StopServiceRequest {
    type Canonical = types::StopServiceRequest;

    fn to_canonical(self) -> Result<Self::Canonical, ConversionError> {
        Ok(types::StopServiceRequest {
            name: self.name,
            force: self.force,
        })
    }

    fn from_canonical(c: Self::Canonical) -> Result<Self, ConversionError> {
        Ok(Self {
            name: c.name,
            force: c.force,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GetServiceResponse {
    pub display_name: String,
    pub start_type: i32,
    pub status: i32,
}

impl Versioned for GetServiceResponse {
    type Canonical = types::GetServiceResponse;

    fn to_canonical(self) -> Result<Self::Canonical, ConversionError> {
        Ok(types::GetServiceResponse {
            display_name: self.display_name,
            start_type: start_type_to_canonical(self.start_type)?,
            status: status_to_canonical(self.status)?,
        })
    }

    fn from_canonical(c: Self::Canonical) -> Result<Self, ConversionError> {
        Ok(Self {
            display_name: c.display_name,
            start_type: start_type_from_canonical(c.start_type),
            status: status_from_canonical(c.status),
        })
    }
}

pub fn register(server: Arc<SystemServer>, dispatcher: &mut Dispatcher) -> ProxyResult<()> {
    dispatcher
        .registrar(ApiGroup::System, registered_version(VERSION)?, server)
        .method::<StartServiceRequest, StartServiceResponse>(
            "StartService",
            SystemServer::start_service,
        )?
        .method::<StopServiceRequest, StopServiceResponse>(
            "StopService",
            SystemServer::stop_service,
        )?
        .method::<GetServiceRequest, GetServiceResponse>("GetService", SystemServer::get_service)?;
    Ok(())
}
