//! API surface
//!
//! Wires the group servers to their host backends, registers every enabled
//! wire version in a [`Dispatcher`], and exposes it over HTTP.

pub mod dispatch;
pub mod http;

pub use dispatch::{Dispatcher, Registrar, Versioned};

use crate::apiversion::ApiVersion;
use crate::config::{Backend, Config};
use crate::disk::{DiskHost, DiskServer, PowerShellDisks};
use crate::error::{ProxyError, ProxyResult};
use crate::host::{DryRunAutomation, HostAutomation, PowerShell};
use crate::iscsi::{IscsiHost, IscsiServer, MutualChapStore, PowerShellIscsi, ProcessChapStore};
use crate::loopback::Loopback;
use crate::smb::SmbServer;
use crate::system::SystemServer;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// API groups the proxy serves
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ApiGroup {
    Disk,
    Iscsi,
    Smb,
    System,
}

impl ApiGroup {
    pub const ALL: [ApiGroup; 4] = [
        ApiGroup::Disk,
        ApiGroup::Iscsi,
        ApiGroup::Smb,
        ApiGroup::System,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ApiGroup::Disk => "disk",
            ApiGroup::Iscsi => "iscsi",
            ApiGroup::Smb => "smb",
            ApiGroup::System => "system",
        }
    }

    /// Wire versions this build can serve, oldest first
    pub fn implemented_versions(self) -> &'static [&'static str] {
        match self {
            ApiGroup::Disk => crate::disk::VERSIONS,
            ApiGroup::Iscsi => crate::iscsi::VERSIONS,
            ApiGroup::Smb => crate::smb::VERSIONS,
            ApiGroup::System => crate::system::VERSIONS,
        }
    }
}

impl fmt::Display for ApiGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ApiGroup {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ApiGroup::ALL
            .into_iter()
            .find(|g| g.as_str() == s)
            .ok_or_else(|| format!("unknown API group {:?}", s))
    }
}

/// What a canonical handler knows about the call it serves
#[derive(Debug, Clone)]
pub struct CallContext {
    pub group: ApiGroup,
    /// Wire version the call arrived on
    pub version: ApiVersion,
    pub method: String,
    /// Per-process sequence number, for correlating log lines
    pub request_id: u64,
}

impl CallContext {
    pub fn new(group: ApiGroup, version: ApiVersion, method: &str) -> Self {
        Self {
            group,
            version,
            method: method.to_string(),
            request_id: 0,
        }
    }
}

/// Parse a version constant compiled into an adapter
pub fn registered_version(version: &str) -> ProxyResult<ApiVersion> {
    ApiVersion::parse(version).map_err(|e| ProxyError::Registration(e.to_string()))
}

/// One shared server per API group
pub struct ApiServers {
    pub iscsi: Arc<IscsiServer>,
    pub disk: Arc<DiskServer>,
    pub smb: Arc<SmbServer>,
    pub system: Arc<SystemServer>,
}

impl ApiServers {
    pub fn new(
        iscsi_host: Arc<dyn IscsiHost>,
        disk_host: Arc<dyn DiskHost>,
        automation: Arc<dyn HostAutomation>,
        credentials: Arc<dyn MutualChapStore>,
    ) -> Self {
        Self {
            iscsi: Arc::new(IscsiServer::new(iscsi_host, credentials)),
            disk: Arc::new(DiskServer::new(disk_host)),
            smb: Arc::new(SmbServer::new(Arc::clone(&automation))),
            system: Arc::new(SystemServer::new(automation)),
        }
    }

    /// Servers backed by the configured host
    pub fn from_config(config: &Config) -> Self {
        let credentials: Arc<dyn MutualChapStore> = Arc::new(ProcessChapStore::new());
        match config.host.backend {
            Backend::PowerShell => {
                log::info!("Using PowerShell backend ({})", config.host.program);
                let automation: Arc<dyn HostAutomation> = Arc::new(PowerShell::with_program(
                    config.host.program.as_str(),
                    config.host.args.clone(),
                ));
                Self::new(
                    Arc::new(PowerShellIscsi::new(Arc::clone(&automation))),
                    Arc::new(PowerShellDisks::new(Arc::clone(&automation))),
                    automation,
                    credentials,
                )
            }
            Backend::Loopback => {
                log::info!("Using loopback backend, SMB and service calls are logged only");
                let fabric = Arc::new(Loopback::new(config.loopback_targets()));
                Self::new(
                    fabric.clone(),
                    fabric,
                    Arc::new(DryRunAutomation::new()),
                    credentials,
                )
            }
        }
    }

    /// Register `version` of `group`
    pub fn register(
        &self,
        group: ApiGroup,
        version: &str,
        dispatcher: &mut Dispatcher,
    ) -> ProxyResult<()> {
        match group {
            ApiGroup::Disk => crate::disk::register(version, Arc::clone(&self.disk), dispatcher),
            ApiGroup::Iscsi => crate::iscsi::register(version, Arc::clone(&self.iscsi), dispatcher),
            ApiGroup::Smb => crate::smb::register(version, Arc::clone(&self.smb), dispatcher),
            ApiGroup::System => {
                crate::system::register(version, Arc::clone(&self.system), dispatcher)
            }
        }
    }

    /// Register every enabled version of every group
    pub fn dispatcher(&self, config: &Config) -> ProxyResult<Dispatcher> {
        let mut dispatcher = Dispatcher::new();
        for group in ApiGroup::ALL {
            for version in config.api.versions(group) {
                self.register(group, &version, &mut dispatcher)?;
                log::info!("Serving {}/{}", group, version);
            }
        }
        Ok(dispatcher)
    }
}
