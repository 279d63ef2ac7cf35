//! Configuration file parsing
//!
//! Parses the TOML configuration of the proxy. Every section is optional;
//! an empty file gives a PowerShell-backed proxy on localhost serving every
//! API version this build implements.

use crate::iscsi::types::TargetPortal;
use crate::loopback::{LoopbackTarget, TargetChap};
use crate::server::ApiGroup;
use serde::Deserialize;
use std::collections::HashSet;
use std::net::SocketAddr;
use std::path::Path;
use thiserror::Error;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Proxy configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub server: ServerConfig,
    pub host: HostConfig,
    pub api: ApiConfig,
    pub loopback: LoopbackConfig,
}

/// Transport settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    /// Address the HTTP API listens on
    pub bind: String,

    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,

    /// Largest request body accepted
    pub max_request_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8630".to_string(),
            log_level: "info".to_string(),
            max_request_bytes: 64 * 1024,
        }
    }
}

/// Which host the proxy drives
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Real host through PowerShell cmdlets
    #[default]
    PowerShell,
    /// In-process simulated targets and disks
    Loopback,
}

impl std::str::FromStr for Backend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "powershell" => Ok(Backend::PowerShell),
            "loopback" => Ok(Backend::Loopback),
            other => Err(format!("unknown backend {:?}, expected powershell or loopback", other)),
        }
    }
}

/// Host automation settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HostConfig {
    pub backend: Backend,

    /// Interpreter for the PowerShell backend
    pub program: String,

    /// Arguments placed before each command
    pub args: Vec<String>,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            backend: Backend::PowerShell,
            program: crate::host::DEFAULT_PROGRAM.to_string(),
            args: crate::host::default_args(),
        }
    }
}

/// API versions to serve per group. A missing group serves every version
/// this build implements; an empty list disables the group.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ApiConfig {
    pub iscsi: Option<Vec<String>>,
    pub disk: Option<Vec<String>>,
    pub smb: Option<Vec<String>>,
    pub system: Option<Vec<String>>,
}

impl ApiConfig {
    /// Versions to register for `group`
    pub fn versions(&self, group: ApiGroup) -> Vec<String> {
        let configured = match group {
            ApiGroup::Disk => &self.disk,
            ApiGroup::Iscsi => &self.iscsi,
            ApiGroup::Smb => &self.smb,
            ApiGroup::System => &self.system,
        };
        match configured {
            Some(versions) => versions.clone(),
            None => group.implemented_versions().iter().map(|v| v.to_string()).collect(),
        }
    }
}

/// Loopback fabric settings
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoopbackConfig {
    pub target: Vec<LoopbackTargetConfig>,
}

/// One simulated target
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoopbackTargetConfig {
    pub iqn: String,

    #[serde(default = "default_address")]
    pub address: String,

    /// Zero means 3260
    #[serde(default)]
    pub port: u32,

    /// LUN sizes in bytes
    #[serde(default = "default_luns")]
    pub luns: Vec<u64>,

    #[serde(default)]
    pub chap_username: String,

    #[serde(default)]
    pub chap_secret: String,

    /// Enables mutual CHAP on this target
    #[serde(default)]
    pub reverse_chap_secret: String,
}

fn default_address() -> String {
    "127.0.0.1".to_string()
}

fn default_luns() -> Vec<u64> {
    vec![1024 * 1024 * 1024]
}

impl LoopbackTargetConfig {
    pub fn portal(&self) -> TargetPortal {
        TargetPortal::new(self.address.as_str(), self.port).normalized()
    }

    pub fn to_target(&self) -> LoopbackTarget {
        let chap = (!self.chap_username.is_empty()).then(|| TargetChap {
            username: self.chap_username.clone(),
            secret: self.chap_secret.clone(),
            reverse_secret: (!self.reverse_chap_secret.is_empty())
                .then(|| self.reverse_chap_secret.clone()),
        });
        LoopbackTarget {
            iqn: self.iqn.clone(),
            portal: self.portal(),
            lun_sizes: self.luns.clone(),
            chap,
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: &str| -> Result<(), ConfigError> {
            Err(ConfigError::Invalid(format!("loopback target {:?}: {}", self.iqn, msg)))
        };

        if self.iqn.trim().is_empty() {
            return Err(ConfigError::Invalid("loopback target without iqn".to_string()));
        }
        if self.address.trim().is_empty() {
            return invalid("address is empty");
        }
        if self.port > u16::MAX as u32 {
            return invalid("port out of range");
        }
        if self.luns.is_empty() {
            return invalid("at least one LUN is required");
        }
        if self.luns.contains(&0) {
            return invalid("LUN size must be non-zero");
        }
        if self.chap_username.is_empty() != self.chap_secret.is_empty() {
            return invalid("chap_username and chap_secret must be set together");
        }
        if !self.reverse_chap_secret.is_empty() && self.chap_username.is_empty() {
            return invalid("reverse_chap_secret requires chap_username and chap_secret");
        }
        Ok(())
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse configuration from a string
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.server
            .bind
            .parse::<SocketAddr>()
            .map_err(|e| {
                ConfigError::Invalid(format!("server.bind {:?}: {}", self.server.bind, e))
            })?;

        let levels = ["trace", "debug", "info", "warn", "error", "off"];
        if !levels.contains(&self.server.log_level.as_str()) {
            return Err(ConfigError::Invalid(format!(
                "server.log_level {:?} is not a log level",
                self.server.log_level
            )));
        }

        if self.server.max_request_bytes == 0 {
            return Err(ConfigError::Invalid(
                "server.max_request_bytes must be non-zero".to_string(),
            ));
        }

        if self.host.backend == Backend::PowerShell && self.host.program.trim().is_empty() {
            return Err(ConfigError::Invalid("host.program is empty".to_string()));
        }

        for group in ApiGroup::ALL {
            let mut seen = HashSet::new();
            for version in self.api.versions(group) {
                if !group.implemented_versions().contains(&version.as_str()) {
                    return Err(ConfigError::Invalid(format!(
                        "api.{}: version {} is not implemented (available: {})",
                        group,
                        version,
                        group.implemented_versions().join(", ")
                    )));
                }
                if !seen.insert(version.clone()) {
                    return Err(ConfigError::Invalid(format!(
                        "api.{}: version {} listed twice",
                        group, version
                    )));
                }
            }
        }

        if self.host.backend != Backend::Loopback && !self.loopback.target.is_empty() {
            return Err(ConfigError::Invalid(
                "loopback targets are configured but host.backend is not loopback".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for target in &self.loopback.target {
            target.validate()?;
            if !seen.insert((target.iqn.clone(), target.portal())) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate loopback target: {} on {}",
                    target.iqn,
                    target.portal()
                )));
            }
        }

        Ok(())
    }

    pub fn loopback_targets(&self) -> Vec<LoopbackTarget> {
        self.loopback.target.iter().map(LoopbackTargetConfig::to_target).collect()
    }
}
