//! Host storage control-plane proxy
//!
//! This crate serves versioned storage management APIs (iSCSI initiator,
//! disk, SMB global mappings, and system services) on behalf of
//! unprivileged callers, and carries them out on the host through a
//! pluggable automation backend. Every wire version of a group is converted
//! to one canonical model before it reaches the group server.

#[macro_use]
mod macros;

pub mod apiversion;
pub mod config;
pub mod disk;
pub mod error;
pub mod host;
pub mod iscsi;
pub mod loopback;
pub mod server;
pub mod smb;
pub mod system;

pub use apiversion::ApiVersion;
pub use config::{Backend, Config, ConfigError};
pub use error::{ConversionError, ProxyError, ProxyResult};
pub use server::{ApiGroup, ApiServers, CallContext, Dispatcher};
