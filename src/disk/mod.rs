//! Disk lifecycle
//!
//! Bringing iSCSI surfaced disks online, partitioning them, and reporting
//! their identifiers, bus locations and sizes.

pub mod host;
pub mod types;

mod server;

/// Messages naming a single disk
macro_rules! disk_message {
    ($wire:ident, $canonical:ident) => {
        #[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
        #[serde(default)]
        pub struct $wire {
            #[serde(rename = "diskID")]
            pub disk_id: String,
        }

        impl Versioned for $wire {
            type Canonical = types::$canonical;

            fn to_canonical(self) -> Result<Self::Canonical, ConversionError> {
                Ok(types::$canonical { disk_id: self.disk_id })
            }

            fn from_canonical(c: Self::Canonical) -> Result<Self, ConversionError> {
                Ok(Self { disk_id: c.disk_id })
            }
        }
    };
}

pub mod v1;
pub mod v1beta1;

pub use host::{DiskHost, PowerShellDisks};
pub use server::DiskServer;

use crate::error::{ProxyError, ProxyResult};
use crate::server::dispatch::Dispatcher;
use std::sync::Arc;

/// Wire versions this build serves, oldest first
pub const VERSIONS: &[&str] = &[v1beta1::VERSION, v1::VERSION];

/// Register one wire version of the disk API
pub fn register(
    version: &str,
    server: Arc<DiskServer>,
    dispatcher: &mut Dispatcher,
) -> ProxyResult<()> {
    match version {
        v1beta1::VERSION => v1beta1::register(server, dispatcher),
        v1::VERSION => v1::register(server, dispatcher),
        other => Err(ProxyError::Registration(format!("disk has no version {}", other))),
    }
}
