//! iSCSI initiator control
//!
//! Portal registry, target discovery, and the connect/disconnect state
//! machine, served over every iSCSI API version by one [`IscsiServer`].

pub mod auth;
pub mod chap;
pub mod credentials;
pub mod host;
pub mod portal;
pub mod session;
pub mod types;

mod server;

/// Request and response messages that only carry a target portal
macro_rules! portal_message {
    ($wire:ident, $canonical:ident) => {
        #[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
        #[serde(rename_all = "camelCase", default)]
        pub struct $wire {
            pub target_portal: TargetPortal,
        }

        impl Versioned for $wire {
            type Canonical = types::$canonical;

            fn to_canonical(self) -> Result<Self::Canonical, ConversionError> {
                Ok(types::$canonical {
                    target_portal: self.target_portal.into(),
                })
            }

            fn from_canonical(c: Self::Canonical) -> Result<Self, ConversionError> {
                Ok(Self {
                    target_portal: c.target_portal.into(),
                })
            }
        }
    };
}

/// Messages addressing one target through one portal
macro_rules! session_message {
    ($wire:ident, $canonical:ident) => {
        #[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
        #[serde(rename_all = "camelCase", default)]
        pub struct $wire {
            pub target_portal: TargetPortal,
            pub iqn: String,
        }

        impl Versioned for $wire {
            type Canonical = types::$canonical;

            fn to_canonical(self) -> Result<Self::Canonical, ConversionError> {
                Ok(types::$canonical {
                    target_portal: self.target_portal.into(),
                    iqn: self.iqn,
                })
            }

            fn from_canonical(c: Self::Canonical) -> Result<Self, ConversionError> {
                Ok(Self {
                    target_portal: c.target_portal.into(),
                    iqn: c.iqn,
                })
            }
        }
    };
}

pub mod v1alpha1;
pub mod v1alpha2;

pub use auth::{negotiate, ChapCredentials, ChapResponder, LoginAuth, TargetAuthPolicy};
pub use credentials::{MutualChapStore, ProcessChapStore};
pub use host::{IscsiHost, PowerShellIscsi};
pub use server::IscsiServer;
pub use session::SessionState;

use crate::error::{ProxyError, ProxyResult};
use crate::server::dispatch::Dispatcher;
use std::sync::Arc;

/// Wire versions this build serves, oldest first
pub const VERSIONS: &[&str] = &[v1alpha1::VERSION, v1alpha2::VERSION];

/// Register one wire version of the iSCSI API
pub fn register(
    version: &str,
    server: Arc<IscsiServer>,
    dispatcher: &mut Dispatcher,
) -> ProxyResult<()> {
    match version {
        v1alpha1::VERSION => v1alpha1::register(server, dispatcher),
        v1alpha2::VERSION => v1alpha2::register(server, dispatcher),
        other => Err(ProxyError::Registration(format!("iscsi has no version {}", other))),
    }
}
