//! SMB global mappings

pub mod types;

mod server;

pub mod v1alpha1;
pub mod v1beta1;

pub use server::SmbServer;

use crate::error::{ProxyError, ProxyResult};
use crate::server::dispatch::Dispatcher;
use std::sync::Arc;

/// Wire versions this build serves, oldest first
pub const VERSIONS: &[&str] = &[v1alpha1::VERSION, v1beta1::VERSION];

/// Register one wire version of the SMB API
pub fn register(
    version: &str,
    server: Arc<SmbServer>,
    dispatcher: &mut Dispatcher,
) -> ProxyResult<()> {
    match version {
        v1alpha1::VERSION => v1alpha1::register(server, dispatcher),
        v1beta1::VERSION => v1beta1::register(server, dispatcher),
        other => Err(ProxyError::Registration(format!("smb has no version {}", other))),
    }
}
