//! Windows service control

pub mod types;

mod server;

pub mod v1alpha1;

pub use server::SystemServer;

use crate::error::{ProxyError, ProxyResult};
use crate::server::dispatch::Dispatcher;
use std::sync::Arc;

pub const VERSIONS: &[&str] = &[v1alpha1::VERSION];

/// Register one wire version of the system API
pub fn register(
    version: &str,
    server: Arc<SystemServer>,
    dispatcher: &mut Dispatcher,
) -> ProxyResult<()> {
    match version {
        v1alpha1::VERSION => v1alpha1::register(server, dispatcher),
        other => Err(ProxyError::Registration(format!("system has no version {}", other))),
    }
}
