//! SMB API group server
//!
//! Global SMB mappings make a share visible to every session on the host,
//! which is what containers need. Credentials only ever travel in the value
//! bag.

use super::types::*;
use crate::error::{ProxyError, ProxyResult};
use crate::host::{HostAutomation, HostFailure, ValueBag};
use crate::server::CallContext;
use std::sync::{Arc, Mutex, PoisonError};

const IS_MAPPED: &str =
    "$(Get-SmbGlobalMapping -RemotePath $Env:smbremotepath -ErrorAction Stop).Status";

const NEW_MAPPING: &str = "$PWord = ConvertTo-SecureString -String $Env:smbpassword \
     -AsPlainText -Force; \
     $Credential = New-Object -TypeName System.Management.Automation.PSCredential \
     -ArgumentList $Env:smbuser, $PWord; \
     New-SmbGlobalMapping -RemotePath $Env:smbremotepath -Credential $Credential \
     -RequirePrivacy $true";

const NEW_LINK: &str =
    "New-Item -ItemType SymbolicLink $Env:smblocalpath -Target $Env:smbremotepath";

const REMOVE_MAPPING: &str = "Remove-SmbGlobalMapping -RemotePath $Env:smbremotepath -Force";

pub struct SmbServer {
    automation: Arc<dyn HostAutomation>,
    /// Check-then-map must not interleave for the same share
    ops: Mutex<()>,
}

impl SmbServer {
    pub fn new(automation: Arc<dyn HostAutomation>) -> Self {
        Self {
            automation,
            ops: Mutex::new(()),
        }
    }

    pub fn new_smb_global_mapping(
        &self,
        ctx: &CallContext,
        req: NewSmbGlobalMappingRequest,
    ) -> ProxyResult<NewSmbGlobalMappingResponse> {
        validate_path("remote path", &req.remote_path)?;
        if !req.local_path.is_empty() {
            validate_path("local path", &req.local_path)?;
        }
        if req.username.is_empty() || req.password.is_empty() {
            return Err(ProxyError::Validation("username and password are required".to_string()));
        }

        let _ops = self.ops.lock().unwrap_or_else(PoisonError::into_inner);

        if self.is_mapped(&req.remote_path) {
            log::info!("[{}] {} is already mapped", ctx.request_id, req.remote_path);
        } else {
            let values = ValueBag::new()
                .with("smbuser", req.username.as_str())
                .with("smbpassword", req.password.as_str())
                .with("smbremotepath", req.remote_path.as_str());
            self.automation
                .run(NEW_MAPPING, &values)
                .map_err(|f| f.into_error("New-SmbGlobalMapping"))?;
            log::info!("[{}] Mapped {}", ctx.request_id, req.remote_path);
        }

        if !req.local_path.is_empty() {
            let values = ValueBag::new()
                .with("smbremotepath", link_target(&req.remote_path))
                .with("smblocalpath", req.local_path.as_str());
            self.automation
                .run(NEW_LINK, &values)
                .map_err(|f| f.into_error("New-Item"))?;
            log::info!("[{}] Linked {} to {}", ctx.request_id, req.local_path, req.remote_path);
        }

        Ok(NewSmbGlobalMappingResponse {})
    }

    pub fn remove_smb_global_mapping(
        &self,
        ctx: &CallContext,
        req: RemoveSmbGlobalMappingRequest,
    ) -> ProxyResult<RemoveSmbGlobalMappingResponse> {
        validate_path("remote path", &req.remote_path)?;
        let _ops = self.ops.lock().unwrap_or_else(PoisonError::into_inner);

        let values = ValueBag::new().with("smbremotepath", req.remote_path.as_str());
        self.automation
            .run(REMOVE_MAPPING, &values)
            .map_err(|f| f.into_error("Remove-SmbGlobalMapping"))?;
        log::info!("[{}] Removed mapping {}", ctx.request_id, req.remote_path);
        Ok(RemoveSmbGlobalMappingResponse {})
    }

    /// A mapping exists when Get-SmbGlobalMapping reports status OK.
    /// Any failure of the check counts as not mapped.
    fn is_mapped(&self, remote_path: &str) -> bool {
        let values = ValueBag::new().with("smbremotepath", remote_path);
        match self.automation.run(IS_MAPPED, &values) {
            Ok(output) => output.trim().eq_ignore_ascii_case("OK"),
            Err(f) if reports_no_mapping(&f) => {
                log::debug!("No mapping for {}", remote_path);
                false
            }
            Err(f) => {
                log::warn!(
                    "Mapping check for {} failed, mapping anyway: {} ({})",
                    remote_path,
                    f,
                    f.output.trim()
                );
                false
            }
        }
    }
}

/// Get-SmbGlobalMapping -ErrorAction Stop fails this way when nothing is mapped
fn reports_no_mapping(failure: &HostFailure) -> bool {
    failure.output.contains("No MSFT_SmbGlobalMapping objects found")
}

/// Links to a share only resolve when the target ends in a backslash
fn link_target(remote_path: &str) -> String {
    if remote_path.ends_with('\\') {
        remote_path.to_string()
    } else {
        format!("{}\\", remote_path)
    }
}

fn validate_path(what: &str, path: &str) -> ProxyResult<()> {
    if path.trim().is_empty() {
        return Err(ProxyError::Validation(format!("{} is required", what)));
    }
    if path.chars().any(char::is_control) {
        return Err(ProxyError::Validation(format!("{} contains control characters", what)));
    }
    Ok(())
}
