//! Host side of the iSCSI initiator
//!
//! [`IscsiHost`] is what [`IscsiServer`](super::IscsiServer) drives once a
//! request has been validated and the session table updated. The Windows
//! implementation runs the iSCSI cmdlets through [`HostAutomation`]; every
//! caller supplied value travels in the value bag.

use super::auth::LoginAuth;
use super::types::TargetPortal;
use crate::error::{ProxyError, ProxyResult};
use crate::host::{parse_json_list, HostAutomation, ValueBag};
use std::sync::Arc;

/// Initiator operations on the host
pub trait IscsiHost: Send + Sync {
    fn add_portal(&self, portal: &TargetPortal) -> ProxyResult<()>;

    fn remove_portal(&self, portal: &TargetPortal) -> ProxyResult<()>;

    /// IQNs advertised by a portal
    fn discover(&self, portal: &TargetPortal) -> ProxyResult<Vec<String>>;

    /// Log in to a target, authenticating as `auth` says
    fn login(&self, portal: &TargetPortal, iqn: &str, auth: &LoginAuth) -> ProxyResult<()>;

    fn logout(&self, portal: &TargetPortal, iqn: &str) -> ProxyResult<()>;

    /// Disks surfaced by a logged in session
    fn session_disks(&self, portal: &TargetPortal, iqn: &str) -> ProxyResult<Vec<String>>;
}

const ADD_PORTAL: &str = "New-IscsiTargetPortal -TargetPortalAddress $Env:iscsi_tp_address \
     -TargetPortalPortNumber $Env:iscsi_tp_port";

const REMOVE_PORTAL: &str = "Get-IscsiTargetPortal -TargetPortalAddress $Env:iscsi_tp_address \
     -TargetPortalPortNumber $Env:iscsi_tp_port | Remove-IscsiTargetPortal -Confirm:$false";

const DISCOVER: &str = "ConvertTo-Json -InputObject @(New-IscsiTargetPortal \
     -TargetPortalAddress $Env:iscsi_tp_address -TargetPortalPortNumber $Env:iscsi_tp_port \
     | Get-IscsiTarget | Select-Object -ExpandProperty NodeAddress)";

const SET_MUTUAL_SECRET: &str = "Set-IscsiChapSecret -ChapSecret $Env:iscsi_mutual_chap_secret";

const CONNECT: &str = "Connect-IscsiTarget -TargetPortalAddress $Env:iscsi_tp_address \
     -TargetPortalPortNumber $Env:iscsi_tp_port -NodeAddress $Env:iscsi_target_iqn \
     -AuthenticationType $Env:iscsi_auth_type";

const CONNECT_CHAP: &str = "Connect-IscsiTarget -TargetPortalAddress $Env:iscsi_tp_address \
     -TargetPortalPortNumber $Env:iscsi_tp_port -NodeAddress $Env:iscsi_target_iqn \
     -AuthenticationType $Env:iscsi_auth_type \
     -ChapUsername $Env:iscsi_chap_user -ChapSecret $Env:iscsi_chap_secret";

const DISCONNECT: &str = "$ErrorActionPreference = 'Stop'; \
     $s = Get-IscsiConnection | Where-Object { $_.TargetAddress -eq $Env:iscsi_tp_address \
     -and $_.TargetPortNumber -eq [int]$Env:iscsi_tp_port } | Get-IscsiSession \
     | Where-Object { $_.TargetNodeAddress -eq $Env:iscsi_target_iqn }; \
     if (-not $s) { throw 'no session' }; \
     Disconnect-IscsiTarget -SessionIdentifier $s.SessionIdentifier -Confirm:$false";

const SESSION_DISKS: &str = "$ErrorActionPreference = 'Stop'; \
     $tp = Get-IscsiTargetPortal -TargetPortalAddress $Env:iscsi_tp_address \
     -TargetPortalPortNumber $Env:iscsi_tp_port; \
     $t = $tp | Get-IscsiTarget | Where-Object { $_.NodeAddress -eq $Env:iscsi_target_iqn }; \
     $c = Get-IscsiConnection -IscsiTarget $t; \
     $ids = $c | Get-Disk | Select-Object -ExpandProperty Number | Out-String -Stream; \
     ConvertTo-Json -InputObject @($ids)";

/// iSCSI initiator cmdlets on Windows
pub struct PowerShellIscsi {
    automation: Arc<dyn HostAutomation>,
}

impl PowerShellIscsi {
    pub fn new(automation: Arc<dyn HostAutomation>) -> Self {
        Self { automation }
    }

    fn portal_values(portal: &TargetPortal) -> ValueBag {
        let portal = portal.normalized();
        ValueBag::new()
            .with("iscsi_tp_address", portal.target_address)
            .with("iscsi_tp_port", portal.target_port.to_string())
    }
}

/// `-AuthenticationType` argument of Connect-IscsiTarget
fn auth_type_arg(auth: &LoginAuth) -> &'static str {
    match auth {
        LoginAuth::None => "NONE",
        LoginAuth::OneWay(_) => "ONEWAYCHAP",
        LoginAuth::Mutual { .. } => "MUTUALCHAP",
    }
}

impl IscsiHost for PowerShellIscsi {
    fn add_portal(&self, portal: &TargetPortal) -> ProxyResult<()> {
        self.automation
            .run(ADD_PORTAL, &Self::portal_values(portal))
            .map_err(|f| f.into_error("New-IscsiTargetPortal"))?;
        Ok(())
    }

    fn remove_portal(&self, portal: &TargetPortal) -> ProxyResult<()> {
        self.automation
            .run(REMOVE_PORTAL, &Self::portal_values(portal))
            .map_err(|f| f.into_error("Remove-IscsiTargetPortal"))?;
        Ok(())
    }

    fn discover(&self, portal: &TargetPortal) -> ProxyResult<Vec<String>> {
        let output = self
            .automation
            .run(DISCOVER, &Self::portal_values(portal))
            .map_err(|f| {
                ProxyError::Discovery(format!("{}: {}, output: {:?}", portal, f.reason, f.output))
            })?;

        parse_json_list(&output).map_err(|e| ProxyError::Discovery(format!("{}: {}", portal, e)))
    }

    fn login(&self, portal: &TargetPortal, iqn: &str, auth: &LoginAuth) -> ProxyResult<()> {
        if let LoginAuth::Mutual { mutual_secret, .. } = auth {
            let values = ValueBag::new().with("iscsi_mutual_chap_secret", mutual_secret.as_str());
            self.automation
                .run(SET_MUTUAL_SECRET, &values)
                .map_err(|f| {
                    ProxyError::Connect(format!(
                        "setting mutual CHAP secret: {}, output: {:?}",
                        f.reason, f.output
                    ))
                })?;
        }

        let mut values = Self::portal_values(portal)
            .with("iscsi_target_iqn", iqn)
            .with("iscsi_auth_type", auth_type_arg(auth));

        let template = match auth.credentials() {
            Some(credentials) => {
                values = values
                    .with("iscsi_chap_user", credentials.username.as_str())
                    .with("iscsi_chap_secret", credentials.secret.as_str());
                CONNECT_CHAP
            }
            None => CONNECT,
        };

        self.automation
            .run(template, &values)
            .map_err(|f| {
                ProxyError::Connect(format!(
                    "{} via {}: {}, output: {:?}",
                    iqn, portal, f.reason, f.output
                ))
            })?;
        Ok(())
    }

    fn logout(&self, portal: &TargetPortal, iqn: &str) -> ProxyResult<()> {
        let values = Self::portal_values(portal).with("iscsi_target_iqn", iqn);
        self.automation
            .run(DISCONNECT, &values)
            .map_err(|f| {
                ProxyError::Disconnect(format!(
                    "{} via {}: {}, output: {:?}",
                    iqn, portal, f.reason, f.output
                ))
            })?;
        Ok(())
    }

    fn session_disks(&self, portal: &TargetPortal, iqn: &str) -> ProxyResult<Vec<String>> {
        let values = Self::portal_values(portal).with("iscsi_target_iqn", iqn);
        let output = self
            .automation
            .run(SESSION_DISKS, &values)
            .map_err(|f| f.into_error("Get-IscsiConnection"))?;

        parse_json_list(&output).map_err(|e| ProxyError::HostExecution {
            action: "Get-Disk".to_string(),
            reason: e,
            output,
        })
    }
}
