//! iSCSI API group server
//!
//! One instance serves every wire version. Portal registry and session table
//! share one coarse lock, never held across a host command. Logins and
//! logouts park the session in `Connecting`/`Disconnecting` so that
//! concurrent calls for the same session fail instead of interleaving.
//! Portal adds and removes are serialized among themselves.

use super::auth::{ChapCredentials, LoginAuth};
use super::credentials::{validate_secret, MutualChapStore};
use super::host::IscsiHost;
use super::portal::TargetPortalRegistry;
use super::session::{SessionKey, SessionState, SessionTable};
use super::types::*;
use crate::error::{ProxyError, ProxyResult};
use crate::server::CallContext;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Default)]
struct IscsiState {
    portals: TargetPortalRegistry,
    sessions: SessionTable,
}

pub struct IscsiServer {
    host: Arc<dyn IscsiHost>,
    credentials: Arc<dyn MutualChapStore>,
    state: Mutex<IscsiState>,
    portal_ops: Mutex<()>,
}

impl IscsiServer {
    pub fn new(host: Arc<dyn IscsiHost>, credentials: Arc<dyn MutualChapStore>) -> Self {
        Self {
            host,
            credentials,
            state: Mutex::new(IscsiState::default()),
            portal_ops: Mutex::new(()),
        }
    }

    fn state(&self) -> MutexGuard<'_, IscsiState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn add_target_portal(
        &self,
        _ctx: &CallContext,
        req: AddTargetPortalRequest,
    ) -> ProxyResult<AddTargetPortalResponse> {
        let portal = req.target_portal.normalized();
        portal.validate()?;

        let _ops = self.portal_ops.lock().unwrap_or_else(PoisonError::into_inner);
        if self.state().portals.contains(&portal) {
            log::debug!("Target portal {} already registered", portal);
            return Ok(AddTargetPortalResponse {});
        }

        // The registry only changes once the host has accepted the portal
        self.host.add_portal(&portal)?;
        self.state().portals.add(&portal);
        Ok(AddTargetPortalResponse {})
    }

    pub fn remove_target_portal(
        &self,
        _ctx: &CallContext,
        req: RemoveTargetPortalRequest,
    ) -> ProxyResult<RemoveTargetPortalResponse> {
        let portal = req.target_portal.normalized();
        portal.validate()?;

        let _ops = self.portal_ops.lock().unwrap_or_else(PoisonError::into_inner);
        if !self.state().portals.contains(&portal) {
            log::debug!("Target portal {} not registered, nothing to remove", portal);
            return Ok(RemoveTargetPortalResponse {});
        }

        self.host.remove_portal(&portal)?;
        self.state().portals.remove(&portal);
        Ok(RemoveTargetPortalResponse {})
    }

    pub fn list_target_portals(
        &self,
        _ctx: &CallContext,
        _req: ListTargetPortalsRequest,
    ) -> ProxyResult<ListTargetPortalsResponse> {
        Ok(ListTargetPortalsResponse {
            target_portals: self.state().portals.list(),
        })
    }

    /// Discovery does not require the portal to have been added first
    pub fn discover_target_portal(
        &self,
        _ctx: &CallContext,
        req: DiscoverTargetPortalRequest,
    ) -> ProxyResult<DiscoverTargetPortalResponse> {
        let portal = req.target_portal.normalized();
        portal.validate()?;

        if !self.state().portals.contains(&portal) {
            log::debug!("Discovering unregistered portal {}", portal);
        }

        let iqns = self.host.discover(&portal)?;
        log::info!("Portal {} advertises {} target(s)", portal, iqns.len());
        Ok(DiscoverTargetPortalResponse { iqns })
    }

    pub fn connect_target(
        &self,
        ctx: &CallContext,
        req: ConnectTargetRequest,
    ) -> ProxyResult<ConnectTargetResponse> {
        let portal = req.target_portal.normalized();
        portal.validate()?;
        validate_iqn(&req.iqn)?;
        let auth = self.login_auth(&req)?;

        let key = SessionKey::new(&portal, &req.iqn);
        self.state().sessions.begin_connect(&key, req.auth_type)?;
        log::info!("[{}] Connecting {} ({})", ctx.request_id, key, req.auth_type);

        match self.host.login(&portal, &req.iqn, &auth) {
            Ok(()) => {
                self.state().sessions.finish_connect(&key);
                log::info!("[{}] Connected {}", ctx.request_id, key);
                Ok(ConnectTargetResponse {})
            }
            Err(e) => {
                self.state().sessions.abort_connect(&key);
                log::warn!("[{}] Connecting {} failed: {}", ctx.request_id, key, e);
                Err(e)
            }
        }
    }

    /// Build the login credentials, reading the mutual secret from the store
    fn login_auth(&self, req: &ConnectTargetRequest) -> ProxyResult<LoginAuth> {
        if !req.auth_type.uses_chap() {
            if !req.chap_username.is_empty() || !req.chap_secret.is_empty() {
                return Err(ProxyError::Validation(
                    "CHAP username and secret must be empty when authentication type is NONE"
                        .to_string(),
                ));
            }
            return Ok(LoginAuth::None);
        }

        if req.chap_username.is_empty() {
            return Err(ProxyError::Validation(format!(
                "CHAP username is required for {}",
                req.auth_type
            )));
        }
        validate_secret(&req.chap_secret)?;
        let credentials =
            ChapCredentials::new(req.chap_username.as_str(), req.chap_secret.as_str());

        if req.auth_type == AuthenticationType::OneWayChap {
            return Ok(LoginAuth::OneWay(credentials));
        }

        let mutual_secret = self.credentials.secret().ok_or_else(|| {
            ProxyError::Connect(
                "mutual CHAP secret is not set, call SetMutualChapSecret first".to_string(),
            )
        })?;
        Ok(LoginAuth::Mutual {
            credentials,
            mutual_secret,
        })
    }

    pub fn disconnect_target(
        &self,
        ctx: &CallContext,
        req: DisconnectTargetRequest,
    ) -> ProxyResult<DisconnectTargetResponse> {
        let portal = req.target_portal.normalized();
        portal.validate()?;
        validate_iqn(&req.iqn)?;

        let key = SessionKey::new(&portal, &req.iqn);
        self.state().sessions.begin_disconnect(&key)?;

        match self.host.logout(&portal, &req.iqn) {
            Ok(()) => {
                self.state().sessions.finish_disconnect(&key);
                log::info!("[{}] Disconnected {}", ctx.request_id, key);
                Ok(DisconnectTargetResponse {})
            }
            Err(e) => {
                self.state().sessions.abort_disconnect(&key);
                log::warn!("[{}] Disconnecting {} failed: {}", ctx.request_id, key, e);
                Err(e)
            }
        }
    }

    pub fn get_target_disks(
        &self,
        _ctx: &CallContext,
        req: GetTargetDisksRequest,
    ) -> ProxyResult<GetTargetDisksResponse> {
        let portal = req.target_portal.normalized();
        portal.validate()?;
        validate_iqn(&req.iqn)?;

        let key = SessionKey::new(&portal, &req.iqn);
        self.state().sessions.require_connected(&key)?;

        let disk_ids = self.host.session_disks(&portal, &req.iqn)?;
        log::debug!("{} surfaced disk(s) {:?}", key, disk_ids);
        Ok(GetTargetDisksResponse { disk_ids })
    }

    pub fn set_mutual_chap_secret(
        &self,
        _ctx: &CallContext,
        req: SetMutualChapSecretRequest,
    ) -> ProxyResult<SetMutualChapSecretResponse> {
        validate_secret(&req.mutual_chap_secret)?;
        self.credentials.set_secret(req.mutual_chap_secret);
        log::info!("Mutual CHAP secret updated");
        Ok(SetMutualChapSecretResponse {})
    }

    /// Current state of a session, `None` when disconnected
    pub fn session_state(&self, portal: &TargetPortal, iqn: &str) -> Option<SessionState> {
        self.state().sessions.state(&SessionKey::new(portal, iqn))
    }
}

fn validate_iqn(iqn: &str) -> ProxyResult<()> {
    if iqn.trim().is_empty() {
        return Err(ProxyError::Validation("target IQN is required".to_string()));
    }
    if iqn.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(ProxyError::Validation(format!("invalid target IQN {:?}", iqn)));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::apiversion::ApiVersion;
    use crate::iscsi::credentials::ProcessChapStore;
    use crate::server::ApiGroup;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::mpsc;
    use std::thread;

    /// Counts host calls and fails the ones it is told to
    #[derive(Default)]
    struct CountingHost {
        calls: AtomicUsize,
        fail_add: bool,
        fail_logout: bool,
    }

    impl IscsiHost for CountingHost {
        fn add_portal(&self, _portal: &TargetPortal) -> ProxyResult<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_add {
                return Err(ProxyError::HostExecution {
                    action: "New-IscsiTargetPortal".to_string(),
                    reason: "exit status 1".to_string(),
                    output: "unreachable".to_string(),
                });
            }
            Ok(())
        }

        fn remove_portal(&self, _portal: &TargetPortal) -> ProxyResult<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn discover(&self, _portal: &TargetPortal) -> ProxyResult<Vec<String>> {
            Ok(vec!["iqn.2026-10.local:t1".to_string()])
        }

        fn login(&self, _portal: &TargetPortal, _iqn: &str, _auth: &LoginAuth) -> ProxyResult<()> {
            Ok(())
        }

        fn logout(&self, _portal: &TargetPortal, _iqn: &str) -> ProxyResult<()> {
            if self.fail_logout {
                return Err(ProxyError::Disconnect("session busy".to_string()));
            }
            Ok(())
        }

        fn session_disks(&self, _portal: &TargetPortal, _iqn: &str) -> ProxyResult<Vec<String>> {
            Ok(vec!["1".to_string()])
        }
    }

    fn ctx() -> CallContext {
        CallContext::new(ApiGroup::Iscsi, ApiVersion::parse("v1alpha2").unwrap(), "Test")
    }

    fn server(host: CountingHost) -> (Arc<CountingHost>, IscsiServer) {
        let host = Arc::new(host);
        let server = IscsiServer::new(host.clone(), Arc::new(ProcessChapStore::new()));
        (host, server)
    }

    fn portal(port: u32) -> TargetPortal {
        TargetPortal::new("10.0.0.5", port)
    }

    #[test]
    fn test_add_twice_calls_host_once() {
        let (host, server) = server(CountingHost::default());
        for port in [3260, 0] {
            server
                .add_target_portal(&ctx(), AddTargetPortalRequest { target_portal: portal(port) })
                .unwrap();
        }
        assert_eq!(host.calls.load(Ordering::SeqCst), 1);

        let list = server.list_target_portals(&ctx(), ListTargetPortalsRequest {}).unwrap();
        assert_eq!(list.target_portals, vec![portal(3260)]);
    }

    #[test]
    fn test_failed_add_leaves_registry_untouched() {
        let (_, server) = server(CountingHost {
            fail_add: true,
            ..Default::default()
        });
        let err = server
            .add_target_portal(&ctx(), AddTargetPortalRequest { target_portal: portal(0) })
            .unwrap_err();
        assert_eq!(err.kind(), "host_execution");
        assert!(server
            .list_target_portals(&ctx(), ListTargetPortalsRequest {})
            .unwrap()
            .target_portals
            .is_empty());
    }

    #[test]
    fn test_remove_absent_portal_skips_host() {
        let (host, server) = server(CountingHost::default());
        server
            .remove_target_portal(&ctx(), RemoveTargetPortalRequest { target_portal: portal(0) })
            .unwrap();
        assert_eq!(host.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_connect_validation() {
        let (_, server) = server(CountingHost::default());
        let base = ConnectTargetRequest {
            target_portal: portal(0),
            iqn: "iqn.2026-10.local:t1".to_string(),
            ..Default::default()
        };

        let cases = [
            ConnectTargetRequest {
                iqn: String::new(),
                ..base.clone()
            },
            ConnectTargetRequest {
                chap_secret: "verysecretpass".to_string(),
                ..base.clone()
            },
            ConnectTargetRequest {
                auth_type: AuthenticationType::OneWayChap,
                chap_secret: "verysecretpass".to_string(),
                ..base.clone()
            },
            ConnectTargetRequest {
                auth_type: AuthenticationType::OneWayChap,
                chap_username: "someuser".to_string(),
                ..base.clone()
            },
            ConnectTargetRequest {
                target_portal: TargetPortal::new("", 3260),
                ..base.clone()
            },
        ];
        for req in cases {
            let err = server.connect_target(&ctx(), req.clone()).unwrap_err();
            assert_eq!(err.kind(), "validation", "{:?}", req);
            assert_eq!(server.session_state(&req.target_portal, &req.iqn), None);
        }
    }

    #[test]
    fn test_mutual_chap_without_secret() {
        let (_, server) = server(CountingHost::default());
        let req = ConnectTargetRequest {
            target_portal: portal(0),
            iqn: "iqn.2026-10.local:t1".to_string(),
            auth_type: AuthenticationType::MutualChap,
            chap_username: "anotheruser".to_string(),
            chap_secret: "averylongsecret".to_string(),
        };
        let err = server.connect_target(&ctx(), req).unwrap_err();
        assert!(matches!(err, ProxyError::Connect(ref m) if m.contains("SetMutualChapSecret")));
    }

    #[test]
    fn test_failed_logout_keeps_session() {
        let (_, server) = server(CountingHost {
            fail_logout: true,
            ..Default::default()
        });
        let iqn = "iqn.2026-10.local:t1".to_string();
        server
            .connect_target(
                &ctx(),
                ConnectTargetRequest {
                    target_portal: portal(0),
                    iqn: iqn.clone(),
                    ..Default::default()
                },
            )
            .unwrap();

        let err = server
            .disconnect_target(
                &ctx(),
                DisconnectTargetRequest {
                    target_portal: portal(3260),
                    iqn: iqn.clone(),
                },
            )
            .unwrap_err();
        assert_eq!(err.kind(), "disconnect");
        assert_eq!(server.session_state(&portal(0), &iqn), Some(SessionState::Connected));
    }

    #[test]
    fn test_invalid_mutual_secret_keeps_previous() {
        let store = Arc::new(ProcessChapStore::new());
        let server = IscsiServer::new(Arc::new(CountingHost::default()), store.clone());

        server
            .set_mutual_chap_secret(
                &ctx(),
                SetMutualChapSecretRequest {
                    mutual_chap_secret: "reversssssssse".to_string(),
                },
            )
            .unwrap();
        let err = server
            .set_mutual_chap_secret(
                &ctx(),
                SetMutualChapSecretRequest {
                    mutual_chap_secret: String::new(),
                },
            )
            .unwrap_err();

        assert_eq!(err.kind(), "validation");
        assert_eq!(store.secret().as_deref(), Some("reversssssssse"));
    }

    /// Holds `add_portal` until the test releases it
    struct GatedHost {
        entered: Mutex<mpsc::Sender<()>>,
        release: Mutex<mpsc::Receiver<()>>,
    }

    impl IscsiHost for GatedHost {
        fn add_portal(&self, _portal: &TargetPortal) -> ProxyResult<()> {
            self.entered.lock().unwrap().send(()).unwrap();
            self.release.lock().unwrap().recv().unwrap();
            Ok(())
        }

        fn remove_portal(&self, _portal: &TargetPortal) -> ProxyResult<()> {
            Ok(())
        }

        fn discover(&self, _portal: &TargetPortal) -> ProxyResult<Vec<String>> {
            Ok(Vec::new())
        }

        fn login(&self, _portal: &TargetPortal, _iqn: &str, _auth: &LoginAuth) -> ProxyResult<()> {
            Ok(())
        }

        fn logout(&self, _portal: &TargetPortal, _iqn: &str) -> ProxyResult<()> {
            Ok(())
        }

        fn session_disks(&self, _portal: &TargetPortal, _iqn: &str) -> ProxyResult<Vec<String>> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn test_listing_while_portal_add_in_flight() {
        let (entered_tx, entered_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel();
        let host = GatedHost {
            entered: Mutex::new(entered_tx),
            release: Mutex::new(release_rx),
        };
        let server = Arc::new(IscsiServer::new(Arc::new(host), Arc::new(ProcessChapStore::new())));

        let adder = {
            let server = Arc::clone(&server);
            thread::spawn(move || {
                let req = AddTargetPortalRequest { target_portal: portal(0) };
                server.add_target_portal(&ctx(), req)
            })
        };
        entered_rx.recv().unwrap();

        let list = server.list_target_portals(&ctx(), ListTargetPortalsRequest {}).unwrap();
        assert!(list.target_portals.is_empty());

        release_tx.send(()).unwrap();
        adder.join().unwrap().unwrap();
        let list = server.list_target_portals(&ctx(), ListTargetPortalsRequest {}).unwrap();
        assert_eq!(list.target_portals, vec![portal(3260)]);
    }
}
