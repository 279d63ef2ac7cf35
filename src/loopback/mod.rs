//! Loopback fabric
//!
//! An in-process stand-in for the host's iSCSI initiator and disk stack.
//! Targets come from configuration and authenticate logins with real CHAP
//! exchanges; a successful login surfaces one offline, unpartitioned disk per
//! LUN, and logout takes them away again. Disk 0 is always present and plays
//! the system disk.

use crate::disk::host::DiskHost;
use crate::disk::types::{DiskIdentifiers, DiskLocation};
use crate::error::{ProxyError, ProxyResult};
use crate::iscsi::auth::{negotiate, ChapResponder, LoginAuth, TargetAuthPolicy};
use crate::iscsi::chap::ChapChallenge;
use crate::iscsi::host::IscsiHost;
use crate::iscsi::session::SessionKey;
use crate::iscsi::types::TargetPortal;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};

const SYSTEM_DISK_SIZE: u64 = 64 * 1024 * 1024 * 1024;

/// CHAP settings of a simulated target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetChap {
    pub username: String,
    pub secret: String,
    /// Secret the target answers mutual CHAP challenges with
    pub reverse_secret: Option<String>,
}

/// A simulated iSCSI target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopbackTarget {
    pub iqn: String,
    pub portal: TargetPortal,
    /// Size of each LUN in bytes
    pub lun_sizes: Vec<u64>,
    pub chap: Option<TargetChap>,
}

#[derive(Debug, Clone)]
struct Disk {
    online: bool,
    partitioned: bool,
    size: u64,
    ids: DiskIdentifiers,
    location: DiskLocation,
}

#[derive(Debug)]
struct Fabric {
    disks: BTreeMap<u32, Disk>,
    sessions: HashMap<SessionKey, Vec<u32>>,
    next_disk: u32,
}

pub struct Loopback {
    targets: Vec<LoopbackTarget>,
    fabric: Mutex<Fabric>,
}

impl Loopback {
    pub fn new(targets: Vec<LoopbackTarget>) -> Self {
        let targets: Vec<LoopbackTarget> = targets
            .into_iter()
            .map(|t| LoopbackTarget {
                portal: t.portal.normalized(),
                ..t
            })
            .collect();

        let mut disks = BTreeMap::new();
        disks.insert(
            0,
            Disk {
                online: true,
                partitioned: true,
                size: SYSTEM_DISK_SIZE,
                ids: DiskIdentifiers {
                    page83: page83("loopback-system-disk", 0),
                    serial_number: "LBSYS0000".to_string(),
                },
                location: DiskLocation {
                    adapter: "0".to_string(),
                    bus: "0".to_string(),
                    target: "0".to_string(),
                    lun_id: "0".to_string(),
                },
            },
        );

        log::info!("Loopback fabric with {} target(s)", targets.len());
        Self {
            targets,
            fabric: Mutex::new(Fabric {
                disks,
                sessions: HashMap::new(),
                next_disk: 1,
            }),
        }
    }

    fn fabric(&self) -> MutexGuard<'_, Fabric> {
        self.fabric.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn targets_at<'a>(
        &'a self,
        portal: &TargetPortal,
    ) -> impl Iterator<Item = (usize, &'a LoopbackTarget)> + 'a {
        let portal = portal.normalized();
        self.targets
            .iter()
            .enumerate()
            .filter(move |(_, t)| t.portal == portal)
    }

    fn target(&self, portal: &TargetPortal, iqn: &str) -> Option<(usize, &LoopbackTarget)> {
        self.targets_at(portal).find(|(_, t)| t.iqn == iqn)
    }

    fn disk<'a>(fabric: &'a mut Fabric, disk_id: &str) -> ProxyResult<&'a mut Disk> {
        disk_id
            .parse::<u32>()
            .ok()
            .and_then(|n| fabric.disks.get_mut(&n))
            .ok_or_else(|| ProxyError::NotFound(format!("disk {}", disk_id)))
    }
}

/// Stable page 0x83 style identifier for a LUN
fn page83(iqn: &str, lun: usize) -> String {
    format!("{:x}", md5::compute(format!("{}/{}", iqn, lun)))
}

/// Target side of the security negotiation
struct TargetSide<'a> {
    chap: Option<&'a TargetChap>,
    issued: Option<ChapChallenge>,
}

impl ChapResponder for TargetSide<'_> {
    fn policy(&self) -> TargetAuthPolicy {
        match self.chap {
            Some(_) => TargetAuthPolicy::Chap,
            None => TargetAuthPolicy::None,
        }
    }

    fn challenge(&mut self) -> ChapChallenge {
        let challenge = ChapChallenge::generate();
        self.issued = Some(challenge.clone());
        challenge
    }

    fn verify_initiator(&mut self, name: &str, response: &[u8]) -> Result<(), String> {
        let chap = self.chap.ok_or("CHAP is not enabled on this target")?;
        let issued = self.issued.as_ref().ok_or("no challenge issued")?;
        if name != chap.username || !issued.verify(response, &chap.secret) {
            return Err("authentication failure".to_string());
        }
        Ok(())
    }

    fn answer(&mut self, challenge: &ChapChallenge) -> Result<Vec<u8>, String> {
        let chap = self.chap.ok_or("CHAP is not enabled on this target")?;
        let reverse = chap
            .reverse_secret
            .as_ref()
            .ok_or("target has no mutual CHAP secret configured")?;
        if self.issued.as_ref().is_some_and(|issued| issued.value == challenge.value) {
            return Err("reflected challenge".to_string());
        }
        Ok(challenge.respond(reverse))
    }
}

impl IscsiHost for Loopback {
    fn add_portal(&self, portal: &TargetPortal) -> ProxyResult<()> {
        if self.targets_at(portal).next().is_none() {
            return Err(ProxyError::HostExecution {
                action: "New-IscsiTargetPortal".to_string(),
                reason: "portal unreachable".to_string(),
                output: format!("no loopback target listens on {}", portal),
            });
        }
        Ok(())
    }

    fn remove_portal(&self, portal: &TargetPortal) -> ProxyResult<()> {
        log::debug!("Loopback portal {} removed", portal);
        Ok(())
    }

    fn discover(&self, portal: &TargetPortal) -> ProxyResult<Vec<String>> {
        let iqns: Vec<String> = self.targets_at(portal).map(|(_, t)| t.iqn.clone()).collect();
        if iqns.is_empty() {
            return Err(ProxyError::Discovery(format!("{} is unreachable", portal.normalized())));
        }
        Ok(iqns)
    }

    fn login(&self, portal: &TargetPortal, iqn: &str, auth: &LoginAuth) -> ProxyResult<()> {
        let (index, target) = self
            .target(portal, iqn)
            .ok_or_else(|| {
                ProxyError::Connect(format!(
                    "target {} not found on {}",
                    iqn,
                    portal.normalized()
                ))
            })?;

        let mut side = TargetSide {
            chap: target.chap.as_ref(),
            issued: None,
        };
        negotiate(auth, &mut side)?;

        let key = SessionKey::new(portal, iqn);
        let mut fabric = self.fabric();
        if fabric.sessions.contains_key(&key) {
            return Err(ProxyError::Connect(format!("{} already has a session", key)));
        }

        let mut surfaced = Vec::with_capacity(target.lun_sizes.len());
        for (lun, size) in target.lun_sizes.iter().enumerate() {
            let number = fabric.next_disk;
            fabric.next_disk += 1;
            fabric.disks.insert(
                number,
                Disk {
                    online: false,
                    partitioned: false,
                    size: *size,
                    ids: DiskIdentifiers {
                        page83: page83(iqn, lun),
                        serial_number: format!("LB{:04}{:04}", index + 1, lun),
                    },
                    location: DiskLocation {
                        adapter: "1".to_string(),
                        bus: "0".to_string(),
                        target: (index + 1).to_string(),
                        lun_id: lun.to_string(),
                    },
                },
            );
            surfaced.push(number);
        }

        log::info!("Loopback login {} surfaced disk(s) {:?}", key, surfaced);
        fabric.sessions.insert(key, surfaced);
        Ok(())
    }

    fn logout(&self, portal: &TargetPortal, iqn: &str) -> ProxyResult<()> {
        let key = SessionKey::new(portal, iqn);
        let mut fabric = self.fabric();
        let disks = fabric
            .sessions
            .remove(&key)
            .ok_or_else(|| ProxyError::Disconnect(format!("no session for {}", key)))?;
        for number in disks {
            fabric.disks.remove(&number);
        }
        Ok(())
    }

    fn session_disks(&self, portal: &TargetPortal, iqn: &str) -> ProxyResult<Vec<String>> {
        let key = SessionKey::new(portal, iqn);
        let fabric = self.fabric();
        let disks = fabric
            .sessions
            .get(&key)
            .ok_or_else(|| ProxyError::Connect(format!("no session for {}", key)))?;
        Ok(disks.iter().map(u32::to_string).collect())
    }
}

impl DiskHost for Loopback {
    fn list_ids(&self) -> ProxyResult<BTreeMap<String, DiskIdentifiers>> {
        Ok(self
            .fabric()
            .disks
            .iter()
            .map(|(n, d)| (n.to_string(), d.ids.clone()))
            .collect())
    }

    fn list_locations(&self) -> ProxyResult<BTreeMap<String, DiskLocation>> {
        Ok(self
            .fabric()
            .disks
            .iter()
            .map(|(n, d)| (n.to_string(), d.location.clone()))
            .collect())
    }

    fn is_online(&self, disk_id: &str) -> ProxyResult<bool> {
        Ok(Self::disk(&mut self.fabric(), disk_id)?.online)
    }

    fn set_online(&self, disk_id: &str, online: bool) -> ProxyResult<()> {
        Self::disk(&mut self.fabric(), disk_id)?.online = online;
        Ok(())
    }

    fn is_partitioned(&self, disk_id: &str) -> ProxyResult<bool> {
        Ok(Self::disk(&mut self.fabric(), disk_id)?.partitioned)
    }

    fn partition(&self, disk_id: &str) -> ProxyResult<()> {
        let mut fabric = self.fabric();
        let disk = Self::disk(&mut fabric, disk_id)?;
        if !disk.online {
            return Err(ProxyError::Disk(format!("disk {} is offline", disk_id)));
        }
        disk.partitioned = true;
        Ok(())
    }

    fn rescan(&self) -> ProxyResult<()> {
        log::debug!("Loopback rescan");
        Ok(())
    }

    fn size(&self, disk_id: &str) -> ProxyResult<u64> {
        Ok(Self::disk(&mut self.fabric(), disk_id)?.size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::iscsi::auth::ChapCredentials;

    const IQN: &str = "iqn.2026-10.local:chaptarget";

    fn fabric() -> Loopback {
        Loopback::new(vec![LoopbackTarget {
            iqn: IQN.to_string(),
            portal: TargetPortal::new("127.0.0.1", 0),
            lun_sizes: vec![1 << 30, 2 << 30],
            chap: Some(TargetChap {
                username: "someuser".to_string(),
                secret: "verysecretpass".to_string(),
                reverse_secret: None,
            }),
        }])
    }

    fn portal() -> TargetPortal {
        TargetPortal::new("127.0.0.1", 3260)
    }

    fn chap(secret: &str) -> LoginAuth {
        LoginAuth::OneWay(ChapCredentials::new("someuser", secret))
    }

    #[test]
    fn test_discover() {
        let lb = fabric();
        assert_eq!(lb.discover(&portal()).unwrap(), [IQN]);
        assert!(matches!(
            lb.discover(&TargetPortal::new("127.0.0.2", 3260)),
            Err(ProxyError::Discovery(_))
        ));
    }

    #[test]
    fn test_login_surfaces_offline_disks() {
        let lb = fabric();
        lb.login(&portal(), IQN, &chap("verysecretpass")).unwrap();

        let disks = lb.session_disks(&portal(), IQN).unwrap();
        assert_eq!(disks, ["1", "2"]);
        assert!(!lb.is_online("1").unwrap());
        assert!(!lb.is_partitioned("1").unwrap());
        assert_eq!(lb.size("2").unwrap(), 2 << 30);
        assert_eq!(lb.list_ids().unwrap().len(), 3);

        lb.logout(&portal(), IQN).unwrap();
        assert!(matches!(lb.size("1"), Err(ProxyError::NotFound(_))));
        assert!(lb.logout(&portal(), IQN).is_err());
    }

    #[test]
    fn test_wrong_secret_surfaces_nothing() {
        let lb = fabric();
        assert!(matches!(
            lb.login(&portal(), IQN, &chap("notthesecret")),
            Err(ProxyError::Connect(_))
        ));
        assert!(lb.session_disks(&portal(), IQN).is_err());
        assert_eq!(lb.list_ids().unwrap().len(), 1);
    }

    #[test]
    fn test_partition_needs_online() {
        let lb = fabric();
        assert!(lb.is_partitioned("0").unwrap());
        lb.login(&portal(), IQN, &chap("verysecretpass")).unwrap();

        assert!(matches!(lb.partition("1"), Err(ProxyError::Disk(_))));
        lb.set_online("1", true).unwrap();
        lb.partition("1").unwrap();
        assert!(lb.is_partitioned("1").unwrap());
    }

    #[test]
    fn test_mutual_chap_needs_reverse_secret() {
        let lb = fabric();
        let auth = LoginAuth::Mutual {
            credentials: ChapCredentials::new("someuser", "verysecretpass"),
            mutual_secret: "reversssssssse".to_string(),
        };
        let err = lb.login(&portal(), IQN, &auth).unwrap_err();
        assert!(err.to_string().contains("target authentication failed"));
    }
}
