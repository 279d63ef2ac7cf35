//! End-to-end calls through the dispatcher against the loopback fabric

use serde_json::{json, Value};
use storage_proxy::config::Config;
use storage_proxy::server::{ApiServers, Dispatcher};
use storage_proxy::ProxyResult;

const OPEN: &str = "iqn.2026-10.local:open";
const ONE_WAY: &str = "iqn.2026-10.local:oneway";
const MUTUAL: &str = "iqn.2026-10.local:mutual";

const CONFIG: &str = r#"
[host]
backend = "loopback"

[[loopback.target]]
iqn = "iqn.2026-10.local:open"
luns = [1073741824]

[[loopback.target]]
iqn = "iqn.2026-10.local:oneway"
address = "127.0.0.2"
chap_username = "initiator"
chap_secret = "initiator-secret"

[[loopback.target]]
iqn = "iqn.2026-10.local:mutual"
address = "127.0.0.3"
chap_username = "initiator"
chap_secret = "initiator-secret"
reverse_chap_secret = "target-secret-1"
"#;

fn dispatcher() -> Dispatcher {
    let config = Config::parse(CONFIG).unwrap();
    ApiServers::from_config(&config).dispatcher(&config).unwrap()
}

fn call(
    d: &Dispatcher,
    group: &str,
    version: &str,
    method: &str,
    payload: Value,
) -> ProxyResult<Value> {
    d.dispatch_path(group, version, method, payload)
}

fn iscsi(d: &Dispatcher, method: &str, payload: Value) -> ProxyResult<Value> {
    call(d, "iscsi", "v1alpha2", method, payload)
}

fn portal(address: &str, port: u32) -> Value {
    json!({"targetPortal": {"targetAddress": address, "targetPort": port}})
}

fn session(address: &str, iqn: &str) -> Value {
    json!({"targetPortal": {"targetAddress": address}, "iqn": iqn})
}

fn connect(address: &str, iqn: &str, auth_type: i32, username: &str, secret: &str) -> Value {
    json!({
        "targetPortal": {"targetAddress": address, "targetPort": 3260},
        "iqn": iqn,
        "authType": auth_type,
        "chapUsername": username,
        "chapSecret": secret,
    })
}

#[test]
fn test_portal_registry_normalizes_port() {
    let d = dispatcher();

    iscsi(&d, "AddTargetPortal", portal("127.0.0.1", 3260)).unwrap();
    iscsi(&d, "AddTargetPortal", portal("127.0.0.1", 0)).unwrap();

    let listed = iscsi(&d, "ListTargetPortals", json!({})).unwrap();
    assert_eq!(
        listed,
        json!({"targetPortals": [{"targetAddress": "127.0.0.1", "targetPort": 3260}]})
    );

    iscsi(&d, "RemoveTargetPortal", portal("127.0.0.1", 0)).unwrap();
    let listed = iscsi(&d, "ListTargetPortals", json!({})).unwrap();
    assert_eq!(listed, json!({"targetPortals": []}));
}

#[test]
fn test_unreachable_portal_is_not_registered() {
    let d = dispatcher();
    let err = iscsi(&d, "AddTargetPortal", portal("10.1.1.1", 0)).unwrap_err();
    assert_eq!(err.kind(), "host_execution");
    assert_eq!(iscsi(&d, "ListTargetPortals", json!({})).unwrap(), json!({"targetPortals": []}));
}

#[test]
fn test_connect_without_chap() {
    let d = dispatcher();
    iscsi(&d, "ConnectTarget", connect("127.0.0.1", OPEN, 0, "", "")).unwrap();

    let disks = iscsi(&d, "GetTargetDisks", session("127.0.0.1", OPEN)).unwrap();
    assert_eq!(disks, json!({"diskIDs": ["1"]}));
}

#[test]
fn test_none_with_credentials_is_rejected() {
    let d = dispatcher();
    let request = connect("127.0.0.1", OPEN, 0, "initiator", "x");
    let err = iscsi(&d, "ConnectTarget", request).unwrap_err();
    assert_eq!(err.kind(), "validation");
}

#[test]
fn test_one_way_chap() {
    let d = dispatcher();

    let request = connect("127.0.0.2", ONE_WAY, 1, "initiator", "wrong-secret");
    let err = iscsi(&d, "ConnectTarget", request).unwrap_err();
    assert_eq!(err.kind(), "connect");

    // Failed login leaves nothing behind
    let err = iscsi(&d, "GetTargetDisks", session("127.0.0.2", ONE_WAY)).unwrap_err();
    assert_eq!(err.kind(), "connect");

    let request = connect("127.0.0.2", ONE_WAY, 1, "initiator", "initiator-secret");
    iscsi(&d, "ConnectTarget", request).unwrap();
    let disks = iscsi(&d, "GetTargetDisks", session("127.0.0.2", ONE_WAY)).unwrap();
    assert_eq!(disks["diskIDs"].as_array().unwrap().len(), 1);
}

#[test]
fn test_open_target_refuses_chap() {
    let d = dispatcher();
    let request = connect("127.0.0.1", OPEN, 1, "initiator", "initiator-secret");
    let err = iscsi(&d, "ConnectTarget", request).unwrap_err();
    assert_eq!(err.kind(), "connect");
}

#[test]
fn test_mutual_chap() {
    let d = dispatcher();
    let request = connect("127.0.0.3", MUTUAL, 2, "initiator", "initiator-secret");

    let err = iscsi(&d, "ConnectTarget", request.clone()).unwrap_err();
    assert_eq!(err.kind(), "connect");
    assert!(err.to_string().contains("SetMutualChapSecret"));

    iscsi(&d, "SetMutualChapSecret", json!({"mutualChapSecret": "not-the-target"})).unwrap();
    let err = iscsi(&d, "ConnectTarget", request.clone()).unwrap_err();
    assert_eq!(err.kind(), "connect");

    iscsi(&d, "SetMutualChapSecret", json!({"mutualChapSecret": "target-secret-1"})).unwrap();
    iscsi(&d, "ConnectTarget", request).unwrap();
}

#[test]
fn test_empty_mutual_secret_is_rejected() {
    let d = dispatcher();
    let err = iscsi(&d, "SetMutualChapSecret", json!({"mutualChapSecret": ""})).unwrap_err();
    assert_eq!(err.kind(), "validation");
}

#[test]
fn test_attach_and_partition_flow() {
    let d = dispatcher();

    iscsi(&d, "AddTargetPortal", portal("127.0.0.1", 0)).unwrap();
    let found = iscsi(&d, "DiscoverTargetPortal", portal("127.0.0.1", 0)).unwrap();
    assert_eq!(found, json!({"iqns": [OPEN]}));

    iscsi(&d, "ConnectTarget", connect("127.0.0.1", OPEN, 0, "", "")).unwrap();
    let disks = iscsi(&d, "GetTargetDisks", session("127.0.0.1", OPEN)).unwrap();
    let disk = disks["diskIDs"][0].as_str().unwrap().to_string();

    let ids = call(&d, "disk", "v1", "ListDiskIDs", json!({})).unwrap();
    assert!(ids["diskIDs"][&disk]["page83"].as_str().is_some_and(|p| !p.is_empty()));
    let stats = call(&d, "disk", "v1", "DiskStats", json!({"diskID": disk})).unwrap();
    assert_eq!(stats, json!({"totalBytes": 1073741824u64}));

    // Surfaced disks start offline and cannot be partitioned
    let state = call(&d, "disk", "v1", "GetAttachState", json!({"diskID": disk})).unwrap();
    assert_eq!(state, json!({"isOnline": false}));
    let err = call(&d, "disk", "v1", "PartitionDisk", json!({"diskID": disk})).unwrap_err();
    assert_eq!(err.kind(), "disk");

    call(&d, "disk", "v1", "SetAttachState", json!({"diskID": disk, "isOnline": true})).unwrap();
    call(&d, "disk", "v1", "PartitionDisk", json!({"diskID": disk})).unwrap();
    call(&d, "disk", "v1", "PartitionDisk", json!({"diskID": disk})).unwrap();
    call(&d, "disk", "v1", "SetAttachState", json!({"diskID": disk, "isOnline": false})).unwrap();
    let state = call(&d, "disk", "v1", "GetAttachState", json!({"diskID": disk})).unwrap();
    assert_eq!(state, json!({"isOnline": false}));

    iscsi(&d, "DisconnectTarget", session("127.0.0.1", OPEN)).unwrap();
    let err = call(&d, "disk", "v1", "GetAttachState", json!({"diskID": disk})).unwrap_err();
    assert_eq!(err.kind(), "not_found");
}

#[test]
fn test_disks_need_a_session() {
    let d = dispatcher();
    let err = iscsi(&d, "GetTargetDisks", session("127.0.0.1", OPEN)).unwrap_err();
    assert_eq!(err.kind(), "connect");
}

#[test]
fn test_disconnect_twice() {
    let d = dispatcher();
    iscsi(&d, "ConnectTarget", connect("127.0.0.1", OPEN, 0, "", "")).unwrap();
    iscsi(&d, "DisconnectTarget", session("127.0.0.1", OPEN)).unwrap();

    let err = iscsi(&d, "DisconnectTarget", session("127.0.0.1", OPEN)).unwrap_err();
    assert_eq!(err.kind(), "disconnect");
}

#[test]
fn test_older_version_shares_state() {
    let d = dispatcher();
    let request = connect("127.0.0.2", ONE_WAY, 1, "initiator", "initiator-secret");
    call(&d, "iscsi", "v1alpha1", "ConnectTarget", request).unwrap();
    let disks = iscsi(&d, "GetTargetDisks", session("127.0.0.2", ONE_WAY)).unwrap();
    assert_eq!(disks["diskIDs"].as_array().unwrap().len(), 1);
}

#[test]
fn test_older_version_has_no_mutual_chap() {
    let d = dispatcher();
    let request = connect("127.0.0.3", MUTUAL, 2, "initiator", "initiator-secret");
    let err = call(&d, "iscsi", "v1alpha1", "ConnectTarget", request).unwrap_err();
    assert_eq!(err.kind(), "conversion");

    let secret = json!({"mutualChapSecret": "x"});
    let err = call(&d, "iscsi", "v1alpha1", "SetMutualChapSecret", secret).unwrap_err();
    assert_eq!(err.kind(), "unknown_method");
}
