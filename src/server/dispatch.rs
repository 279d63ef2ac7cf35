//! Version dispatch table
//!
//! Every wire version of every API group is served from one canonical server
//! instance. A versioned adapter is nothing more than a set of registrations
//! `(group, version, method) -> (converter, canonical handler)` made once at
//! startup through a [`Registrar`].

use super::{ApiGroup, CallContext};
use crate::apiversion::ApiVersion;
use crate::error::{ConversionError, ProxyError, ProxyResult};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// A wire message of one API version
///
/// Conversions are pure. They must not guess: a value with no representation
/// on the other side is a [`ConversionError`]. For every field the wire type
/// defines, `from_canonical(to_canonical(x)) == x`.
pub trait Versioned: Sized + 'static {
    type Canonical: 'static;

    fn to_canonical(self) -> Result<Self::Canonical, ConversionError>;

    fn from_canonical(canonical: Self::Canonical) -> Result<Self, ConversionError>;
}

type Handler = Box<dyn Fn(&CallContext, Value) -> ProxyResult<Value> + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct RouteKey {
    group: ApiGroup,
    version: ApiVersion,
    method: String,
}

/// Dispatch table and version registry
pub struct Dispatcher {
    routes: BTreeMap<RouteKey, Handler>,
    next_request: AtomicU64,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self {
            routes: BTreeMap::new(),
            next_request: AtomicU64::new(1),
        }
    }

    /// Start registering the methods of one (group, version) adapter
    pub fn registrar<S>(
        &mut self,
        group: ApiGroup,
        version: ApiVersion,
        server: Arc<S>,
    ) -> Registrar<'_, S>
    where
        S: Send + Sync + 'static,
    {
        Registrar {
            dispatcher: self,
            group,
            version,
            server,
        }
    }

    fn insert(&mut self, key: RouteKey, handler: Handler) -> ProxyResult<()> {
        if self.routes.contains_key(&key) {
            return Err(ProxyError::Registration(format!(
                "{}/{}/{} registered twice",
                key.group, key.version, key.method
            )));
        }
        log::debug!("Registered {}/{}/{}", key.group, key.version, key.method);
        self.routes.insert(key, handler);
        Ok(())
    }

    /// Route one call
    pub fn dispatch(
        &self,
        group: ApiGroup,
        version: &ApiVersion,
        method: &str,
        payload: Value,
    ) -> ProxyResult<Value> {
        let key = RouteKey {
            group,
            version: version.clone(),
            method: method.to_string(),
        };

        let handler = self.routes.get(&key).ok_or_else(|| ProxyError::UnknownMethod {
            group: group.to_string(),
            version: version.to_string(),
            method: method.to_string(),
        })?;

        let ctx = CallContext {
            group,
            version: version.clone(),
            method: method.to_string(),
            request_id: self.next_request.fetch_add(1, Ordering::Relaxed),
        };

        log::debug!("[{}] {}/{}/{}", ctx.request_id, group, version, method);
        let result = handler(&ctx, payload);
        if let Err(ref e) = result {
            log::info!("[{}] {}/{}/{} failed: {}", ctx.request_id, group, version, method, e);
        }
        result
    }

    /// Route a call addressed by strings, as it arrives from a transport
    pub fn dispatch_path(
        &self,
        group: &str,
        version: &str,
        method: &str,
        payload: Value,
    ) -> ProxyResult<Value> {
        let unknown = || ProxyError::UnknownMethod {
            group: group.to_string(),
            version: version.to_string(),
            method: method.to_string(),
        };
        let group: ApiGroup = group.parse().map_err(|_| unknown())?;
        let version = ApiVersion::parse(version).map_err(|_| unknown())?;
        self.dispatch(group, &version, method, payload)
    }

    /// Groups with at least one active version
    pub fn groups(&self) -> Vec<ApiGroup> {
        let mut groups: Vec<ApiGroup> = self.routes.keys().map(|k| k.group).collect();
        groups.dedup();
        groups
    }

    /// Active versions of a group, oldest first
    pub fn versions(&self, group: ApiGroup) -> Vec<ApiVersion> {
        let mut versions: Vec<ApiVersion> = self
            .routes
            .keys()
            .filter(|k| k.group == group)
            .map(|k| k.version.clone())
            .collect();
        versions.dedup();
        versions
    }

    /// Methods served by one (group, version)
    pub fn methods(&self, group: ApiGroup, version: &ApiVersion) -> Vec<&str> {
        self.routes
            .keys()
            .filter(|k| k.group == group && &k.version == version)
            .map(|k| k.method.as_str())
            .collect()
    }

    pub fn route_count(&self) -> usize {
        self.routes.len()
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

/// Binds the converters of one (group, version) to a shared group server
pub struct Registrar<'d, S> {
    dispatcher: &'d mut Dispatcher,
    group: ApiGroup,
    version: ApiVersion,
    server: Arc<S>,
}

impl<'d, S> Registrar<'d, S>
where
    S: Send + Sync + 'static,
{
    /// Register `name`, decoding `Req` and encoding `Resp` around `op`
    pub fn method<Req, Resp>(
        &mut self,
        name: &'static str,
        op: fn(&S, &CallContext, Req::Canonical) -> ProxyResult<Resp::Canonical>,
    ) -> ProxyResult<&mut Self>
    where
        Req: Versioned + DeserializeOwned,
        Resp: Versioned + Serialize,
    {
        let server = Arc::clone(&self.server);
        let handler: Handler =
            Box::new(move |ctx: &CallContext, payload: Value| -> ProxyResult<Value> {
                let wire: Req = serde_json::from_value(payload).map_err(|e| {
                    ProxyError::Validation(format!("malformed {} request: {}", ctx.method, e))
                })?;
                let request = wire.to_canonical()?;
                let response = op(server.as_ref(), ctx, request)?;
                let wire = Resp::from_canonical(response)?;
                serde_json::to_value(wire).map_err(|e| {
                    let reason = format!("failed to encode {} response: {}", ctx.method, e);
                    ConversionError::new(reason).into()
                })
            });

        let key = RouteKey {
            group: self.group,
            version: self.version.clone(),
            method: name.to_string(),
        };
        self.dispatcher.insert(key, handler)?;
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    // A canonical echo server with two wire versions: v1 counts with a u8,
    // v2 with a u32.
    struct Echo;

    impl Echo {
        fn double(&self, ctx: &CallContext, n: u32) -> ProxyResult<u32> {
            if ctx.version.to_string() == "v1" && n == 0 {
                return Err(ProxyError::Validation("zero".to_string()));
            }
            Ok(n * 2)
        }
    }

    #[derive(Deserialize, Serialize)]
    struct SmallCount {
        n: u8,
    }

    impl Versioned for SmallCount {
        type Canonical = u32;

        fn to_canonical(self) -> Result<u32, ConversionError> {
            Ok(self.n as u32)
        }

        fn from_canonical(n: u32) -> Result<Self, ConversionError> {
            let n = u8::try_from(n)
                .map_err(|_| ConversionError::new(format!("{} does not fit in u8", n)))?;
            Ok(Self { n })
        }
    }

    #[derive(Deserialize, Serialize)]
    struct WideCount {
        n: u32,
    }

    impl Versioned for WideCount {
        type Canonical = u32;

        fn to_canonical(self) -> Result<u32, ConversionError> {
            Ok(self.n)
        }

        fn from_canonical(n: u32) -> Result<Self, ConversionError> {
            Ok(Self { n })
        }
    }

    fn dispatcher() -> Dispatcher {
        let echo = Arc::new(Echo);
        let mut dispatcher = Dispatcher::new();
        dispatcher
            .registrar(ApiGroup::System, "v1".parse().unwrap(), Arc::clone(&echo))
            .method::<SmallCount, SmallCount>("Double", Echo::double)
            .unwrap();
        dispatcher
            .registrar(ApiGroup::System, "v2".parse().unwrap(), echo)
            .method::<WideCount, WideCount>("Double", Echo::double)
            .unwrap();
        dispatcher
    }

    #[test]
    fn test_two_versions_share_one_server() {
        let d = dispatcher();
        let v1 = d.dispatch_path("system", "v1", "Double", json!({"n": 21})).unwrap();
        let v2 = d.dispatch_path("system", "v2", "Double", json!({"n": 200})).unwrap();
        assert_eq!(v1, json!({"n": 42}));
        assert_eq!(v2, json!({"n": 400}));
    }

    #[test]
    fn test_response_conversion_error() {
        let d = dispatcher();
        let err = d.dispatch_path("system", "v1", "Double", json!({"n": 200})).unwrap_err();
        assert!(matches!(err, ProxyError::Conversion(_)));
    }

    #[test]
    fn test_business_error_propagates_unchanged() {
        let d = dispatcher();
        let err = d.dispatch_path("system", "v1", "Double", json!({"n": 0})).unwrap_err();
        assert!(matches!(err, ProxyError::Validation(ref m) if m == "zero"));

        // Same input through v2 is fine: the canonical handler saw the version tag
        let v2 = d.dispatch_path("system", "v2", "Double", json!({"n": 0})).unwrap();
        assert_eq!(v2, json!({"n": 0}));
    }

    #[test]
    fn test_malformed_payload_is_validation_error() {
        let d = dispatcher();
        let err = d.dispatch_path("system", "v2", "Double", json!({"n": "x"})).unwrap_err();
        assert_eq!(err.kind(), "validation");
    }

    #[test]
    fn test_unknown_routes() {
        let d = dispatcher();
        for (group, version, method) in [
            ("system", "v3", "Double"),
            ("system", "v1", "Triple"),
            ("disk", "v1", "Double"),
            ("tape", "v1", "Double"),
            ("system", "one", "Double"),
        ] {
            let err = d.dispatch_path(group, version, method, json!({})).unwrap_err();
            assert_eq!(err.kind(), "unknown_method", "{}/{}/{}", group, version, method);
        }
    }

    #[test]
    fn test_duplicate_registration_rejected() {
        let mut d = dispatcher();
        let result = d
            .registrar(ApiGroup::System, "v1".parse().unwrap(), Arc::new(Echo))
            .method::<SmallCount, SmallCount>("Double", Echo::double)
            .map(|_| ());
        assert!(matches!(result, Err(ProxyError::Registration(_))));
    }

    #[test]
    fn test_version_registry() {
        let d = dispatcher();
        assert_eq!(d.groups(), vec![ApiGroup::System]);
        let versions: Vec<String> =
            d.versions(ApiGroup::System).iter().map(|v| v.to_string()).collect();
        assert_eq!(versions, ["v1", "v2"]);
        assert_eq!(d.methods(ApiGroup::System, &"v2".parse().unwrap()), vec!["Double"]);
        assert!(d.versions(ApiGroup::Disk).is_empty());
        assert_eq!(d.route_count(), 2);
    }
}
