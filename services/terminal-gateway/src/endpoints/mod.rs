//! Compiled-in endpoint descriptors
//!
//! One descriptor per exposed RPC method: the owning backend, the
//! permissions a credential must carry and, where one exists, the REST route
//! that reaches it. The registry is built once at startup and only read
//! afterwards.

mod faraday;
mod lit;
mod lnd;
mod loopd;
mod pool;

use std::collections::HashMap;
use std::fmt;

use http::Method;

use crate::permission::{Permission, PermissionSet};
use crate::proto::Transcoder;

/// Backend daemons behind the gateway, plus the gateway's own sessions surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BackendName {
    /// Core node daemon; also the signing authority for super macaroons
    Lnd,
    /// Accounting daemon
    Faraday,
    /// Swap daemon
    Loop,
    /// Liquidity marketplace daemon
    Pool,
    /// The gateway's session-management service
    Lit,
}

impl BackendName {
    /// Every backend, in registration order.
    pub const ALL: [BackendName; 5] = [
        BackendName::Lnd,
        BackendName::Faraday,
        BackendName::Loop,
        BackendName::Pool,
        BackendName::Lit,
    ];

    /// Lower-case name used in config keys, logs and metrics.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Lnd => "lnd",
            Self::Faraday => "faraday",
            Self::Loop => "loop",
            Self::Pool => "pool",
            Self::Lit => "lit",
        }
    }

    fn methods(self) -> &'static [MethodSpec] {
        match self {
            Self::Lnd => lnd::METHODS,
            Self::Faraday => faraday::METHODS,
            Self::Loop => loopd::METHODS,
            Self::Pool => pool::METHODS,
            Self::Lit => lit::METHODS,
        }
    }

    fn rest_routes(self) -> Vec<RestRoute> {
        match self {
            Self::Lnd => lnd::rest_routes(),
            Self::Faraday => faraday::rest_routes(),
            Self::Loop => loopd::rest_routes(),
            Self::Pool => pool::rest_routes(),
            Self::Lit => lit::rest_routes(),
        }
    }
}

impl fmt::Display for BackendName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub(crate) struct MethodSpec {
    method: &'static str,
    permissions: &'static [(&'static str, &'static str)],
}

pub(crate) const fn method(
    method: &'static str,
    permissions: &'static [(&'static str, &'static str)],
) -> MethodSpec {
    MethodSpec {
        method,
        permissions,
    }
}

pub(crate) struct RestRoute {
    verb: Method,
    path: &'static str,
    method: &'static str,
    transcoder: Transcoder,
}

pub(crate) fn get(path: &'static str, method: &'static str, transcoder: Transcoder) -> RestRoute {
    RestRoute {
        verb: Method::GET,
        path,
        method,
        transcoder,
    }
}

pub(crate) fn post(path: &'static str, method: &'static str, transcoder: Transcoder) -> RestRoute {
    RestRoute {
        verb: Method::POST,
        path,
        method,
        transcoder,
    }
}

/// REST route bound to a method.
#[derive(Debug, Clone)]
pub struct RestBinding {
    /// HTTP verb
    pub verb: Method,
    /// Exact request path
    pub path: &'static str,
    /// JSON/protobuf conversion for the method's messages
    pub transcoder: Transcoder,
}

/// Static description of one exposed RPC method.
#[derive(Debug, Clone)]
pub struct EndpointDescriptor {
    /// Owning backend
    pub backend: BackendName,
    /// Fully qualified gRPC method, `/package.Service/Method`
    pub full_method: &'static str,
    /// Permissions a credential must grant
    pub permissions: Vec<Permission>,
    /// REST route, if the method has one
    pub rest: Option<RestBinding>,
}

/// Lookup table of every exposed method.
#[derive(Debug, Clone, Default)]
pub struct EndpointRegistry {
    methods: HashMap<&'static str, EndpointDescriptor>,
    rest: HashMap<Method, HashMap<&'static str, &'static str>>,
}

impl EndpointRegistry {
    /// Registry of every compiled-in backend surface.
    pub fn builtin() -> Self {
        let mut registry = Self::default();
        for backend in BackendName::ALL {
            for entry in backend.methods() {
                registry.methods.insert(
                    entry.method,
                    EndpointDescriptor {
                        backend,
                        full_method: entry.method,
                        permissions: entry
                            .permissions
                            .iter()
                            .map(|(entity, action)| Permission::new(*entity, *action))
                            .collect(),
                        rest: None,
                    },
                );
            }
            for route in backend.rest_routes() {
                registry.bind_rest(route);
            }
        }
        registry
    }

    fn bind_rest(&mut self, route: RestRoute) {
        if let Some(descriptor) = self.methods.get_mut(route.method) {
            self.rest
                .entry(route.verb.clone())
                .or_default()
                .insert(route.path, route.method);
            descriptor.rest = Some(RestBinding {
                verb: route.verb,
                path: route.path,
                transcoder: route.transcoder,
            });
        }
    }

    /// Descriptor for a fully qualified method.
    pub fn lookup(&self, full_method: &str) -> Option<&EndpointDescriptor> {
        self.methods.get(full_method)
    }

    /// Descriptor reached by a REST request.
    pub fn rest_route(&self, verb: &Method, path: &str) -> Option<&EndpointDescriptor> {
        let verb = if verb == Method::HEAD { &Method::GET } else { verb };
        self.rest
            .get(verb)
            .and_then(|routes| routes.get(path))
            .and_then(|method| self.methods.get(method))
    }

    /// Whether any REST route uses `path`, whatever its verb.
    pub fn is_rest_path(&self, path: &str) -> bool {
        self.rest.values().any(|routes| routes.contains_key(path))
    }

    /// Whether `path` belongs to the API surface rather than the UI.
    pub fn is_api_path(&self, path: &str) -> bool {
        self.methods.contains_key(path) || self.is_rest_path(path)
    }

    /// All descriptors, in no particular order.
    pub fn descriptors(&self) -> impl Iterator<Item = &EndpointDescriptor> {
        self.methods.values()
    }

    /// Union of the permissions `backend` declares, optionally only reads.
    pub fn permissions(&self, backend: BackendName, read_only: bool) -> PermissionSet {
        self.descriptors()
            .filter(|d| d.backend == backend)
            .flat_map(|d| d.permissions.iter())
            .filter(|p| !read_only || p.is_read_only())
            .cloned()
            .collect()
    }
}
