//! Auth policy table
//!
//! One rule per (backend, listener port) pair states which auth modes are
//! accepted there. Every method of a backend shares its backend's rule.

use std::collections::BTreeMap;
use std::fmt;

use thiserror::Error;

use crate::endpoints::BackendName;

/// The two physical listeners.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ListenerPort {
    /// The core daemon's native RPC port, native gRPC only
    Core,
    /// The unified port serving gRPC, gRPC-Web, REST and the UI
    Gateway,
}

impl ListenerPort {
    /// Both ports.
    pub const ALL: [ListenerPort; 2] = [ListenerPort::Core, ListenerPort::Gateway];

    /// Name used in logs and metrics.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Core => "core",
            Self::Gateway => "gateway",
        }
    }
}

impl fmt::Display for ListenerPort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An auth mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AuthMode {
    /// A macaroon verified against the owning backend
    Credential,
    /// The UI password over Basic auth
    Password,
}

/// How the UI password is treated on a port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PasswordRule {
    /// Password auth is not accepted
    Rejected,
    /// A correct password authorizes the call on its own; any credential
    /// sent along is ignored
    Substitutes,
    /// A credential must be present but is never parsed; the password alone
    /// decides
    GatesCredential,
}

/// Auth rule for one backend on one port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PortRule {
    /// Whether a credential is verified
    pub credential: bool,
    /// How the UI password is treated
    pub password: PasswordRule,
}

impl PortRule {
    /// Credential auth only.
    pub const CREDENTIAL_ONLY: PortRule = PortRule {
        credential: true,
        password: PasswordRule::Rejected,
    };

    /// Whether `mode` is accepted under this rule.
    pub fn accepts(&self, mode: AuthMode) -> bool {
        match mode {
            AuthMode::Credential => self.credential,
            AuthMode::Password => self.password != PasswordRule::Rejected,
        }
    }
}

/// Policy table validation errors.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum PolicyError {
    /// A backend accepts no auth mode on any port
    #[error("backend {0} is unreachable: no auth mode accepted on any port")]
    Unreachable(BackendName),
}

/// Auth policy for every backend and port.
#[derive(Debug, Clone, Default)]
pub struct PolicyTable {
    rules: BTreeMap<(BackendName, ListenerPort), PortRule>,
}

impl PolicyTable {
    /// The gateway's policy.
    ///
    /// - lnd, faraday, loop and pool: credential only on the core port;
    ///   credential or a substituting password on the gateway port.
    /// - lit: on the core port the password gates an unparsed credential;
    ///   on the gateway port the password substitutes.
    pub fn builtin() -> Self {
        let mut table = Self::default();
        for backend in [
            BackendName::Lnd,
            BackendName::Faraday,
            BackendName::Loop,
            BackendName::Pool,
        ] {
            table.set(backend, ListenerPort::Core, PortRule::CREDENTIAL_ONLY);
            table.set(
                backend,
                ListenerPort::Gateway,
                PortRule {
                    credential: true,
                    password: PasswordRule::Substitutes,
                },
            );
        }
        table.set(
            BackendName::Lit,
            ListenerPort::Core,
            PortRule {
                credential: false,
                password: PasswordRule::GatesCredential,
            },
        );
        table.set(
            BackendName::Lit,
            ListenerPort::Gateway,
            PortRule {
                credential: false,
                password: PasswordRule::Substitutes,
            },
        );
        table
    }

    /// Set the rule for `backend` on `port`.
    pub fn set(&mut self, backend: BackendName, port: ListenerPort, rule: PortRule) -> &mut Self {
        self.rules.insert((backend, port), rule);
        self
    }

    /// Rule for `backend` on `port`, if any mode is configured.
    pub fn rule(&self, backend: BackendName, port: ListenerPort) -> Option<PortRule> {
        self.rules.get(&(backend, port)).copied()
    }

    /// Whether `mode` is accepted for `backend` on `port`.
    pub fn allows(&self, backend: BackendName, port: ListenerPort, mode: AuthMode) -> bool {
        self.rule(backend, port).is_some_and(|rule| rule.accepts(mode))
    }

    /// Whether `backend`'s credentials are verified on any port.
    pub fn verifies_credentials(&self, backend: BackendName) -> bool {
        ListenerPort::ALL
            .iter()
            .any(|port| self.allows(backend, *port, AuthMode::Credential))
    }

    /// Every (backend, port, mode) combination that is accepted.
    pub fn entries(&self) -> impl Iterator<Item = (BackendName, ListenerPort, AuthMode)> + '_ {
        self.rules.iter().flat_map(|(&(backend, port), rule)| {
            [AuthMode::Credential, AuthMode::Password]
                .into_iter()
                .filter(move |mode| rule.accepts(*mode))
                .map(move |mode| (backend, port, mode))
        })
    }

    /// Every backend must accept at least one mode on at least one port.
    pub fn validate(&self) -> Result<(), PolicyError> {
        for backend in BackendName::ALL {
            let reachable = ListenerPort::ALL.iter().any(|port| {
                self.allows(backend, *port, AuthMode::Credential)
                    || self.allows(backend, *port, AuthMode::Password)
            });
            if !reachable {
                return Err(PolicyError::Unreachable(backend));
            }
        }
        Ok(())
    }
}
