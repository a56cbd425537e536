//! Proptest Generators
//!
//! Shared generators for property-based tests.

use proptest::prelude::*;

use terminal_gateway::auth::ListenerPort;
use terminal_gateway::endpoints::BackendName;
use terminal_gateway::rootkey::RootKeyId;

/// Any backend
pub fn arb_backend() -> impl Strategy<Value = BackendName> {
    prop::sample::select(BackendName::ALL.to_vec())
}

/// Backends that verify their own credentials
pub fn arb_credential_backend() -> impl Strategy<Value = BackendName> {
    prop::sample::select(vec![
        BackendName::Lnd,
        BackendName::Faraday,
        BackendName::Loop,
        BackendName::Pool,
    ])
}

/// Either listener
pub fn arb_port() -> impl Strategy<Value = ListenerPort> {
    prop_oneof![Just(ListenerPort::Gateway), Just(ListenerPort::Core)]
}

/// Root key IDs outside the super macaroon namespace
pub fn arb_native_root_key() -> impl Strategy<Value = RootKeyId> {
    (0u64..=u32::MAX as u64).prop_map(RootKeyId)
}

/// First-party caveat predicates
pub fn arb_caveat() -> impl Strategy<Value = String> {
    prop_oneof![
        "[a-z]{3,10} [a-zA-Z0-9]{1,20}",
        Just("time-before 2099-01-01T00:00:00Z".to_string()),
        Just("ipaddr 127.0.0.1".to_string()),
    ]
}

/// Passwords as typed into the UI
pub fn arb_password() -> impl Strategy<Value = String> {
    "[ -9;-~]{8,40}"
}
