//! Property tests for the auth policy matrix.

use proptest::prelude::*;

use terminal_gateway::auth::{AuthMode, ListenerPort, PasswordRule, PolicyTable};
use terminal_gateway::endpoints::BackendName;

use crate::generators;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Property: every backend has a rule on both listeners.
    #[test]
    fn every_backend_has_a_rule_on_both_ports(
        backend in generators::arb_backend(),
        port in generators::arb_port(),
    ) {
        prop_assert!(PolicyTable::builtin().rule(backend, port).is_some());
    }

    /// Property: the password never stands in for a credential on the core
    /// port.
    #[test]
    fn password_never_substitutes_on_core_port(backend in generators::arb_backend()) {
        let rule = PolicyTable::builtin().rule(backend, ListenerPort::Core).unwrap();
        prop_assert_ne!(rule.password, PasswordRule::Substitutes);
    }

    /// Property: daemons with their own credentials verify them on both
    /// ports, and accept the password only on the gateway port.
    #[test]
    fn credential_backends_follow_the_matrix(
        backend in generators::arb_credential_backend(),
        port in generators::arb_port(),
    ) {
        let table = PolicyTable::builtin();
        prop_assert!(table.allows(backend, port, AuthMode::Credential));
        prop_assert_eq!(
            table.allows(backend, port, AuthMode::Password),
            port == ListenerPort::Gateway
        );
    }

    /// Property: the session surface is password-only and never parses a
    /// credential.
    #[test]
    fn session_surface_is_password_only(port in generators::arb_port()) {
        let table = PolicyTable::builtin();
        prop_assert!(!table.allows(BackendName::Lit, port, AuthMode::Credential));
        prop_assert!(table.allows(BackendName::Lit, port, AuthMode::Password));
    }
}

#[test]
fn builtin_entries_are_exhaustive() {
    let entries: Vec<_> = PolicyTable::builtin().entries().collect();
    // Four credential daemons: credential on both ports plus the gateway
    // password. The session surface: password on both ports.
    assert_eq!(entries.len(), 4 * 3 + 2);
    assert!(PolicyTable::builtin().validate().is_ok());
}
