//! Property tests for UI password checks.

use proptest::prelude::*;

use terminal_gateway::auth::{BasicAuth, PasswordValidator};

use crate::generators;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Property: the secret as both username and password is accepted, and
    /// survives the Authorization header encoding.
    #[test]
    fn secret_pair_is_accepted(secret in generators::arb_password()) {
        let validator = PasswordValidator::new(&secret);
        let header = BasicAuth::new(secret.clone(), secret.clone()).header_value();
        let parsed = BasicAuth::parse(&header).unwrap();
        prop_assert!(validator.validate(&parsed).is_ok());
    }

    /// Property: any pair differing from the secret in either half is refused.
    #[test]
    fn other_pairs_are_refused(
        secret in generators::arb_password(),
        other in generators::arb_password(),
    ) {
        prop_assume!(secret != other);
        let validator = PasswordValidator::new(&secret);
        prop_assert!(validator.validate(&BasicAuth::new(other.clone(), other.clone())).is_err());
        prop_assert!(validator.validate(&BasicAuth::new(secret.clone(), other.clone())).is_err());
        prop_assert!(validator.validate(&BasicAuth::new(other, secret)).is_err());
    }

    /// Property: non-Basic authorization values never parse.
    #[test]
    fn other_schemes_do_not_parse(token in "[A-Za-z0-9]{8,40}") {
        let header = format!("Bearer {token}");
        prop_assert!(BasicAuth::parse(&header).is_none());
    }
}
