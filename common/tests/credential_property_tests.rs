// Property-based tests for credential strategy selection

use common::config::WarehouseConfig;
use common::credential::{normalize_passphrase, AuthStrategy, CredentialSpec};
use proptest::prelude::*;

fn base_config() -> WarehouseConfig {
    WarehouseConfig {
        account: "my-account".to_string(),
        user: "SVC_USER".to_string(),
        role: Some("SYSADMIN".to_string()),
        warehouse: Some("COMPUTE_WH".to_string()),
        password: None,
        password_secret_name: None,
        private_key_pem: None,
        private_key_secret_name: None,
        private_key_passphrase: None,
        base_url: None,
        statement: None,
    }
}

fn maybe_value() -> impl Strategy<Value = Option<String>> {
    prop_oneof![
        Just(None),
        Just(Some(String::new())),
        "[a-zA-Z0-9-]{1,16}".prop_map(Some),
    ]
}

fn is_populated(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|v| !v.is_empty())
}

proptest! {
    /// *For any* combination of populated credential settings, strategy
    /// selection follows the documented precedence: private key from vault,
    /// then plain private key, then password from vault, then plain
    /// password. Empty strings count as absent, and no populated value
    /// fails.
    #[test]
    fn property_strategy_selection_follows_precedence(
        password in maybe_value(),
        password_secret in maybe_value(),
        key_pem in maybe_value(),
        key_secret in maybe_value(),
    ) {
        let mut config = base_config();
        config.password = password.clone();
        config.password_secret_name = password_secret.clone();
        config.private_key_pem = key_pem.clone();
        config.private_key_secret_name = key_secret.clone();

        let outcome = CredentialSpec::from_config(&config);

        if is_populated(&key_secret) {
            let matched = matches!(outcome.unwrap().strategy, AuthStrategy::VaultPrivateKey { .. });
            prop_assert!(matched);
        } else if is_populated(&key_pem) {
            let matched = matches!(outcome.unwrap().strategy, AuthStrategy::PlainPrivateKey { .. });
            prop_assert!(matched);
        } else if is_populated(&password_secret) {
            let matched = matches!(outcome.unwrap().strategy, AuthStrategy::VaultPassword { .. });
            prop_assert!(matched);
        } else if is_populated(&password) {
            let matched = matches!(outcome.unwrap().strategy, AuthStrategy::PlainPassword { .. });
            prop_assert!(matched);
        } else {
            prop_assert!(outcome.is_err());
        }
    }

    /// *For any* configuration, repeated resolution yields equivalent specs:
    /// selection is pure with no hidden state.
    #[test]
    fn property_resolution_is_strategy_pure(
        password in maybe_value(),
        password_secret in maybe_value(),
        key_pem in maybe_value(),
        key_secret in maybe_value(),
        passphrase in maybe_value(),
    ) {
        let mut config = base_config();
        config.password = password;
        config.password_secret_name = password_secret;
        config.private_key_pem = key_pem;
        config.private_key_secret_name = key_secret;
        config.private_key_passphrase = passphrase;

        match (CredentialSpec::from_config(&config), CredentialSpec::from_config(&config)) {
            (Ok(first), Ok(second)) => prop_assert_eq!(first, second),
            (Err(_), Err(_)) => {}
            _ => prop_assert!(false, "resolution outcome changed between calls"),
        }
    }

    /// *For any* non-empty passphrase other than the literal "None", the
    /// value passes through normalization unchanged.
    #[test]
    fn property_real_passphrases_pass_through(
        passphrase in "[a-zA-Z0-9!@#]{1,24}",
    ) {
        prop_assume!(passphrase != "None");
        prop_assert_eq!(
            normalize_passphrase(Some(&passphrase)),
            Some(passphrase.clone())
        );
    }
}

#[test]
fn test_passphrase_sentinels_are_no_passphrase() {
    // Absent, empty, and the literal string "None" are equivalent
    assert_eq!(normalize_passphrase(None), None);
    assert_eq!(normalize_passphrase(Some("")), None);
    assert_eq!(normalize_passphrase(Some("None")), None);
}
