#![allow(clippy::unwrap_used, clippy::arithmetic_side_effects)]

//! Restore dispatch across both input formats.

use otpkeep_vault::{
    list_keys, restore, ImportError, MemorySecretStore, RestoreFormat, RestoreOutcome,
    SqliteMetadataStore, VaultError,
};

const NATIVE: &str = include_str!("fixtures/native_backup.txt");
const PLAIN: &str = include_str!("fixtures/aegis_plain.json");
const ENCRYPTED: &str = include_str!("fixtures/aegis_encrypted.json");

fn setup() -> (SqliteMetadataStore, MemorySecretStore) {
    (
        SqliteMetadataStore::open_in_memory().unwrap(),
        MemorySecretStore::new(),
    )
}

#[test]
fn native_restore_ignores_trailing_newline() {
    let (mut meta, mut secrets) = setup();
    assert!(NATIVE.ends_with('\n'));

    let outcome = restore(
        &mut meta,
        &mut secrets,
        NATIVE,
        b"backup-password",
        RestoreFormat::Native,
    )
    .unwrap();
    assert_eq!(
        outcome,
        RestoreOutcome::Native {
            restored: vec!["github".into(), "work vpn".into(), "legacy".into()],
        }
    );
    assert_eq!(secrets.len(), 3);
}

#[test]
fn plain_vault_ignores_password() {
    let (mut meta, mut secrets) = setup();
    let RestoreOutcome::Vault(report) =
        restore(&mut meta, &mut secrets, PLAIN, b"", RestoreFormat::Vault).unwrap()
    else {
        panic!("expected a vault outcome");
    };
    assert_eq!(report.imported.len(), 7);
    assert!(report.skipped.is_empty());
    assert_eq!(list_keys(&meta).unwrap().len(), 7);
}

#[test]
fn encrypted_vault_restores_with_password() {
    let (mut meta, mut secrets) = setup();
    let format: RestoreFormat = "aegis".parse().unwrap();
    let RestoreOutcome::Vault(report) =
        restore(&mut meta, &mut secrets, ENCRYPTED, b"test", format).unwrap()
    else {
        panic!("expected a vault outcome");
    };
    assert_eq!(report.imported.len(), 7);
    assert!(list_keys(&meta)
        .unwrap()
        .contains(&"Boeing - Sophia".to_string()));
}

#[test]
fn encrypted_vault_wrong_password_writes_nothing() {
    let (mut meta, mut secrets) = setup();
    let result = restore(&mut meta, &mut secrets, ENCRYPTED, b"wrong", RestoreFormat::Vault);
    assert!(matches!(
        result,
        Err(VaultError::Import(ImportError::MasterKeyUnwrap))
    ));
    assert!(list_keys(&meta).unwrap().is_empty());
    assert!(secrets.is_empty());
}

#[test]
fn vault_given_to_native_restore_fails() {
    let (mut meta, mut secrets) = setup();
    assert!(matches!(
        restore(&mut meta, &mut secrets, PLAIN, b"pw", RestoreFormat::Native),
        Err(VaultError::Decrypt(_))
    ));
}

#[test]
fn vault_with_bad_entry_is_partial() {
    let mut vault: serde_json::Value = serde_json::from_str(PLAIN).unwrap();
    vault["db"]["entries"][1]["info"]["secret"] = serde_json::json!(42);
    vault["db"]["entries"][2]["type"] = serde_json::json!("motp");

    let (mut meta, mut secrets) = setup();
    let RestoreOutcome::Vault(report) = restore(
        &mut meta,
        &mut secrets,
        &vault.to_string(),
        b"",
        RestoreFormat::Vault,
    )
    .unwrap() else {
        panic!("expected a vault outcome");
    };
    assert_eq!(report.imported.len(), 5);
    let skipped: Vec<usize> = report.skipped.iter().map(|s| s.index).collect();
    assert_eq!(skipped, vec![1, 2]);
}
