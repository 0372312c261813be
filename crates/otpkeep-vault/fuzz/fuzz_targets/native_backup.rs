//! Fuzz target for native backup restore.
//!
//! Arbitrary text must be rejected cleanly, never panic.
//!
//! # Usage
//!
//! ```sh
//! cd crates/otpkeep-vault
//! cargo +nightly fuzz run native_backup -- -max_len=4096
//! ```

#![no_main]

use libfuzzer_sys::fuzz_target;
use otpkeep_vault::{decrypt_record, restore_native, MemoryMetadataStore, MemorySecretStore};

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    let _ = decrypt_record(text, b"fuzz");

    let mut meta = MemoryMetadataStore::new();
    let mut secrets = MemorySecretStore::new();
    let _ = restore_native(&mut meta, &mut secrets, text, b"fuzz");
});
