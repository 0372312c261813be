//! Subcommand handlers.
//!
//! Handlers take the stores and I/O streams explicitly so they run the
//! same against the real backends and the in-memory ones.

use std::fs;
use std::io::{BufRead, Write};
use std::path::Path;
use std::time::SystemTime;

use anyhow::{bail, Context, Result};
use otpkeep_vault::import::aegis;
use otpkeep_vault::{
    add_key, backup_all, dump_keys, generate_token, get_key, list_keys, remove_key, rename_key,
    AddKeyParams, KeyKind, MetadataStore, RestoreFormat, RestoreOutcome, SecretStore,
};
use tracing::{debug, warn};
use zeroize::Zeroize;

use crate::config;
use crate::AddArgs;

// ---------------------------------------------------------------------------
// Key management
// ---------------------------------------------------------------------------

pub fn add(
    meta: &mut dyn MetadataStore,
    secrets: &mut dyn SecretStore,
    input: &mut dyn BufRead,
    out: &mut dyn Write,
    args: &AddArgs,
) -> Result<()> {
    eprint!("otp secret for {}: ", args.name);
    let mut secret = String::new();
    input
        .read_line(&mut secret)
        .context("cannot read secret from stdin")?;

    let added = add_key(
        meta,
        secrets,
        AddKeyParams {
            name: args.name.clone(),
            secret: secret.trim_end_matches(['\r', '\n']).to_string(),
            digits: args.digits,
            interval: args.interval,
            kind: args.hotp.then_some(KeyKind::Hotp),
            counter: args.counter,
            algorithm: args.algorithm,
        },
    );
    secret.zeroize();

    let record = added.with_context(|| format!("cannot add key {}", args.name))?;
    writeln!(out, "added key {}", record.name)?;
    Ok(())
}

pub fn generate(
    meta: &mut dyn MetadataStore,
    secrets: &dyn SecretStore,
    out: &mut dyn Write,
    name: &str,
    verbose: bool,
    now: SystemTime,
) -> Result<()> {
    let token = generate_token(meta, secrets, name, now)
        .with_context(|| format!("cannot generate token for {name}"))?;

    if verbose && token.expires_in > 0 {
        writeln!(out, "{} ( {} seconds left )", token.value, token.expires_in)?;
    } else {
        writeln!(out, "{}", token.value)?;
    }
    Ok(())
}

pub fn list(meta: &dyn MetadataStore, out: &mut dyn Write, verbose: bool) -> Result<()> {
    if verbose {
        for record in dump_keys(meta)? {
            writeln!(out, "{}", record.verbose_line())?;
        }
    } else {
        for name in list_keys(meta)? {
            writeln!(out, "{name}")?;
        }
    }
    Ok(())
}

pub fn remove(
    meta: &mut dyn MetadataStore,
    secrets: &mut dyn SecretStore,
    out: &mut dyn Write,
    name: &str,
) -> Result<()> {
    remove_key(meta, secrets, name).with_context(|| format!("cannot remove key {name}"))?;
    writeln!(out, "removed key {name}")?;
    Ok(())
}

pub fn rename(
    meta: &mut dyn MetadataStore,
    secrets: &mut dyn SecretStore,
    out: &mut dyn Write,
    old: &str,
    new: &str,
) -> Result<()> {
    rename_key(meta, secrets, old, new)
        .with_context(|| format!("cannot rename key {old} to {new}"))?;
    writeln!(out, "renamed key {old} to {new}")?;
    Ok(())
}

/// One record as a JSON object, or every record as a JSON array.
pub fn dump(meta: &dyn MetadataStore, out: &mut dyn Write, name: Option<&str>) -> Result<()> {
    let json = match name {
        Some(name) => serde_json::to_string_pretty(&get_key(meta, name)?)?,
        None => serde_json::to_string_pretty(&dump_keys(meta)?)?,
    };
    writeln!(out, "{json}")?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Backup and restore
// ---------------------------------------------------------------------------

pub fn backup(
    meta: &dyn MetadataStore,
    secrets: &dyn SecretStore,
    out: &mut dyn Write,
    mut password: String,
) -> Result<()> {
    let blob = backup_all(meta, secrets, password.as_bytes());
    password.zeroize();

    let blob = blob.context("backup failed")?;
    if blob.is_empty() {
        warn!("no keys to back up");
        return Ok(());
    }
    writeln!(out, "{blob}")?;
    Ok(())
}

pub fn restore(
    meta: &mut dyn MetadataStore,
    secrets: &mut dyn SecretStore,
    input: &mut dyn BufRead,
    out: &mut dyn Write,
    format: &str,
    file: Option<&Path>,
    password_env: Option<&str>,
) -> Result<()> {
    let format: RestoreFormat = format.parse()?;

    let data = match file {
        Some(path) => fs::read_to_string(path)
            .with_context(|| format!("cannot read {}", path.display()))?,
        None => {
            let mut data = String::new();
            input
                .read_to_string(&mut data)
                .context("cannot read backup from stdin")?;
            data
        }
    };

    let needs_password = match format {
        RestoreFormat::Native => true,
        RestoreFormat::Vault => {
            aegis::parse(data.trim().as_bytes()).is_ok_and(|vault| vault.is_encrypted())
        }
    };
    let mut password = if needs_password {
        if file.is_none() && password_env.is_none() {
            bail!("stdin already holds the backup; pass --password-env or a file");
        }
        config::read_password(password_env, input)?
    } else {
        String::new()
    };
    debug!(%format, needs_password, "restoring");

    let outcome = otpkeep_vault::restore(meta, secrets, &data, password.as_bytes(), format);
    password.zeroize();

    match outcome.context("restore failed")? {
        RestoreOutcome::Native { restored } => {
            for name in &restored {
                writeln!(out, "restored {name}")?;
            }
        }
        RestoreOutcome::Vault(report) => {
            for name in &report.imported {
                writeln!(out, "imported {name}")?;
            }
            for skipped in &report.skipped {
                writeln!(
                    out,
                    "skipped entry {} ({}): {}",
                    skipped.index, skipped.name, skipped.reason
                )?;
            }
            writeln!(
                out,
                "{} imported, {} skipped",
                report.imported.len(),
                report.skipped.len()
            )?;
        }
    }
    Ok(())
}
