//! `otpkeep`: command-line front end for the otpkeep key store.
//!
//! Key records go to a SQLite database, secrets to the OS keyring.

#![cfg_attr(test, allow(clippy::unwrap_used, clippy::arithmetic_side_effects))]

mod commands;
mod config;
mod logging;


use std::io::{self, Write};
use std::path::PathBuf;
use std::time::SystemTime;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use otpkeep_vault::keyring_store::DEFAULT_SERVICE;
use otpkeep_vault::OtpAlgorithm;
use otpkeep_vault::{KeyringSecretStore, SqliteMetadataStore};

#[derive(Parser, Debug)]
#[command(name = "otpkeep", author, version, about = "Personal OTP secret manager")]
struct Cli {
    /// Path to the key database.
    #[arg(long, env = "OTPKEEP_DB", value_name = "PATH", global = true)]
    db: Option<PathBuf>,

    /// Keyring service that holds the secrets.
    #[arg(long, env = "OTPKEEP_RING", default_value = DEFAULT_SERVICE, global = true)]
    ring: String,

    /// Read the backup password from this environment variable instead of stdin.
    #[arg(long, value_name = "VAR", global = true)]
    password_env: Option<String>,

    /// Enable debug logging.
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Add a key. The Base32 secret is read from stdin.
    Add(AddArgs),
    /// Print the current token for a key.
    Generate {
        name: String,
        /// Also print how long the token stays valid.
        #[arg(short, long)]
        verbose: bool,
    },
    /// List stored keys.
    List {
        /// Show digits and interval for each key.
        #[arg(short, long)]
        verbose: bool,
    },
    /// Remove a key and its secret.
    Remove { name: String },
    /// Rename a key.
    Rename { old: String, new: String },
    /// Print key records as JSON.
    Dump { name: Option<String> },
    /// Print an encrypted backup of every key.
    Backup,
    /// Restore keys from a native backup or an Aegis vault export.
    Restore {
        /// Input format: `native` or `vault` (alias `aegis`).
        #[arg(long, default_value = "native")]
        format: String,
        /// Input file. Read from stdin when omitted.
        file: Option<PathBuf>,
    },
}

#[derive(Args, Debug, Clone, Default)]
struct AddArgs {
    name: String,
    /// Number of token digits.
    #[arg(long)]
    digits: Option<u32>,
    /// TOTP interval in seconds.
    #[arg(long, value_name = "SECONDS")]
    interval: Option<u32>,
    /// Counter-based key instead of time-based.
    #[arg(long)]
    hotp: bool,
    /// Initial HOTP counter.
    #[arg(long, requires = "hotp")]
    counter: Option<u64>,
    /// HMAC hash: SHA1 (default), SHA256 or SHA512.
    #[arg(long, value_name = "HASH")]
    algorithm: Option<OtpAlgorithm>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.debug);
    run(cli)
}

fn run(cli: Cli) -> Result<()> {
    let db_path = config::resolve_db_path(cli.db)?;
    tracing::debug!(db = %db_path.display(), ring = %cli.ring, "using key store");

    let mut meta = SqliteMetadataStore::open(&db_path)
        .with_context(|| format!("cannot open key database {}", db_path.display()))?;
    let mut secrets = KeyringSecretStore::new(cli.ring);

    let stdin = io::stdin();
    let mut input = stdin.lock();
    let stdout = io::stdout();
    let mut out = stdout.lock();
    let password_env = cli.password_env.as_deref();

    match cli.command {
        Command::Add(args) => commands::add(&mut meta, &mut secrets, &mut input, &mut out, &args),
        Command::Generate { name, verbose } => commands::generate(
            &mut meta,
            &secrets,
            &mut out,
            &name,
            verbose,
            SystemTime::now(),
        ),
        Command::List { verbose } => commands::list(&meta, &mut out, verbose),
        Command::Remove { name } => commands::remove(&mut meta, &mut secrets, &mut out, &name),
        Command::Rename { old, new } => {
            commands::rename(&mut meta, &mut secrets, &mut out, &old, &new)
        }
        Command::Dump { name } => commands::dump(&meta, &mut out, name.as_deref()),
        Command::Backup => {
            let password = config::read_password(password_env, &mut input)?;
            commands::backup(&meta, &secrets, &mut out, password)
        }
        Command::Restore { format, file } => commands::restore(
            &mut meta,
            &mut secrets,
            &mut input,
            &mut out,
            &format,
            file.as_deref(),
            password_env,
        ),
    }?;

    out.flush().context("cannot write to stdout")
}
