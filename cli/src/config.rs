//! Runtime configuration: database location and password source.

use std::env;
use std::fs;
use std::io::BufRead;
use std::path::PathBuf;

use anyhow::{Context, Result};

/// Directory under the user config dir that holds the database.
pub const APP_DIR: &str = "otpkeep";
/// Database file name inside [`APP_DIR`].
pub const DB_FILE: &str = "keys.db";

/// `<config_dir>/otpkeep/keys.db`.
pub fn default_db_path() -> Result<PathBuf> {
    dirs::config_dir()
        .map(|dir| dir.join(APP_DIR).join(DB_FILE))
        .context("cannot determine the user configuration directory; pass --db")
}

/// The explicit path if given, else the default. Parent directories are
/// created.
pub fn resolve_db_path(explicit: Option<PathBuf>) -> Result<PathBuf> {
    let path = match explicit {
        Some(path) => path,
        None => default_db_path()?,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("cannot create {}", parent.display()))?;
    }
    Ok(path)
}

/// Read the password from `env_var` when set, otherwise one line of `input`.
pub fn read_password(env_var: Option<&str>, input: &mut dyn BufRead) -> Result<String> {
    if let Some(var) = env_var {
        return env::var(var).with_context(|| format!("environment variable {var} is not set"));
    }

    eprint!("password: ");
    let mut line = String::new();
    input
        .read_line(&mut line)
        .context("cannot read password from stdin")?;
    let len = line.trim_end_matches(['\r', '\n']).len();
    line.truncate(len);
    Ok(line)
}
