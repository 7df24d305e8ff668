//! Client certificate import.
//!
//! The webview's network stack reads client certificates from the user's NSS
//! database, so a configured PKCS#12 bundle is imported there with
//! `pk12util`. Failures are logged and never stop the shell.

use std::path::{Path, PathBuf};
use std::process::Command;

use crate::error::{Result, ShellError};

/// `~/.pki/nssdb`, the per-user NSS database.
pub fn nss_database_dir() -> Result<PathBuf> {
    let home = dirs::home_dir().ok_or(ShellError::NoUserDirectory("home"))?;
    Ok(home.join(".pki").join("nssdb"))
}

/// Imports the bundle at `path` into `database`, creating the database first
/// if it does not exist yet.
pub fn import_certificate(path: &Path, password: Option<&str>, database: &Path) -> Result<()> {
    if !path.is_file() {
        return Err(ShellError::Certificate(format!(
            "{} is not a file",
            path.display()
        )));
    }

    let database_arg = format!("sql:{}", database.display());

    if !database.join("cert9.db").exists() {
        std::fs::create_dir_all(database).map_err(|source| ShellError::Write {
            path: database.to_path_buf(),
            source,
        })?;
        run(Command::new("certutil").args(["-N", "--empty-password", "-d", database_arg.as_str()]))?;
    }

    let mut pk12util = Command::new("pk12util");
    pk12util.arg("-i").arg(path).args(["-d", database_arg.as_str()]);
    pk12util.args(["-W", password.unwrap_or("")]);
    run(&mut pk12util)
}

/// Runs the import and logs the outcome.
pub fn import_and_log(path: &Path, password: Option<&str>) {
    let result = nss_database_dir().and_then(|database| import_certificate(path, password, &database));
    match result {
        Ok(()) => log::info!("Loaded certificate: {}", path.display()),
        Err(e) => log::error!("Loading certificate {} failed: {e}", path.display()),
    }
}

fn run(command: &mut Command) -> Result<()> {
    let program = command.get_program().to_string_lossy().into_owned();
    let output = command
        .output()
        .map_err(|e| ShellError::Certificate(format!("failed to run {program}: {e}")))?;

    if output.status.success() {
        return Ok(());
    }

    Err(ShellError::Certificate(format!(
        "{program} exited with {}: {}",
        output.status,
        String::from_utf8_lossy(&output.stderr).trim()
    )))
}
