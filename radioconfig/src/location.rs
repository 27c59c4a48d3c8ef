//! Where `config.yaml` lives

use anyhow::{bail, Result};
use std::{
    env, fs,
    path::{Path, PathBuf},
};
use tracing::debug;

pub(crate) const ENV_CONFIG_DIR: &str = "NEDERADIO_CONFIG";
pub(crate) const CONFIG_DIR_NAME: &str = ".nederadio";
pub(crate) const CONFIG_FILE_NAME: &str = "config.yaml";

/// Picks the configuration directory
///
/// First match wins: `explicit` (when not empty), `$NEDERADIO_CONFIG`, an
/// existing `./.nederadio`, an existing `~/.nederadio`. Falls back to
/// `./.nederadio`.
pub(crate) fn resolve(explicit: &str) -> PathBuf {
    if !explicit.is_empty() {
        return PathBuf::from(explicit);
    }
    if let Ok(from_env) = env::var(ENV_CONFIG_DIR) {
        debug!(env_var = ENV_CONFIG_DIR, dir = %from_env, "Config directory from environment");
        return PathBuf::from(from_env);
    }

    let local = PathBuf::from(CONFIG_DIR_NAME);
    let candidates = std::iter::once(local.clone())
        .chain(dirs::home_dir().map(|home| home.join(CONFIG_DIR_NAME)));
    for candidate in candidates {
        if candidate.is_dir() {
            return candidate;
        }
    }
    local
}

/// Creates `dir` when missing and checks that we can write into it
pub(crate) fn ensure_writable(dir: &Path) -> Result<()> {
    fs::create_dir_all(dir)?;
    if !dir.is_dir() {
        bail!("{} is not a directory", dir.display());
    }
    let probe = dir.join(".nederadio-probe");
    fs::write(&probe, b"")?;
    fs::remove_file(&probe)?;
    Ok(())
}
