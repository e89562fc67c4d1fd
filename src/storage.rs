use std::fs;
use std::io::Write;
use std::path::{Component, Path, PathBuf};

use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};

pub const DATA_DIR: &str = ".secretsafe";
pub const CONFIG_FILE: &str = "config.json";

#[derive(Serialize, Deserialize)]
pub struct Config {
    pub data_dir: String,
}

pub fn default_base_dir() -> Result<PathBuf> {
    let home = dirs::home_dir().ok_or_else(|| anyhow!("Could not determine home directory"))?;
    Ok(home.join(DATA_DIR))
}

pub fn config_path() -> Result<PathBuf> {
    Ok(default_base_dir()?.join(CONFIG_FILE))
}

pub fn load_config() -> Result<Option<Config>> {
    let path = config_path()?;
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)?;
    let cfg: Config = serde_json::from_str(&raw)?;
    Ok(Some(cfg))
}

pub fn save_config(base_dir: &Path) -> Result<()> {
    let cfg = Config {
        data_dir: base_dir
            .to_str()
            .ok_or_else(|| anyhow!("Invalid data dir path"))?
            .to_string(),
    };
    if let Some(parent) = config_path()?.parent() {
        if !parent.exists() {
            fs::create_dir_all(parent)?;
            restrict_dir(parent)?;
        }
    }
    let data = serde_json::to_string_pretty(&cfg)?;
    let path = config_path()?;
    atomic_write(path.as_path(), data.as_bytes())?;
    restrict_file(path.as_path())?;
    Ok(())
}

/// The directory the backend works in: configured value if present and sane,
/// default otherwise. Created and tightened to owner-only on first use.
pub fn ensure_data_dir() -> Result<PathBuf> {
    let home = dirs::home_dir().ok_or_else(|| anyhow!("Could not determine home directory"))?;
    let dir = match load_config()? {
        Some(cfg) => resolve_dir_under_home(Path::new(&cfg.data_dir), &home)?,
        None => default_base_dir()?,
    };
    if !dir.exists() {
        fs::create_dir_all(&dir)?;
    }
    restrict_dir(&dir)?;
    Ok(dir)
}

/// Confine a configured directory to the user's home: no `..` components and
/// no symlink escape once canonicalized.
pub fn resolve_dir_under_home(raw: &Path, home: &Path) -> Result<PathBuf> {
    let candidate = if raw.is_absolute() {
        raw.to_path_buf()
    } else {
        home.join(raw)
    };

    if candidate
        .components()
        .any(|c| matches!(c, Component::ParentDir))
    {
        return Err(anyhow!("Path cannot contain '..' traversal components"));
    }
    if !candidate.starts_with(home) {
        return Err(anyhow!("Path must be inside {}", home.display()));
    }

    let home_real = fs::canonicalize(home).unwrap_or_else(|_| home.to_path_buf());
    if candidate.exists() {
        let candidate_real = fs::canonicalize(&candidate)?;
        if !candidate_real.starts_with(&home_real) {
            return Err(anyhow!("Path resolves outside {}", home.display()));
        }
    } else if let Some(parent) = candidate.parent() {
        if parent.exists() {
            let parent_real = fs::canonicalize(parent)?;
            if !parent_real.starts_with(&home_real) {
                return Err(anyhow!("Path parent resolves outside {}", home.display()));
            }
        }
    }
    Ok(candidate)
}

fn atomic_write(path: &Path, bytes: &[u8]) -> Result<()> {
    let parent = path.parent().ok_or_else(|| anyhow!("Invalid target path"))?;
    if !parent.exists() {
        fs::create_dir_all(parent)?;
        restrict_dir(parent)?;
    }

    let mut temp = tempfile::NamedTempFile::new_in(parent)?;
    temp.write_all(bytes)?;
    temp.flush()?;
    temp.as_file().sync_all()?;
    temp.persist(path)
        .map_err(|e| anyhow!("Atomic write failed: {}", e.error))?;
    Ok(())
}

fn restrict_file(path: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if path.exists() {
            let perms = fs::Permissions::from_mode(0o600);
            fs::set_permissions(path, perms)?;
        }
    }
    Ok(())
}

fn restrict_dir(path: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if path.exists() {
            let perms = fs::Permissions::from_mode(0o700);
            fs::set_permissions(path, perms)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_paths_resolve_under_home() {
        let home = tempfile::tempdir().expect("tempdir");
        let resolved =
            resolve_dir_under_home(Path::new("secrets"), home.path()).expect("inside home");
        assert_eq!(resolved, home.path().join("secrets"));
    }

    #[test]
    fn parent_traversal_is_rejected() {
        let home = tempfile::tempdir().expect("tempdir");
        let err = resolve_dir_under_home(Path::new("a/../../etc"), home.path())
            .expect_err("traversal escapes home");
        assert!(err.to_string().contains(".."));
    }

    #[test]
    fn absolute_paths_outside_home_are_rejected() {
        let home = tempfile::tempdir().expect("tempdir");
        let outside = tempfile::tempdir().expect("tempdir");
        assert!(resolve_dir_under_home(outside.path(), home.path()).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn symlink_escape_is_rejected() {
        let home = tempfile::tempdir().expect("tempdir");
        let outside = tempfile::tempdir().expect("tempdir");
        let link = home.path().join("sneaky");
        std::os::unix::fs::symlink(outside.path(), &link).expect("symlink");
        assert!(resolve_dir_under_home(&link, home.path()).is_err());
    }
}
