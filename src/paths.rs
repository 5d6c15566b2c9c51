//! XDG-compliant path resolution for libris.
//!
//! Provides `LibrisPaths` following the XDG Base Directory Specification:
//! config under `$XDG_CONFIG_HOME`, the default database under
//! `$XDG_DATA_HOME`, the server log under `$XDG_STATE_HOME`, and the PID
//! file under `$XDG_RUNTIME_DIR`.

use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

/// Errors from path resolution.
#[derive(Debug, Error, Diagnostic)]
pub enum PathError {
    #[error("cannot determine home directory")]
    #[diagnostic(
        code(libris::paths::no_home),
        help("Set the HOME environment variable or ensure a valid user profile exists.")
    )]
    NoHome,

    #[error("failed to create directory: {path}")]
    #[diagnostic(
        code(libris::paths::create_dir),
        help("Check that the parent directory exists and you have write permissions.")
    )]
    CreateDir {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

pub type PathResult<T> = std::result::Result<T, PathError>;

/// Global XDG-compliant directories for libris.
#[derive(Debug, Clone)]
pub struct LibrisPaths {
    /// `$XDG_CONFIG_HOME/libris/`
    pub config_dir: PathBuf,
    /// `$XDG_DATA_HOME/libris/`
    pub data_dir: PathBuf,
    /// `$XDG_STATE_HOME/libris/`
    pub state_dir: PathBuf,
    /// `$XDG_RUNTIME_DIR/libris/` (falls back to `state_dir/run/`)
    pub runtime_dir: PathBuf,
}

impl LibrisPaths {
    /// Resolve XDG directories from environment variables with standard fallbacks.
    pub fn resolve() -> PathResult<Self> {
        let home = std::env::var("HOME")
            .map(PathBuf::from)
            .map_err(|_| PathError::NoHome)?;

        let config_dir = std::env::var("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| home.join(".config"))
            .join("libris");

        let data_dir = std::env::var("XDG_DATA_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| home.join(".local/share"))
            .join("libris");

        let state_dir = std::env::var("XDG_STATE_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| home.join(".local/state"))
            .join("libris");

        let runtime_dir = std::env::var("XDG_RUNTIME_DIR")
            .map(|d| PathBuf::from(d).join("libris"))
            .unwrap_or_else(|_| state_dir.join("run"));

        Ok(Self {
            config_dir,
            data_dir,
            state_dir,
            runtime_dir,
        })
    }

    /// Create all base directories. Idempotent.
    pub fn ensure_dirs(&self) -> PathResult<()> {
        for dir in [
            &self.config_dir,
            &self.data_dir,
            &self.state_dir,
            &self.runtime_dir,
            &self.state_dir.join("logs"),
        ] {
            std::fs::create_dir_all(dir).map_err(|e| PathError::CreateDir {
                path: dir.display().to_string(),
                source: e,
            })?;
        }
        Ok(())
    }

    /// Path to the config file.
    pub fn config_file(&self) -> PathBuf {
        self.config_dir.join("config.toml")
    }

    /// Path to the server PID file.
    pub fn pid_file(&self) -> PathBuf {
        self.runtime_dir.join("librisd.pid")
    }

    /// Path to the server log file (used by `--daemon` and `server logs`).
    pub fn log_file(&self) -> PathBuf {
        self.state_dir.join("logs").join("librisd.log")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolved_dirs_are_namespaced() {
        let paths = LibrisPaths::resolve().unwrap();
        assert!(
            paths.config_dir.to_string_lossy().contains("libris"),
            "config_dir should contain 'libris': {}",
            paths.config_dir.display()
        );
        assert!(
            paths.data_dir.to_string_lossy().contains("libris"),
            "data_dir should contain 'libris': {}",
            paths.data_dir.display()
        );
    }

    #[test]
    fn files_derive_from_dirs() {
        let paths = LibrisPaths {
            config_dir: PathBuf::from("/cfg/libris"),
            data_dir: PathBuf::from("/data/libris"),
            state_dir: PathBuf::from("/state/libris"),
            runtime_dir: PathBuf::from("/run/libris"),
        };

        assert_eq!(paths.config_file(), PathBuf::from("/cfg/libris/config.toml"));
        assert_eq!(paths.pid_file(), PathBuf::from("/run/libris/librisd.pid"));
        assert_eq!(
            paths.log_file(),
            PathBuf::from("/state/libris/logs/librisd.log")
        );
    }

    #[test]
    fn ensure_dirs_is_idempotent() {
        let tmp = tempfile::TempDir::new().unwrap();
        let paths = LibrisPaths {
            config_dir: tmp.path().join("config"),
            data_dir: tmp.path().join("data"),
            state_dir: tmp.path().join("state"),
            runtime_dir: tmp.path().join("run"),
        };

        paths.ensure_dirs().unwrap();
        paths.ensure_dirs().unwrap();
        assert!(paths.config_dir.is_dir());
        assert!(paths.state_dir.join("logs").is_dir());
    }
}
