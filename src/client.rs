//! Server discovery and lifecycle control for `librisd`.
//!
//! Book commands work on the catalog database directly; this module only
//! deals with the companion HTTP server process. It finds a running
//! instance via its PID file, spawns and signals the daemon, and tails
//! its log for `libris server logs`.

use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::time::Duration;

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::paths::LibrisPaths;

// ---------------------------------------------------------------------------
// Server discovery
// ---------------------------------------------------------------------------

/// Information about a running librisd instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerInfo {
    pub pid: u32,
    pub port: u16,
    pub bind: String,
}

impl ServerInfo {
    /// Base URL for HTTP requests.
    pub fn base_url(&self) -> String {
        let host = if self.bind == "0.0.0.0" {
            "127.0.0.1"
        } else {
            &self.bind
        };
        format!("http://{host}:{}", self.port)
    }
}

/// Reported state of the managed server process.
#[derive(Debug)]
pub enum ServerState {
    /// No PID file, or the recorded process is gone.
    Stopped,
    /// Process exists but `/api/health` did not answer.
    Unresponsive(ServerInfo),
    /// Process exists and `/api/health` answered 200.
    Running(ServerInfo),
}

/// Inspect the PID file and the process behind it.
///
/// Stale PID files (process gone) are removed as a side effect.
pub fn server_state(paths: &LibrisPaths) -> ServerState {
    let Some(info) = read_pid_file(paths) else {
        return ServerState::Stopped;
    };

    if !process_alive(info.pid) {
        // Stale PID file — clean up.
        let _ = std::fs::remove_file(paths.pid_file());
        return ServerState::Stopped;
    }

    if health_check(&info) {
        ServerState::Running(info)
    } else {
        ServerState::Unresponsive(info)
    }
}

/// Discover a running librisd server via its PID file.
///
/// Returns `Some(ServerInfo)` when:
/// 1. The PID file exists and parses correctly
/// 2. The process is still alive (`kill(pid, 0)` succeeds)
/// 3. The server responds to `GET /api/health`
pub fn discover_server(paths: &LibrisPaths) -> Option<ServerInfo> {
    match server_state(paths) {
        ServerState::Running(info) => Some(info),
        _ => None,
    }
}

/// Write a PID file for the current librisd process.
pub fn write_pid_file(paths: &LibrisPaths, port: u16, bind: &str) -> std::io::Result<()> {
    let info = ServerInfo {
        pid: std::process::id(),
        port,
        bind: bind.to_string(),
    };
    let json = serde_json::to_string_pretty(&info).expect("ServerInfo is always serializable");
    std::fs::write(paths.pid_file(), json)
}

/// Remove the PID file on shutdown.
pub fn remove_pid_file(paths: &LibrisPaths) {
    let _ = std::fs::remove_file(paths.pid_file());
}

fn read_pid_file(paths: &LibrisPaths) -> Option<ServerInfo> {
    let contents = std::fs::read_to_string(paths.pid_file()).ok()?;
    serde_json::from_str(&contents).ok()
}

fn health_check(info: &ServerInfo) -> bool {
    let url = format!("{}/api/health", info.base_url());
    match ureq::get(&url).timeout(Duration::from_secs(2)).call() {
        Ok(resp) => resp.status() == 200,
        Err(_) => false,
    }
}

#[cfg(unix)]
fn process_alive(pid: u32) -> bool {
    // SAFETY: kill with signal 0 doesn't actually send a signal;
    // it only checks whether the process exists.
    unsafe { libc::kill(pid as libc::pid_t, 0) == 0 }
}

#[cfg(not(unix))]
fn process_alive(_pid: u32) -> bool {
    // On non-unix, fall back to trusting the PID file.
    true
}

// ---------------------------------------------------------------------------
// Client error
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum ClientError {
    #[error("librisd is already running (pid {pid})")]
    #[diagnostic(
        code(libris::client::already_running),
        help("Use `libris server restart` to replace it")
    )]
    AlreadyRunning { pid: u32 },

    #[error("librisd is not running")]
    #[diagnostic(
        code(libris::client::not_running),
        help("Start it with `libris server start`")
    )]
    NotRunning,

    #[error("failed to spawn librisd: {message}")]
    #[diagnostic(
        code(libris::client::spawn),
        help("Is the librisd binary installed next to libris?")
    )]
    Spawn { message: String },

    #[error("failed to signal librisd (pid {pid})")]
    #[diagnostic(code(libris::client::signal))]
    Signal { pid: u32 },

    #[error("librisd did not exit within {timeout_secs}s")]
    #[diagnostic(
        code(libris::client::slow_exit),
        help("Check `libris server logs` for a wedged shutdown")
    )]
    SlowExit { timeout_secs: u64 },

    #[error("no log file at {path}")]
    #[diagnostic(
        code(libris::client::no_logs),
        help("The server only writes a log file when started with --daemon")
    )]
    NoLogs { path: String },

    #[error("failed to access {path}: {message}")]
    #[diagnostic(code(libris::client::io))]
    Io { path: String, message: String },
}

pub type ClientResult<T> = Result<T, ClientError>;

// ---------------------------------------------------------------------------
// Lifecycle control
// ---------------------------------------------------------------------------

/// Result of a daemonised start.
#[derive(Debug)]
pub enum StartOutcome {
    /// Server confirmed healthy at this address.
    Ready(ServerInfo),
    /// Process spawned but did not confirm health within the grace period.
    Pending { pid: u32 },
}

/// Locate the librisd binary: prefer a sibling of the current executable,
/// fall back to `$PATH`.
fn librisd_binary() -> PathBuf {
    if let Ok(exe) = std::env::current_exe() {
        let sibling = exe.with_file_name("librisd");
        if sibling.exists() {
            return sibling;
        }
    }
    PathBuf::from("librisd")
}

fn spawn_command(port: Option<u16>) -> Command {
    let mut cmd = Command::new(librisd_binary());
    if let Some(port) = port {
        cmd.env("LIBRIS_PORT", port.to_string());
    }
    cmd
}

/// Run librisd in the foreground, inheriting the terminal.
///
/// Blocks until the server exits and returns its exit code.
pub fn start_foreground(paths: &LibrisPaths, port: Option<u16>) -> ClientResult<i32> {
    if let Some(info) = discover_server(paths) {
        return Err(ClientError::AlreadyRunning { pid: info.pid });
    }

    let mut child = spawn_command(port).spawn().map_err(|e| ClientError::Spawn {
        message: e.to_string(),
    })?;
    let status = child.wait().map_err(|e| ClientError::Spawn {
        message: e.to_string(),
    })?;
    Ok(status.code().unwrap_or(0))
}

/// Spawn librisd detached, with stdout/stderr appended to the log file.
///
/// Polls the health endpoint for a few seconds so the caller can report
/// whether the server actually came up.
pub fn start_daemon(paths: &LibrisPaths, port: Option<u16>) -> ClientResult<StartOutcome> {
    if let Some(info) = discover_server(paths) {
        return Err(ClientError::AlreadyRunning { pid: info.pid });
    }

    let log_path = paths.log_file();
    let log = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .map_err(|e| ClientError::Io {
            path: log_path.display().to_string(),
            message: e.to_string(),
        })?;
    let log_err = log.try_clone().map_err(|e| ClientError::Io {
        path: log_path.display().to_string(),
        message: e.to_string(),
    })?;

    let child = spawn_command(port)
        .stdin(Stdio::null())
        .stdout(Stdio::from(log))
        .stderr(Stdio::from(log_err))
        .spawn()
        .map_err(|e| ClientError::Spawn {
            message: e.to_string(),
        })?;
    let pid = child.id();

    // Give the server a moment to bind and write its PID file.
    let deadline = std::time::Instant::now() + Duration::from_secs(5);
    while std::time::Instant::now() < deadline {
        if let Some(info) = discover_server(paths) {
            return Ok(StartOutcome::Ready(info));
        }
        std::thread::sleep(Duration::from_millis(250));
    }
    Ok(StartOutcome::Pending { pid })
}

/// Ask a running librisd to shut down (SIGTERM).
///
/// Returns the info of the server that was signalled. The server removes
/// its own PID file as part of graceful shutdown.
pub fn stop_server(paths: &LibrisPaths) -> ClientResult<ServerInfo> {
    let info = read_pid_file(paths).ok_or(ClientError::NotRunning)?;
    if !process_alive(info.pid) {
        let _ = std::fs::remove_file(paths.pid_file());
        return Err(ClientError::NotRunning);
    }
    terminate(info.pid)?;
    Ok(info)
}

#[cfg(unix)]
fn terminate(pid: u32) -> ClientResult<()> {
    // SAFETY: plain kill(2); the pid was checked alive just before.
    let rc = unsafe { libc::kill(pid as libc::pid_t, libc::SIGTERM) };
    if rc == 0 {
        Ok(())
    } else {
        Err(ClientError::Signal { pid })
    }
}

#[cfg(not(unix))]
fn terminate(pid: u32) -> ClientResult<()> {
    // No portable kill on non-unix targets.
    Err(ClientError::Signal { pid })
}

/// Wait for a process to disappear, polling every 100ms.
pub fn wait_for_exit(pid: u32, timeout: Duration) -> bool {
    let deadline = std::time::Instant::now() + timeout;
    while std::time::Instant::now() < deadline {
        if !process_alive(pid) {
            return true;
        }
        std::thread::sleep(Duration::from_millis(100));
    }
    !process_alive(pid)
}

/// Stop a running server (if any) and start a fresh daemonised one.
pub fn restart_server(paths: &LibrisPaths, port: Option<u16>) -> ClientResult<StartOutcome> {
    match stop_server(paths) {
        Ok(info) => {
            if !wait_for_exit(info.pid, Duration::from_secs(5)) {
                return Err(ClientError::SlowExit { timeout_secs: 5 });
            }
        }
        // Nothing to stop; go straight to starting.
        Err(ClientError::NotRunning) => {}
        Err(e) => return Err(e),
    }
    start_daemon(paths, port)
}

/// Return the last `lines` lines of the daemon log.
pub fn tail_log(paths: &LibrisPaths, lines: usize) -> ClientResult<Vec<String>> {
    let path = paths.log_file();
    if !path.exists() {
        return Err(ClientError::NoLogs {
            path: path.display().to_string(),
        });
    }
    let contents = std::fs::read_to_string(&path).map_err(|e| ClientError::Io {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;
    let all: Vec<&str> = contents.lines().collect();
    let start = all.len().saturating_sub(lines);
    Ok(all[start..].iter().map(|s| s.to_string()).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn temp_paths(root: &TempDir) -> LibrisPaths {
        LibrisPaths {
            config_dir: root.path().join("config"),
            data_dir: root.path().join("data"),
            state_dir: root.path().join("state"),
            runtime_dir: root.path().join("run"),
        }
    }

    #[test]
    fn base_url_rewrites_wildcard_bind() {
        let info = ServerInfo {
            pid: 1,
            port: 3000,
            bind: "0.0.0.0".into(),
        };
        assert_eq!(info.base_url(), "http://127.0.0.1:3000");

        let info = ServerInfo {
            pid: 1,
            port: 8080,
            bind: "192.168.1.10".into(),
        };
        assert_eq!(info.base_url(), "http://192.168.1.10:8080");
    }

    #[test]
    fn pid_file_roundtrip() {
        let root = TempDir::new().unwrap();
        let paths = temp_paths(&root);
        paths.ensure_dirs().unwrap();

        write_pid_file(&paths, 3000, "0.0.0.0").unwrap();
        let info = read_pid_file(&paths).unwrap();
        assert_eq!(info.pid, std::process::id());
        assert_eq!(info.port, 3000);
        assert_eq!(info.bind, "0.0.0.0");

        remove_pid_file(&paths);
        assert!(read_pid_file(&paths).is_none());
    }

    #[test]
    fn missing_pid_file_means_stopped() {
        let root = TempDir::new().unwrap();
        let paths = temp_paths(&root);
        paths.ensure_dirs().unwrap();

        assert!(matches!(server_state(&paths), ServerState::Stopped));
        assert!(discover_server(&paths).is_none());
    }

    #[test]
    fn tail_log_returns_last_lines() {
        let root = TempDir::new().unwrap();
        let paths = temp_paths(&root);
        paths.ensure_dirs().unwrap();

        std::fs::write(paths.log_file(), "one\ntwo\nthree\nfour\n").unwrap();
        assert_eq!(tail_log(&paths, 2).unwrap(), vec!["three", "four"]);
        // Asking for more lines than exist returns everything.
        assert_eq!(tail_log(&paths, 100).unwrap().len(), 4);
    }

    #[test]
    fn tail_log_without_file_is_an_error() {
        let root = TempDir::new().unwrap();
        let paths = temp_paths(&root);
        paths.ensure_dirs().unwrap();

        assert!(matches!(
            tail_log(&paths, 20),
            Err(ClientError::NoLogs { .. })
        ));
    }
}
