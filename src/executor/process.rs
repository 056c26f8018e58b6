// Renderer process lifecycle: launch, bounded wait, process-tree kill.
use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tokio::process::Command;

use crate::error::PrintError;

#[cfg(windows)]
const CREATE_NO_WINDOW: u32 = 0x0800_0000;

/// Launch the renderer once and wait for it, bounded by `wait`.
///
/// On timeout the renderer and every process it spawned are killed and
/// `PrintError::PrintTimeout` is returned.
pub async fn run_renderer(program: &Path, args: &[String], wait: Duration) -> Result<(), PrintError> {
    let mut command = Command::new(program);
    command
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(true);
    // Own process group, so the whole tree can be signalled at once.
    #[cfg(unix)]
    command.process_group(0);
    #[cfg(windows)]
    command.creation_flags(CREATE_NO_WINDOW);

    let mut child = command.spawn().map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => PrintError::RendererNotFound,
        _ => PrintError::RendererSpawn(e),
    })?;
    let mut tree = ProcessTreeGuard::new(child.id());

    let waited: Option<std::io::Result<ExitStatus>> = tokio::select! {
        status = child.wait() => Some(status),
        _ = tokio::time::sleep(wait) => None,
    };

    match waited {
        Some(status) => {
            tree.disarm();
            classify_exit(status?)
        }
        None => {
            tracing::warn!(pid = ?tree.pid, wait_ms = wait.as_millis() as u64, "Renderer did not exit in time, killing process tree");
            tree.kill();
            // Reap the direct child; the group kill above already hit it.
            if let Err(e) = child.kill().await {
                tracing::debug!(error = %e, "Renderer already gone after tree kill");
            }
            Err(PrintError::PrintTimeout)
        }
    }
}

/// Kills the renderer's whole process tree when dropped while still armed,
/// e.g. when the job future is cancelled mid-print.
struct ProcessTreeGuard {
    pid: Option<u32>,
}

impl ProcessTreeGuard {
    fn new(pid: Option<u32>) -> Self {
        Self { pid }
    }

    fn disarm(&mut self) {
        self.pid = None;
    }

    fn kill(&mut self) {
        if let Some(pid) = self.pid.take() {
            kill_process_tree(pid);
        }
    }
}

impl Drop for ProcessTreeGuard {
    fn drop(&mut self) {
        if let Some(pid) = self.pid {
            tracing::warn!(pid, "Renderer abandoned mid-print, killing process tree");
        }
        self.kill();
    }
}

fn classify_exit(status: ExitStatus) -> Result<(), PrintError> {
    match status.code() {
        Some(0) => Ok(()),
        Some(code) => Err(PrintError::RendererExit(code)),
        None => Err(PrintError::RendererTerminated),
    }
}

/// Kill `pid` and all of its descendants.
#[cfg(unix)]
pub fn kill_process_tree(pid: u32) {
    use nix::errno::Errno;
    use nix::sys::signal::{Signal, killpg};
    use nix::unistd::Pid;

    #[allow(clippy::cast_possible_wrap)]
    let group = Pid::from_raw(pid as i32);
    match killpg(group, Signal::SIGKILL) {
        Ok(()) | Err(Errno::ESRCH) => {}
        Err(e) => tracing::warn!(pid, error = %e, "Failed to kill renderer process group"),
    }
}

/// Kill `pid` and all of its descendants.
#[cfg(windows)]
pub fn kill_process_tree(pid: u32) {
    use std::os::windows::process::CommandExt;

    let pid = pid.to_string();
    // Blocking, but taskkill returns quickly and the tree must be gone before
    // the direct child is reaped.
    let result = std::process::Command::new("taskkill")
        .args(["/PID", pid.as_str(), "/T", "/F"])
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .creation_flags(CREATE_NO_WINDOW)
        .status();
    if let Err(e) = result {
        tracing::warn!(pid = %pid, error = %e, "Failed to run taskkill");
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::time::Instant;

    fn sh(script: &str) -> (PathBuf, Vec<String>) {
        (PathBuf::from("/bin/sh"), vec!["-c".to_string(), script.to_string()])
    }

    #[cfg(target_os = "linux")]
    fn process_alive(pid: i32) -> bool {
        match std::fs::read_to_string(format!("/proc/{}/stat", pid)) {
            // A zombie waiting for its parent to reap it no longer runs.
            Ok(stat) => stat
                .rsplit_once(')')
                .map(|(_, rest)| !rest.trim_start().starts_with('Z'))
                .unwrap_or(false),
            Err(_) => false,
        }
    }

    #[tokio::test]
    async fn clean_exit_is_success() {
        let (program, args) = sh("exit 0");
        run_renderer(&program, &args, Duration::from_secs(5)).await.unwrap();
    }

    #[tokio::test]
    async fn non_zero_exit_is_classified() {
        let (program, args) = sh("exit 3");
        let err = run_renderer(&program, &args, Duration::from_secs(5)).await.unwrap_err();
        assert!(matches!(err, PrintError::RendererExit(3)));
        assert_eq!(err.to_string(), "renderer-exit-3");
    }

    #[tokio::test]
    async fn missing_program_is_renderer_not_found() {
        let err = run_renderer(Path::new("/nonexistent/renderer-12345"), &[], Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, PrintError::RendererNotFound));
    }

    #[tokio::test]
    async fn hung_renderer_times_out_quickly() {
        let (program, args) = sh("sleep 30");
        let started = Instant::now();
        let err = run_renderer(&program, &args, Duration::from_millis(200)).await.unwrap_err();
        assert!(matches!(err, PrintError::PrintTimeout));
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn timeout_kills_descendants() {
        let dir = tempfile::tempdir().unwrap();
        let pid_file = dir.path().join("helper.pid");
        let script = format!("sleep 30 & echo $! > '{}'; wait", pid_file.display());
        let (program, args) = sh(&script);

        let err = run_renderer(&program, &args, Duration::from_millis(500)).await.unwrap_err();
        assert!(matches!(err, PrintError::PrintTimeout));

        let helper: i32 = std::fs::read_to_string(&pid_file).unwrap().trim().parse().unwrap();
        let deadline = Instant::now() + Duration::from_secs(3);
        while process_alive(helper) && Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        assert!(!process_alive(helper), "helper process {} survived the tree kill", helper);
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn cancelled_run_kills_descendants() {
        let dir = tempfile::tempdir().unwrap();
        let pid_file = dir.path().join("helper.pid");
        let script = format!("sleep 30 & echo $! > '{}'; wait", pid_file.display());
        let (program, args) = sh(&script);

        let run = tokio::spawn(async move { run_renderer(&program, &args, Duration::from_secs(60)).await });
        let deadline = Instant::now() + Duration::from_secs(5);
        while !pid_file.exists() && Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
        run.abort();
        assert!(run.await.unwrap_err().is_cancelled());

        let helper: i32 = std::fs::read_to_string(&pid_file).unwrap().trim().parse().unwrap();
        let deadline = Instant::now() + Duration::from_secs(3);
        while process_alive(helper) && Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        assert!(!process_alive(helper), "helper process {} outlived the cancelled run", helper);
    }
}
