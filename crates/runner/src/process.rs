//! Spawning and stopping job processes.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use tokio::process::{Child, Command};
use tracing::debug;

use super::adapter::Invocation;

/// Spawn an invocation with stdout and stderr both written to `log_path`.
///
/// The log file is truncated first. On unix the child is placed in its own
/// process group so that [`terminate`] reaches everything it started.
pub fn spawn_logged(invocation: &Invocation, log_path: &Path) -> std::io::Result<Child> {
    let log = std::fs::File::create(log_path)?;
    let log_err = log.try_clone()?;

    let mut cmd = Command::new(&invocation.program);
    cmd.args(&invocation.args)
        .current_dir(&invocation.working_dir)
        .stdin(Stdio::null())
        .stdout(Stdio::from(log))
        .stderr(Stdio::from(log_err))
        .kill_on_drop(true);

    #[cfg(unix)]
    cmd.process_group(0);

    let child = cmd.spawn()?;
    debug!("Spawned pid {:?}: {}", child.id(), invocation.command_line());
    Ok(child)
}

/// Ask a child to stop, escalating to a kill after `grace`.
///
/// On unix SIGTERM goes to the child's process group first; on other
/// platforms the child is killed immediately. The child is reaped before
/// returning.
pub async fn terminate(child: &mut Child, grace: Duration) -> std::io::Result<()> {
    if child.try_wait()?.is_some() {
        return Ok(());
    }

    #[cfg(unix)]
    if let Some(pid) = child.id() {
        use nix::sys::signal::{killpg, Signal};
        use nix::unistd::Pid;

        let _ = killpg(Pid::from_raw(pid as i32), Signal::SIGTERM);
        tokio::select! {
            result = child.wait() => return result.map(|_| ()),
            _ = tokio::time::sleep(grace) => {
                debug!("pid {} ignored SIGTERM for {:?}, killing", pid, grace);
                let _ = killpg(Pid::from_raw(pid as i32), Signal::SIGKILL);
            }
        }
    }

    #[cfg(not(unix))]
    let _ = grace;

    child.kill().await
}

/// Whether a process with this pid still exists.
///
/// On platforms without signal probing only the current process is known to
/// be alive.
pub fn process_alive(pid: u32) -> bool {
    if pid == std::process::id() {
        return true;
    }

    #[cfg(unix)]
    {
        use nix::errno::Errno;
        use nix::sys::signal::kill;
        use nix::unistd::Pid;

        // 0 and values past i32::MAX would address process groups
        if pid == 0 || pid > i32::MAX as u32 {
            return false;
        }
        match kill(Pid::from_raw(pid as i32), None) {
            Ok(()) | Err(Errno::EPERM) => true,
            Err(_) => false,
        }
    }

    #[cfg(not(unix))]
    {
        false
    }
}
