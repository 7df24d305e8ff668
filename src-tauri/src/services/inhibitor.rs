//! OS-native screen lock inhibition.
//!
//! The inhibition is held by a helper process for as long as it runs:
//! `systemd-inhibit ... sleep infinity` on Linux, `caffeinate -d` on macOS.
//! Killing the helper releases the inhibition.

use std::process::{Child, Command, Stdio};

use crate::error::{Result, ShellError};

/// Opaque token for an active inhibition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InhibitionHandle(u32);

impl InhibitionHandle {
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    pub fn id(&self) -> u32 {
        self.0
    }
}

/// Backend that can hold off the OS screen lock.
pub trait ScreenLockInhibitor: Send {
    /// Starts an inhibition and returns its handle.
    fn acquire(&mut self) -> Result<InhibitionHandle>;

    /// Whether `handle` still refers to a live inhibition.
    fn is_active(&mut self, handle: InhibitionHandle) -> bool;

    fn release(&mut self, handle: InhibitionHandle);
}

/// Holds at most one inhibitor helper process.
#[derive(Default)]
pub struct ProcessInhibitor {
    child: Option<Child>,
}

impl ProcessInhibitor {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ScreenLockInhibitor for ProcessInhibitor {
    fn acquire(&mut self) -> Result<InhibitionHandle> {
        if let Some(child) = self.child.as_mut() {
            if matches!(child.try_wait(), Ok(None)) {
                return Ok(InhibitionHandle::new(child.id()));
            }
        }

        let child = inhibitor_command()?
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|e| ShellError::Inhibit(format!("failed to spawn inhibitor: {e}")))?;

        let handle = InhibitionHandle::new(child.id());
        log::info!("Screen lock inhibitor started (PID {})", handle.id());
        self.child = Some(child);
        Ok(handle)
    }

    fn is_active(&mut self, handle: InhibitionHandle) -> bool {
        match self.child.as_mut() {
            Some(child) if child.id() == handle.id() => matches!(child.try_wait(), Ok(None)),
            _ => false,
        }
    }

    fn release(&mut self, handle: InhibitionHandle) {
        let Some(mut child) = self.child.take() else {
            return;
        };
        if child.id() != handle.id() {
            self.child = Some(child);
            return;
        }

        log::info!("Stopping screen lock inhibitor (PID {})", handle.id());
        terminate(&mut child);
    }
}

impl Drop for ProcessInhibitor {
    fn drop(&mut self) {
        if let Some(mut child) = self.child.take() {
            terminate(&mut child);
        }
    }
}

fn terminate(child: &mut Child) {
    #[cfg(unix)]
    {
        // SIGTERM lets systemd-inhibit drop its lock cleanly.
        unsafe {
            libc::kill(child.id() as i32, libc::SIGTERM);
        }
    }

    #[cfg(not(unix))]
    {
        let _ = child.kill();
    }

    if let Err(e) = child.wait() {
        log::warn!("Failed to reap inhibitor process: {e}");
    }
}

#[cfg(target_os = "linux")]
fn inhibitor_command() -> Result<Command> {
    use std::os::unix::process::CommandExt;

    let mut command = Command::new("systemd-inhibit");
    command.args([
        "--what=idle",
        "--who=teams-shell",
        "--why=Call in progress",
        "--mode=block",
        "sleep",
        "infinity",
    ]);
    // Take the helper down with us if the shell dies without cleaning up.
    unsafe {
        command.pre_exec(|| {
            libc::prctl(libc::PR_SET_PDEATHSIG, libc::SIGTERM);
            Ok(())
        });
    }
    Ok(command)
}

#[cfg(target_os = "macos")]
fn inhibitor_command() -> Result<Command> {
    let mut command = Command::new("caffeinate");
    command
        .arg("-d")
        .arg("-w")
        .arg(std::process::id().to_string());
    Ok(command)
}

#[cfg(not(any(target_os = "linux", target_os = "macos")))]
fn inhibitor_command() -> Result<Command> {
    Err(ShellError::Inhibit(
        "no screen lock inhibitor on this platform".to_string(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn release_without_child_is_a_no_op() {
        let mut inhibitor = ProcessInhibitor::new();
        inhibitor.release(InhibitionHandle::new(42));
        assert!(!inhibitor.is_active(InhibitionHandle::new(42)));
    }

    #[cfg(unix)]
    #[test]
    fn tracks_and_terminates_a_helper_process() {
        let child = Command::new("sleep").arg("30").spawn().unwrap();
        let handle = InhibitionHandle::new(child.id());
        let mut inhibitor = ProcessInhibitor { child: Some(child) };

        assert!(inhibitor.is_active(handle));
        assert!(!inhibitor.is_active(InhibitionHandle::new(handle.id().wrapping_add(1))));

        inhibitor.release(handle);
        assert!(!inhibitor.is_active(handle));
        assert!(inhibitor.child.is_none());
    }
}
