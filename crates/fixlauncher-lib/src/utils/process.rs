//! Spawning helpers shared by the Java probe, the Fabric installer run and
//! the game itself.

#[cfg(windows)]
const CREATE_NO_WINDOW: u32 = 0x0800_0000;
#[cfg(windows)]
const CREATE_NEW_PROCESS_GROUP: u32 = 0x0000_0200;

pub trait LauncherCommandExt {
    /// No console window for short-lived helper processes (Windows only).
    fn suppress_console(&mut self) -> &mut Self;

    /// Run the child in its own session / process group so closing the
    /// launcher does not take the game down with it.
    fn detach(&mut self) -> &mut Self;
}

impl LauncherCommandExt for tokio::process::Command {
    fn suppress_console(&mut self) -> &mut Self {
        #[cfg(windows)]
        self.creation_flags(CREATE_NO_WINDOW);
        self
    }

    fn detach(&mut self) -> &mut Self {
        #[cfg(windows)]
        self.creation_flags(CREATE_NEW_PROCESS_GROUP | CREATE_NO_WINDOW);
        #[cfg(unix)]
        // SAFETY: setsid is async-signal-safe and touches no parent state.
        unsafe {
            self.pre_exec(|| {
                libc::setsid();
                Ok(())
            });
        }
        self
    }
}

/// Whether a process with this PID is still alive.
pub fn is_pid_running(pid: u32) -> bool {
    use sysinfo::{Pid, ProcessesToUpdate, System};

    let mut system = System::new();
    let pid = Pid::from_u32(pid);
    system.refresh_processes(ProcessesToUpdate::Some(&[pid]), true);
    system.process(pid).is_some()
}
