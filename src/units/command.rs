//! Command-backed service instance
//!
//! `ExecStart=` runs as a long-lived child process. The other actions run
//! their helper command when one is configured, otherwise they signal the
//! child directly.

use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use super::parser::{parse_command, ParseError};
use super::{CommandUnit, DEFAULT_TIMEOUT_STOP};

const STOP_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// A command line split into program and arguments
#[derive(Debug, Clone, PartialEq)]
struct Argv {
    program: String,
    args: Vec<String>,
}

impl Argv {
    fn parse(raw: &str, service_name: &str) -> Result<Self, ParseError> {
        let mut parts = parse_command(&substitute_specifiers(raw, service_name))?.into_iter();
        let program = parts
            .next()
            .ok_or_else(|| ParseError::InvalidQuoting(raw.to_string()))?;
        Ok(Self {
            program,
            args: parts.collect(),
        })
    }

    fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Substitute `%n` (service name) and `%%` in a command line
pub fn substitute_specifiers(s: &str, service_name: &str) -> String {
    s.replace("%%", "\0").replace("%n", service_name).replace('\0', "%")
}

/// The running side of a [`CommandUnit`]
///
/// A main process that exits on its own is only noticed by the next action,
/// so the coordinator keeps reporting the service as started until then.
/// Dropping the service kills and reaps a main process that is still running.
#[derive(Debug)]
pub struct CommandService {
    name: String,
    timeout_stop: Duration,
    start: Argv,
    stop: Option<Argv>,
    pause: Option<Argv>,
    resume: Option<Argv>,
    environment: Vec<(String, String)>,
    child: Option<Child>,
}

impl CommandService {
    /// Validate a unit's command lines and build the instance
    pub fn from_unit(unit: &CommandUnit) -> Result<Self, CommandError> {
        let exec_start = unit
            .exec_start
            .as_deref()
            .ok_or_else(|| CommandError::NoExecStart(unit.name.clone()))?;

        let optional = |raw: &Option<String>| -> Result<Option<Argv>, CommandError> {
            raw.as_deref()
                .map(|r| Argv::parse(r, &unit.name))
                .transpose()
                .map_err(CommandError::from)
        };

        Ok(Self {
            name: unit.name.clone(),
            timeout_stop: unit.timeout_stop.unwrap_or(DEFAULT_TIMEOUT_STOP),
            start: Argv::parse(exec_start, &unit.name)?,
            stop: optional(&unit.exec_stop)?,
            pause: optional(&unit.exec_pause)?,
            resume: optional(&unit.exec_continue)?,
            environment: unit.environment.clone(),
            child: None,
        })
    }

    /// PID of the main process, if it is running
    pub fn pid(&self) -> Option<u32> {
        self.child.as_ref().map(Child::id)
    }

    pub fn start(&mut self) -> Result<(), CommandError> {
        if let Some(pid) = self.reap() {
            return Err(CommandError::AlreadyRunning(self.name.clone(), pid));
        }

        let child = self
            .command(&self.start)
            .stdin(Stdio::null())
            .spawn()
            .map_err(|e| CommandError::Spawn(self.start.display(), e))?;

        log::info!("Started {} (PID {})", self.name, child.id());
        self.child = Some(child);
        Ok(())
    }

    pub fn stop(&mut self) -> Result<(), CommandError> {
        if let Some(stop) = &self.stop {
            self.run(stop)?;
        }

        // The child stays owned until reaped so an early error leaves it to Drop
        let Some(child) = self.child.as_mut() else {
            return Ok(());
        };

        let status = match child.try_wait()? {
            Some(status) => status,
            None => {
                let pid = child.id();
                log::debug!("Sending SIGTERM to {} (PID {})", self.name, pid);
                send_signal(pid, libc::SIGTERM)?;
                // A paused process only acts on SIGTERM once continued
                send_signal(pid, libc::SIGCONT)?;

                match wait_timeout(child, self.timeout_stop)? {
                    Some(status) => status,
                    None => {
                        log::warn!("Timeout stopping {}, sending SIGKILL", self.name);
                        child.kill()?;
                        child.wait()?
                    }
                }
            }
        };

        self.child = None;
        log::info!("Stopped {} ({})", self.name, status);
        Ok(())
    }

    pub fn pause(&mut self) -> Result<(), CommandError> {
        match &self.pause {
            Some(pause) => self.run(pause),
            None => self.signal_child(libc::SIGSTOP),
        }
    }

    pub fn resume(&mut self) -> Result<(), CommandError> {
        match &self.resume {
            Some(resume) => self.run(resume),
            None => self.signal_child(libc::SIGCONT),
        }
    }

    fn command(&self, argv: &Argv) -> Command {
        let mut cmd = Command::new(&argv.program);
        cmd.args(&argv.args).envs(self.environment.iter().cloned());
        if let Some(pid) = self.pid() {
            cmd.env("MAINPID", pid.to_string());
        }
        cmd
    }

    /// Run a helper command to completion
    fn run(&self, argv: &Argv) -> Result<(), CommandError> {
        log::debug!("{}: running {}", self.name, argv.display());
        let status = self
            .command(argv)
            .stdin(Stdio::null())
            .status()
            .map_err(|e| CommandError::Spawn(argv.display(), e))?;

        if !status.success() {
            return Err(CommandError::Failed(argv.display(), status));
        }
        Ok(())
    }

    fn signal_child(&mut self, signal: libc::c_int) -> Result<(), CommandError> {
        let pid = self
            .reap()
            .ok_or_else(|| CommandError::NotRunning(self.name.clone()))?;
        send_signal(pid, signal)
    }

    /// Forget the child if it has exited; returns its PID if still running
    fn reap(&mut self) -> Option<u32> {
        let child = self.child.as_mut()?;
        match child.try_wait() {
            Ok(None) => Some(child.id()),
            Ok(Some(status)) => {
                log::debug!("{} exited on its own ({})", self.name, status);
                self.child = None;
                None
            }
            Err(e) => {
                log::warn!("Failed to poll {}: {}", self.name, e);
                Some(child.id())
            }
        }
    }
}

impl Drop for CommandService {
    fn drop(&mut self) {
        let Some(mut child) = self.child.take() else {
            return;
        };
        if let Ok(None) = child.try_wait() {
            log::warn!("Killing {} (PID {}) on drop", self.name, child.id());
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}

/// Poll `child` until it exits or `timeout` passes
fn wait_timeout(child: &mut Child, timeout: Duration) -> std::io::Result<Option<ExitStatus>> {
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        let now = Instant::now();
        if now >= deadline {
            return Ok(None);
        }
        thread::sleep(STOP_POLL_INTERVAL.min(deadline - now));
    }
}

fn send_signal(pid: u32, signal: libc::c_int) -> Result<(), CommandError> {
    let rc = unsafe { libc::kill(pid as libc::pid_t, signal) };
    if rc != 0 {
        return Err(CommandError::Io(std::io::Error::last_os_error()));
    }
    Ok(())
}

#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("Service {0} has no ExecStart")]
    NoExecStart(String),

    #[error("Invalid command: {0}")]
    InvalidCommand(#[from] ParseError),

    #[error("Failed to spawn {0}: {1}")]
    Spawn(String, std::io::Error),

    #[error("Command {0} failed: {1}")]
    Failed(String, ExitStatus),

    #[error("Service {0} is already running (PID {1})")]
    AlreadyRunning(String, u32),

    #[error("Service {0} has no running process")]
    NotRunning(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit(start: &str) -> CommandUnit {
        CommandUnit {
            exec_start: Some(start.to_string()),
            ..CommandUnit::new("test")
        }
    }

    #[test]
    fn test_substitute_specifiers() {
        assert_eq!(substitute_specifiers("/bin/echo %n", "web"), "/bin/echo web");
        assert_eq!(substitute_specifiers("/bin/echo 100%%", "web"), "/bin/echo 100%");
        assert_eq!(substitute_specifiers("%%n", "web"), "%n");
    }

    #[test]
    fn test_from_unit_splits_commands() {
        let mut u = unit(r#"/bin/sh -c "echo %n""#);
        u.exec_stop = Some("/bin/true".into());
        let svc = CommandService::from_unit(&u).unwrap();

        assert_eq!(svc.start.program, "/bin/sh");
        assert_eq!(svc.start.args, vec!["-c", "echo test"]);
        assert_eq!(svc.stop.as_ref().map(|a| a.program.as_str()), Some("/bin/true"));
        assert!(svc.pause.is_none());
        assert!(svc.pid().is_none());
    }

    #[test]
    fn test_from_unit_requires_exec_start() {
        let err = CommandService::from_unit(&CommandUnit::new("bare")).unwrap_err();
        assert!(matches!(err, CommandError::NoExecStart(_)));
    }

    #[test]
    fn test_from_unit_rejects_bad_quoting() {
        let err = CommandService::from_unit(&unit(r#"/bin/echo "oops"#)).unwrap_err();
        assert!(matches!(err, CommandError::InvalidCommand(_)));
    }

    #[test]
    fn test_start_and_stop_process() {
        let mut svc = CommandService::from_unit(&unit("/bin/sleep 60")).unwrap();
        svc.start().unwrap();
        assert!(svc.pid().is_some());

        svc.stop().unwrap();
        assert!(svc.pid().is_none());
    }

    #[test]
    fn test_pause_without_process() {
        let mut svc = CommandService::from_unit(&unit("/bin/sleep 60")).unwrap();
        let err = svc.pause().unwrap_err();
        assert!(matches!(err, CommandError::NotRunning(_)));
    }

    fn is_alive(pid: u32) -> bool {
        unsafe { libc::kill(pid as libc::pid_t, 0) == 0 }
    }

    #[test]
    fn test_stop_kills_after_timeout() {
        let mut u = unit(r#"/bin/sh -c "trap '' TERM; while true; do sleep 1; done""#);
        u.timeout_stop = Some(Duration::from_millis(300));
        let mut svc = CommandService::from_unit(&u).unwrap();

        svc.start().unwrap();
        let pid = svc.pid().unwrap();
        // Let the shell install its trap
        thread::sleep(Duration::from_millis(200));

        let started = Instant::now();
        svc.stop().unwrap();
        assert!(started.elapsed() < Duration::from_secs(5));
        assert!(svc.pid().is_none());
        assert!(!is_alive(pid));
    }

    #[test]
    fn test_drop_kills_running_process() {
        let mut svc = CommandService::from_unit(&unit("/bin/sleep 60")).unwrap();
        svc.start().unwrap();
        let pid = svc.pid().unwrap();
        assert!(is_alive(pid));

        drop(svc);
        assert!(!is_alive(pid));
    }

    #[test]
    fn test_stop_after_process_exited() {
        let mut svc = CommandService::from_unit(&unit("/bin/true")).unwrap();
        svc.start().unwrap();
        thread::sleep(Duration::from_millis(200));

        svc.stop().unwrap();
        assert!(svc.pid().is_none());
    }

    #[test]
    fn test_failing_helper_command() {
        let mut u = unit("/bin/sleep 60");
        u.exec_pause = Some("/bin/false".into());
        let mut svc = CommandService::from_unit(&u).unwrap();

        svc.start().unwrap();
        assert!(matches!(svc.pause(), Err(CommandError::Failed(..))));
        svc.stop().unwrap();
    }
}
