//! Process lifecycle management for managed components.
//!
//! Each component runs as a detached child whose pid is recorded in a plain-text PID
//! file. The cached pid is only a hint: every decision re-probes the OS first.
use chrono::{DateTime, Utc};
use nix::{
    errno::Errno,
    sys::signal::{self, Signal},
    unistd::Pid,
};
use serde::{Deserialize, Serialize};
use std::{
    fs::{self, OpenOptions},
    io::{self, ErrorKind},
    os::unix::process::CommandExt,
    path::{Path, PathBuf},
    process::{Command, Stdio},
    sync::Arc,
    thread,
    time::{Duration, Instant},
};
use sysinfo::{ProcessRefreshKind, ProcessesToUpdate, System};
use tracing::{debug, error, info, warn};

use crate::component::{Component, ComponentSpec};
use crate::config::{ProcessTiming, Settings};
use crate::constants::WAIT_POLL_INTERVAL;
use crate::error::NsmError;

/// Everything needed to launch a component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchSpec {
    /// Executable path.
    pub program: PathBuf,
    /// Arguments passed to the executable.
    pub args: Vec<String>,
    /// Extra environment variables.
    pub env: Vec<(String, String)>,
    /// Working directory, used when it exists.
    pub working_dir: PathBuf,
    /// File receiving stdout and stderr; discarded when `None`.
    pub log_file: Option<PathBuf>,
}

/// Runtime details of a live process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessDetails {
    /// When the process started.
    pub started_at: Option<DateTime<Utc>>,
    /// Resident memory in bytes.
    pub memory_bytes: u64,
}

/// OS operations the lifecycle manager relies on.
pub trait ProcessControl: Send + Sync {
    /// Returns whether `pid` refers to a live (non-zombie) process.
    fn probe(&self, pid: u32) -> Result<bool, Errno>;

    /// Delivers `signal` to `pid`.
    fn signal(&self, pid: u32, signal: Signal) -> Result<(), Errno>;

    /// Starts `launch` detached from the caller and returns the child pid.
    fn spawn_detached(&self, launch: &LaunchSpec) -> io::Result<u32>;

    /// Collects runtime details for `pid`.
    fn describe(&self, pid: u32) -> Option<ProcessDetails>;
}

/// [`ProcessControl`] backed by the real process table.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemProcesses;

impl SystemProcesses {
    fn to_pid(pid: u32) -> Option<Pid> {
        i32::try_from(pid).ok().filter(|raw| *raw > 0).map(Pid::from_raw)
    }

    #[cfg(target_os = "linux")]
    fn is_zombie(pid: u32) -> bool {
        let Ok(contents) = fs::read_to_string(format!("/proc/{pid}/stat")) else {
            return false;
        };
        // The state follows the parenthesised command name, which may contain spaces.
        contents
            .rsplit_once(')')
            .and_then(|(_, rest)| rest.trim_start().chars().next())
            .is_some_and(|state| matches!(state, 'Z' | 'X'))
    }

    #[cfg(not(target_os = "linux"))]
    fn is_zombie(_pid: u32) -> bool {
        false
    }
}

impl ProcessControl for SystemProcesses {
    fn probe(&self, pid: u32) -> Result<bool, Errno> {
        let Some(target) = Self::to_pid(pid) else {
            return Ok(false);
        };

        match signal::kill(target, None) {
            Ok(()) => Ok(!Self::is_zombie(pid)),
            Err(Errno::ESRCH) => Ok(false),
            Err(Errno::EPERM) => Ok(true),
            Err(err) => Err(err),
        }
    }

    fn signal(&self, pid: u32, sig: Signal) -> Result<(), Errno> {
        let target = Self::to_pid(pid).ok_or(Errno::ESRCH)?;
        signal::kill(target, Some(sig))
    }

    fn spawn_detached(&self, launch: &LaunchSpec) -> io::Result<u32> {
        let mut cmd = Command::new(&launch.program);
        cmd.args(&launch.args).stdin(Stdio::null());

        for (key, value) in &launch.env {
            cmd.env(key, value);
        }

        if launch.working_dir.is_dir() {
            cmd.current_dir(&launch.working_dir);
        }

        match &launch.log_file {
            Some(log_file) => {
                if let Some(parent) = log_file.parent() {
                    fs::create_dir_all(parent)?;
                }
                let out = OpenOptions::new().create(true).append(true).open(log_file)?;
                let err = out.try_clone()?;
                cmd.stdout(out).stderr(err);
            }
            None => {
                cmd.stdout(Stdio::null()).stderr(Stdio::null());
            }
        }

        unsafe {
            cmd.pre_exec(|| {
                // Own session: the component outlives the invoking shell.
                if libc::setsid() < 0 {
                    return Err(io::Error::last_os_error());
                }
                Ok(())
            });
        }

        debug!("Executing command: {cmd:?}");
        let mut child = cmd.spawn()?;
        let pid = child.id();

        // Reap the child if it exits while we are still around.
        thread::spawn(move || {
            let _ = child.wait();
        });

        Ok(pid)
    }

    fn describe(&self, pid: u32) -> Option<ProcessDetails> {
        let mut system = System::new();
        let target = sysinfo::Pid::from_u32(pid);
        system.refresh_processes_specifics(
            ProcessesToUpdate::Some(&[target]),
            true,
            ProcessRefreshKind::everything(),
        );

        system.process(target).map(|process| ProcessDetails {
            started_at: i64::try_from(process.start_time())
                .ok()
                .and_then(|secs| DateTime::from_timestamp(secs, 0)),
            memory_bytes: process.memory(),
        })
    }
}

/// Plain-text file holding a single process id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PidFile {
    path: PathBuf,
}

impl PidFile {
    /// Wraps the PID file at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Returns the PID file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the recorded pid. Missing or unparsable files mean "no known process".
    pub fn read(&self) -> Option<u32> {
        match fs::read_to_string(&self.path) {
            Ok(contents) => match contents.trim().parse::<u32>() {
                Ok(pid) => Some(pid),
                Err(err) => {
                    debug!("Ignoring unparsable PID file {}: {err}", self.path.display());
                    None
                }
            },
            Err(err) => {
                if err.kind() != ErrorKind::NotFound {
                    debug!("Failed to read PID file {}: {err}", self.path.display());
                }
                None
            }
        }
    }

    /// Records `pid`, creating the runtime directory if needed.
    pub fn write(&self, pid: u32) -> Result<(), NsmError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, format!("{pid}\n"))?;
        Ok(())
    }

    /// Deletes the PID file; a missing file is not an error.
    pub fn remove(&self) -> Result<(), NsmError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

/// Status of one component's process as reported to operators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessStatus {
    /// Whether a live process was found.
    pub running: bool,
    /// Pid of the live process.
    pub pid: Option<u32>,
    /// Process start time.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub started_at: Option<DateTime<Utc>>,
    /// Resident memory in bytes.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub memory_bytes: Option<u64>,
}

/// Result of [`ProcessManager::start`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    /// A new process was spawned.
    Started(u32),
    /// A live process was already recorded; nothing was spawned.
    AlreadyRunning(u32),
}

/// Result of [`ProcessManager::stop`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// No live process was found; no signal was sent.
    NotRunning,
    /// The process exited after `attempts` signals.
    Stopped {
        /// Signals delivered before the process was gone.
        attempts: u32,
    },
}

/// Starts, stops and inspects a single component process.
pub struct ProcessManager {
    component: Component,
    pid_file: PidFile,
    pid: Option<u32>,
    launch: LaunchSpec,
    timing: ProcessTiming,
    control: Arc<dyn ProcessControl>,
}

impl ProcessManager {
    /// Creates a manager, caching the pid currently recorded in `pid_file`.
    pub fn new(
        component: Component,
        pid_file: PidFile,
        launch: LaunchSpec,
        timing: ProcessTiming,
        control: Arc<dyn ProcessControl>,
    ) -> Self {
        let pid = pid_file.read();
        Self {
            component,
            pid_file,
            pid,
            launch,
            timing,
            control,
        }
    }

    /// Creates a manager for `spec` using the launch command and timings in `settings`.
    pub fn for_component(
        spec: &ComponentSpec,
        settings: &Settings,
        control: Arc<dyn ProcessControl>,
    ) -> Result<Self, NsmError> {
        let launch = spec.launch(settings.launch_override(spec.component))?;
        Ok(Self::new(
            spec.component,
            PidFile::new(&spec.pid_file),
            launch,
            settings.timing,
            control,
        ))
    }

    /// The cached pid.
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    fn probe(&self, pid: u32) -> Result<bool, NsmError> {
        self.control.probe(pid).map_err(|source| NsmError::Signal {
            component: self.component,
            pid,
            source,
        })
    }

    fn forget(&mut self) -> Result<(), NsmError> {
        self.pid = None;
        self.pid_file.remove()
    }

    /// Re-probes the cached pid.
    pub fn is_running(&self) -> Result<bool, NsmError> {
        match self.pid {
            Some(pid) => self.probe(pid),
            None => Ok(false),
        }
    }

    /// Polls until the cached process is gone or `timeout` elapses.
    ///
    /// Returns `true` once no live process remains.
    pub fn wait(&self, timeout: Duration) -> Result<bool, NsmError> {
        let Some(pid) = self.pid else {
            return Ok(true);
        };

        let deadline = Instant::now() + timeout;
        loop {
            if !self.probe(pid)? {
                return Ok(true);
            }

            let now = Instant::now();
            if now >= deadline {
                return Ok(false);
            }
            thread::sleep(WAIT_POLL_INTERVAL.min(deadline - now));
        }
    }

    /// Starts the component unless a live process is already recorded.
    ///
    /// Waits the start grace period first so a preceding stop can settle. Returns as
    /// soon as the child is spawned, without waiting for it to initialise.
    pub fn start(&mut self) -> Result<StartOutcome, NsmError> {
        let title = self.component.title();
        info!("Starting {title}");
        thread::sleep(self.timing.start_grace_period);

        if let Some(pid) = self.pid
            && self.probe(pid)?
        {
            warn!("{title} is already running on PID [{pid}]");
            return Ok(StartOutcome::AlreadyRunning(pid));
        }

        let pid = self.control.spawn_detached(&self.launch).map_err(|source| {
            error!("Failed to start {title}: {source}");
            NsmError::SpawnFailed {
                component: self.component,
                source,
            }
        })?;

        self.pid_file.write(pid)?;
        self.pid = Some(pid);
        info!("{title} started on PID [{pid}]");
        Ok(StartOutcome::Started(pid))
    }

    /// Stops the component with SIGTERM, escalating to SIGINT, for a bounded number of
    /// attempts.
    pub fn stop(&mut self) -> Result<StopOutcome, NsmError> {
        let title = self.component.title();
        let Some(pid) = self.pid else {
            info!("{title} is not running");
            return Ok(StopOutcome::NotRunning);
        };

        if !self.probe(pid)? {
            info!("{title} is not running (stale PID [{pid}])");
            self.forget()?;
            return Ok(StopOutcome::NotRunning);
        }

        let max_attempts = self.timing.stop_max_attempts;
        for attempt in 1..=max_attempts {
            let sig = if attempt > self.timing.interrupt_after {
                Signal::SIGINT
            } else {
                Signal::SIGTERM
            };
            info!("Attempting to stop {title} [{pid}] ({sig}, attempt {attempt})");

            match self.control.signal(pid, sig) {
                Ok(()) => {}
                Err(Errno::ESRCH) => {
                    debug!("{title} exited before {sig} could be delivered");
                    self.forget()?;
                    return Ok(StopOutcome::Stopped { attempts: attempt });
                }
                Err(source) => {
                    error!("An error occurred while attempting to stop {title}: {source}");
                    return Err(NsmError::Signal {
                        component: self.component,
                        pid,
                        source,
                    });
                }
            }

            if self.wait(self.timing.stop_poll_interval)? {
                info!("{title} stopped");
                self.forget()?;
                return Ok(StopOutcome::Stopped { attempts: attempt });
            }
        }

        error!("{title} [{pid}] did not terminate after {max_attempts} attempts");
        Err(NsmError::DidNotTerminate {
            component: self.component,
            pid,
            attempts: max_attempts,
        })
    }

    /// Reports whether the component is running, with process details when it is.
    pub fn status(&self) -> Result<ProcessStatus, NsmError> {
        let live_pid = match self.pid {
            Some(pid) if self.probe(pid)? => Some(pid),
            _ => None,
        };
        let details = live_pid.and_then(|pid| self.control.describe(pid));

        Ok(ProcessStatus {
            running: live_pid.is_some(),
            pid: live_pid,
            started_at: details.as_ref().and_then(|d| d.started_at),
            memory_bytes: details.map(|d| d.memory_bytes),
        })
    }
}
