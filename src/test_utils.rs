use nix::{errno::Errno, sys::signal::Signal};
use std::{
    collections::HashMap,
    io,
    sync::{Mutex, MutexGuard, OnceLock},
};

use crate::process::{LaunchSpec, ProcessControl, ProcessDetails};

/// Global lock for environment variable modifications in tests.
/// All tests that modify environment variables should acquire this lock
/// to prevent race conditions between parallel test executions.
pub static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

pub fn env_lock() -> MutexGuard<'static, ()> {
    ENV_LOCK
        .get_or_init(|| Mutex::new(()))
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[derive(Debug, Default)]
struct FakeState {
    /// Live pids mapped to the signal that kills them (`None` = immortal).
    alive: HashMap<u32, Option<Signal>>,
    next_pid: u32,
    probes: usize,
    signals: Vec<(u32, Signal)>,
    spawned: Vec<LaunchSpec>,
    fail_spawns: bool,
    signal_error: Option<Errno>,
}

/// In-memory process table used to exercise lifecycle logic without real children.
///
/// Spawned processes die on the first SIGTERM.
#[derive(Debug, Default)]
pub struct FakeProcesses {
    state: Mutex<FakeState>,
}

impl FakeProcesses {
    fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn allocate(state: &mut FakeState) -> u32 {
        state.next_pid = state.next_pid.max(10_000) + 1;
        state.next_pid
    }

    /// Registers a live process that exits when it receives `dies_on`.
    pub fn add_live(&self, dies_on: Option<Signal>) -> u32 {
        let mut state = self.state();
        let pid = Self::allocate(&mut state);
        state.alive.insert(pid, dies_on);
        pid
    }

    /// Makes every subsequent spawn fail.
    pub fn fail_spawns(&self) {
        self.state().fail_spawns = true;
    }

    /// Makes every subsequent signal fail with `errno`.
    pub fn fail_signals(&self, errno: Errno) {
        self.state().signal_error = Some(errno);
    }

    pub fn probe_count(&self) -> usize {
        self.state().probes
    }

    pub fn signals(&self) -> Vec<(u32, Signal)> {
        self.state().signals.clone()
    }

    pub fn spawned(&self) -> Vec<LaunchSpec> {
        self.state().spawned.clone()
    }

    pub fn is_alive(&self, pid: u32) -> bool {
        self.state().alive.contains_key(&pid)
    }
}

impl ProcessControl for FakeProcesses {
    fn probe(&self, pid: u32) -> Result<bool, Errno> {
        let mut state = self.state();
        state.probes += 1;
        Ok(state.alive.contains_key(&pid))
    }

    fn signal(&self, pid: u32, signal: Signal) -> Result<(), Errno> {
        let mut state = self.state();
        state.signals.push((pid, signal));
        if let Some(errno) = state.signal_error {
            return Err(errno);
        }
        match state.alive.get(&pid) {
            None => Err(Errno::ESRCH),
            Some(dies_on) => {
                if *dies_on == Some(signal) {
                    state.alive.remove(&pid);
                }
                Ok(())
            }
        }
    }

    fn spawn_detached(&self, launch: &LaunchSpec) -> io::Result<u32> {
        let mut state = self.state();
        if state.fail_spawns {
            return Err(io::Error::new(io::ErrorKind::NotFound, "no such program"));
        }
        let pid = Self::allocate(&mut state);
        state.alive.insert(pid, Some(Signal::SIGTERM));
        state.spawned.push(launch.clone());
        Ok(pid)
    }

    fn describe(&self, pid: u32) -> Option<ProcessDetails> {
        self.state()
            .alive
            .contains_key(&pid)
            .then_some(ProcessDetails {
                started_at: None,
                memory_bytes: 4096,
            })
    }
}
