// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Shell process lifecycle management.

use std::process::{Child, ExitStatus};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::error::Result;

/// Handle to a running shell process. Kills the child when dropped.
pub struct ProcessHandle {
    child: Mutex<Child>,
    pid: u32,
    name: String,
    terminated: AtomicBool,
}

impl ProcessHandle {
    pub(crate) fn new(child: Child, name: &str) -> Self {
        Self {
            pid: child.id(),
            child: Mutex::new(child),
            name: name.to_string(),
            terminated: AtomicBool::new(false),
        }
    }

    /// OS process id of the child.
    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Check if the process is still running.
    pub fn is_running(&self) -> bool {
        self.child.lock().try_wait().ok().flatten().is_none()
    }

    /// Try to wait for the process without blocking.
    pub fn try_wait(&self) -> Result<Option<ExitStatus>> {
        Ok(self.child.lock().try_wait()?)
    }

    /// Ask the child to go away. Returns immediately and is safe to call
    /// more than once.
    pub fn terminate(&self) {
        if self.terminated.swap(true, Ordering::SeqCst) {
            return;
        }
        let mut child = self.child.lock();
        match child.try_wait() {
            Ok(Some(status)) => {
                tracing::debug!("[{}] Shell process already exited: {}", self.name, status);
            }
            _ => {
                tracing::info!("[{}] Terminating shell process (pid={})", self.name, self.pid);
                if let Err(e) = child.kill() {
                    tracing::warn!("[{}] Failed to kill shell process: {}", self.name, e);
                }
            }
        }
    }

    /// Wait up to `timeout` for the child to exit on its own, then kill it.
    pub fn shutdown(&self, timeout: Duration) -> Result<ExitStatus> {
        let start = Instant::now();

        while start.elapsed() < timeout {
            if let Some(status) = self.try_wait()? {
                tracing::info!("[{}] Shell process exited: {}", self.name, status);
                return Ok(status);
            }
            std::thread::sleep(Duration::from_millis(10));
        }

        tracing::warn!(
            "[{}] Shell process did not exit within {:?}, killing",
            self.name,
            timeout
        );
        self.terminate();
        Ok(self.child.lock().wait()?)
    }

    /// Give a dying child up to `timeout` to finish exiting.
    pub(crate) fn wait_for_exit(&self, timeout: Duration) -> Option<ExitStatus> {
        let start = Instant::now();
        while start.elapsed() < timeout {
            match self.try_wait() {
                Ok(Some(status)) => return Some(status),
                Ok(None) => std::thread::sleep(Duration::from_millis(10)),
                Err(_) => return None,
            }
        }
        None
    }
}

impl Drop for ProcessHandle {
    fn drop(&mut self) {
        let child = self.child.get_mut();
        if child.try_wait().ok().flatten().is_none() {
            tracing::debug!(
                "[{}] ProcessHandle dropped while shell process still running, killing",
                self.name
            );
            child.kill().ok();
        }
        // Reap so the child does not linger as a zombie.
        child.wait().ok();
    }
}
