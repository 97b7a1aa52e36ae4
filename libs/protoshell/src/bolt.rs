// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! A bolt that hands its tuples to a shell process.
//!
//! Three threads touch a running bolt:
//! - the host thread calling [`ShellBolt::execute`], which registers the
//!   tuple as in flight and queues it,
//! - the writer thread, the only owner of the child's stdin, which also
//!   drains stderr at least once per poll interval,
//! - the reader thread, the only owner of the child's stdout, which applies
//!   ack / fail / emit / error / log commands.
//!
//! Background failures never unwind on their own thread. The first one is
//! parked in a [`FatalSlot`] and returned by the next `execute`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::thread::JoinHandle;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};

use crate::collector::OutputCollector;
use crate::config::ShellConfig;
use crate::error::{Result, ShellError};
use crate::in_flight::InFlightTuples;
use crate::message::{EmitTarget, Emission, ShellMsg};
use crate::process::{ShellProcess, ShellReader, ShellWriter};
use crate::process_handle::ProcessHandle;
use crate::proto;
use crate::topology::{StormConf, TopologyContext, Tuple};

/// Frames queued for the writer thread.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum PendingWrite {
    Tuple(proto::TupleProto),
    TaskIds(proto::TaskIds),
}

/// First fatal error observed by a background thread. Set at most once.
#[derive(Default)]
pub(crate) struct FatalSlot {
    error: OnceLock<Arc<ShellError>>,
}

impl FatalSlot {
    /// Record `error` unless an earlier one is already parked.
    pub(crate) fn set(&self, name: &str, error: ShellError) {
        let error = Arc::new(error);
        match self.error.set(Arc::clone(&error)) {
            Ok(()) => tracing::error!("[{}] Shell bolt failed: {}", name, error),
            Err(_) => tracing::debug!("[{}] Ignoring follow-up failure: {}", name, error),
        }
    }

    pub(crate) fn get(&self) -> Option<Arc<ShellError>> {
        self.error.get().cloned()
    }

    pub(crate) fn check(&self) -> Result<()> {
        match self.get() {
            Some(error) => Err(ShellError::Fatal(error)),
            None => Ok(()),
        }
    }
}

/// Applies the child's commands. Runs on the reader thread.
pub(crate) struct BoltDispatcher {
    name: String,
    in_flight: Arc<InFlightTuples>,
    collector: Arc<dyn OutputCollector>,
    pending: Sender<PendingWrite>,
}

impl BoltDispatcher {
    pub(crate) fn dispatch(&self, msg: ShellMsg) -> Result<()> {
        match msg {
            ShellMsg::Ack { id } => {
                let tuple = self.in_flight.remove_acked(&id)?;
                self.collector.ack(&tuple);
            }
            ShellMsg::Fail { id } => {
                let tuple = self.in_flight.remove_failed(&id)?;
                self.collector.fail(&tuple);
            }
            ShellMsg::Error { msg } => {
                tracing::warn!("[{}] Shell process reported error: {}", self.name, msg);
                self.collector.report_error(&msg);
            }
            ShellMsg::Log { msg } => {
                tracing::info!("[{}] Shell msg: {}", self.name, msg);
            }
            ShellMsg::Emit(emission) => self.emit(emission)?,
            ShellMsg::Sync => {
                tracing::debug!("[{}] Ignoring sync sent to a bolt", self.name);
            }
        }
        Ok(())
    }

    fn emit(&self, emission: Emission) -> Result<()> {
        let anchors = self.in_flight.anchors(&emission.anchors)?;
        match emission.target {
            EmitTarget::Direct(task) => {
                self.collector
                    .emit_direct(task, &emission.stream, &anchors, emission.values);
            }
            EmitTarget::FanOut => {
                let task_ids = self
                    .collector
                    .emit(&emission.stream, &anchors, emission.values);
                if emission.need_task_ids {
                    self.pending
                        .send(PendingWrite::TaskIds(proto::TaskIds { task_ids }))
                        .map_err(|_| ShellError::NotRunning)?;
                }
            }
        }
        Ok(())
    }
}

struct RunningShell {
    pending: Sender<PendingWrite>,
    handle: ProcessHandle,
    shell_pid: i32,
    writer_thread: JoinHandle<()>,
    reader_thread: JoinHandle<()>,
}

/// Bolt whose tuples are processed by a child process.
pub struct ShellBolt {
    config: ShellConfig,
    name: String,
    in_flight: Arc<InFlightTuples>,
    fatal: Arc<FatalSlot>,
    running: Arc<AtomicBool>,
    shell: Option<RunningShell>,
}

impl ShellBolt {
    pub fn new(config: impl Into<ShellConfig>) -> Self {
        Self {
            config: config.into(),
            name: "shell-bolt".to_string(),
            in_flight: Arc::new(InFlightTuples::new()),
            fatal: Arc::new(FatalSlot::default()),
            running: Arc::new(AtomicBool::new(false)),
            shell: None,
        }
    }

    /// Launch the child, complete the handshake and start the reader and
    /// writer threads.
    pub fn prepare(
        &mut self,
        conf: &StormConf,
        context: &TopologyContext,
        collector: Arc<dyn OutputCollector>,
    ) -> Result<()> {
        if self.shell.is_some() {
            return Err(ShellError::Configuration(format!(
                "shell bolt '{}' is already prepared",
                self.name
            )));
        }
        self.config.validate()?;
        self.name = context.label();

        // Threads detached by an earlier cleanup still hold the old flag and
        // slot, so every run gets its own.
        self.running = Arc::new(AtomicBool::new(false));
        self.fatal = Arc::new(FatalSlot::default());
        self.in_flight = Arc::new(InFlightTuples::new());

        let process = ShellProcess::launch(&self.config.command, conf, context)?;
        let shell_pid = process.shell_pid();
        tracing::info!("[{}] Launched subprocess with pid {}", self.name, shell_pid);

        let (writer, reader, handle) = process.into_split();
        let (pending_tx, pending_rx) = match self.config.pending_write_capacity {
            Some(capacity) => crossbeam_channel::bounded(capacity),
            None => crossbeam_channel::unbounded(),
        };

        self.running.store(true, Ordering::SeqCst);

        let dispatcher = BoltDispatcher {
            name: self.name.clone(),
            in_flight: Arc::clone(&self.in_flight),
            collector,
            pending: pending_tx.clone(),
        };
        let reader_thread = match self.spawn_reader(reader, dispatcher) {
            Ok(thread) => thread,
            Err(e) => {
                self.running.store(false, Ordering::SeqCst);
                handle.terminate();
                return Err(e);
            }
        };
        let writer_thread = match self.spawn_writer(writer, pending_rx) {
            Ok(thread) => thread,
            Err(e) => {
                self.running.store(false, Ordering::SeqCst);
                handle.terminate();
                return Err(e);
            }
        };

        self.shell = Some(RunningShell {
            pending: pending_tx,
            handle,
            shell_pid,
            writer_thread,
            reader_thread,
        });
        Ok(())
    }

    fn spawn_reader(&self, mut reader: ShellReader, dispatcher: BoltDispatcher) -> Result<JoinHandle<()>> {
        let running = Arc::clone(&self.running);
        let fatal = Arc::clone(&self.fatal);
        let name = self.name.clone();

        let thread = std::thread::Builder::new()
            .name(format!("shell-reader-{}", name))
            .spawn(move || {
                tracing::debug!("[{}] Reader thread started", name);
                while running.load(Ordering::SeqCst) {
                    let result = reader
                        .read::<proto::EmissionProto>()
                        .and_then(ShellMsg::try_from)
                        .and_then(|msg| dispatcher.dispatch(msg));
                    if let Err(e) = result {
                        if running.load(Ordering::SeqCst) {
                            fatal.set(&name, e);
                        } else {
                            tracing::debug!("[{}] Reader stopped during shutdown: {}", name, e);
                        }
                        break;
                    }
                }
                tracing::debug!("[{}] Reader thread exiting", name);
            })?;
        Ok(thread)
    }

    fn spawn_writer(&self, mut writer: ShellWriter, pending: Receiver<PendingWrite>) -> Result<JoinHandle<()>> {
        let running = Arc::clone(&self.running);
        let fatal = Arc::clone(&self.fatal);
        let name = self.name.clone();
        let poll_interval = self.config.writer_poll_interval();

        let thread = std::thread::Builder::new()
            .name(format!("shell-writer-{}", name))
            .spawn(move || {
                tracing::debug!("[{}] Writer thread started", name);
                while running.load(Ordering::SeqCst) {
                    let written = match pending.recv_timeout(poll_interval) {
                        Ok(PendingWrite::Tuple(tuple)) => writer.write(&tuple),
                        Ok(PendingWrite::TaskIds(task_ids)) => writer.write(&task_ids),
                        Err(RecvTimeoutError::Timeout) => Ok(()),
                        Err(RecvTimeoutError::Disconnected) => break,
                    };
                    if let Err(e) = written {
                        if running.load(Ordering::SeqCst) {
                            fatal.set(&name, e);
                        }
                        break;
                    }
                    // Keeps the child from stalling on a full stderr pipe even
                    // when there is nothing to write.
                    writer.drain_error_stream();
                }
                writer.drain_error_stream();
                tracing::debug!("[{}] Writer thread exiting", name);
            })?;
        Ok(thread)
    }

    /// Hand `tuple` to the child.
    ///
    /// Fails with [`ShellError::Fatal`] once any background thread has
    /// failed; the bolt processes nothing after that. Blocks while a bounded
    /// pending-write queue is full.
    pub fn execute(&self, tuple: Tuple) -> Result<()> {
        self.fatal.check()?;
        let shell = self.shell.as_ref().ok_or(ShellError::NotRunning)?;

        let tuple = Arc::new(tuple);
        let id = self.in_flight.insert(Arc::clone(&tuple));
        let envelope = tuple.to_proto(&id);

        if shell.pending.send(PendingWrite::Tuple(envelope)).is_err() {
            self.in_flight.discard(&id);
            self.fatal.check()?;
            return Err(ShellError::NotRunning);
        }
        Ok(())
    }

    /// Stop both threads, kill the child and forget every in-flight tuple.
    pub fn cleanup(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(shell) = self.shell.take() {
            tracing::info!("[{}] Cleaning up shell bolt", self.name);
            shell.handle.terminate();
            drop(shell.pending);

            if shell.writer_thread.join().is_err() {
                tracing::error!("[{}] Writer thread panicked", self.name);
            }
            // The kill closes stdout, which normally unblocks the reader.
            // A grandchild holding the pipe open could keep it parked, so
            // only join it when it has already finished.
            if shell.reader_thread.is_finished() {
                if shell.reader_thread.join().is_err() {
                    tracing::error!("[{}] Reader thread panicked", self.name);
                }
            } else {
                tracing::debug!("[{}] Detaching reader thread", self.name);
            }
        }
        self.in_flight.clear();
    }

    /// True while prepared, not cleaned up and free of fatal errors.
    pub fn is_running(&self) -> bool {
        self.shell.is_some() && self.running.load(Ordering::SeqCst) && self.fatal.get().is_none()
    }

    /// Pid the child reported during the handshake.
    pub fn shell_pid(&self) -> Option<i32> {
        self.shell.as_ref().map(|shell| shell.shell_pid)
    }

    /// OS pid of the child.
    pub fn process_id(&self) -> Option<u32> {
        self.shell.as_ref().map(|shell| shell.handle.pid())
    }

    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }

    /// The parked background failure, if any.
    pub fn fatal_error(&self) -> Option<Arc<ShellError>> {
        self.fatal.get()
    }
}

impl Drop for ShellBolt {
    fn drop(&mut self) {
        self.cleanup();
    }
}
