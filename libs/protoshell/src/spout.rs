// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! A spout backed by a shell process.
//!
//! Every call is one synchronous round trip: send a command, then apply the
//! child's frames until it answers `sync`.

use prost::Message;

use crate::collector::SpoutOutputCollector;
use crate::config::ShellConfig;
use crate::error::{Result, ShellError};
use crate::message::{EmitTarget, ShellMsg, SpoutCommand};
use crate::process::ShellProcess;
use crate::proto;
use crate::topology::{StormConf, TopologyContext};

/// Frame transport for a round trip.
pub(crate) trait FrameIo {
    fn send<M: Message>(&mut self, message: &M) -> Result<()>;
    fn recv<M: Message + Default>(&mut self) -> Result<M>;

    /// Relieve the child's stderr between frames.
    fn drain_errors(&mut self) {}
}

impl FrameIo for ShellProcess {
    fn send<M: Message>(&mut self, message: &M) -> Result<()> {
        self.write(message)
    }

    fn recv<M: Message + Default>(&mut self) -> Result<M> {
        self.read()
    }

    fn drain_errors(&mut self) {
        self.drain_error_stream();
    }
}

/// Send `command` and process replies up to and including `sync`.
pub(crate) fn round_trip<T: FrameIo>(
    name: &str,
    io: &mut T,
    command: &SpoutCommand,
    collector: &mut dyn SpoutOutputCollector,
) -> Result<()> {
    io.send(&proto::SpoutMsg::from(command))?;

    loop {
        let frame: proto::EmissionProto = io.recv()?;
        // A child may log to stderr between any two frames of one round trip.
        io.drain_errors();
        match ShellMsg::try_from(frame)? {
            ShellMsg::Sync => return Ok(()),
            ShellMsg::Log { msg } => tracing::info!("[{}] Shell msg: {}", name, msg),
            ShellMsg::Error { msg } => {
                tracing::warn!("[{}] Shell process reported error: {}", name, msg);
                collector.report_error(&msg);
            }
            ShellMsg::Emit(emission) => match emission.target {
                EmitTarget::Direct(task) => {
                    collector.emit_direct(task, &emission.stream, emission.values, emission.id);
                }
                EmitTarget::FanOut => {
                    let task_ids = collector.emit(&emission.stream, emission.values, emission.id);
                    // The child blocks on this reply before sending anything else.
                    io.send(&proto::TaskIds { task_ids })?;
                }
            },
            msg @ (ShellMsg::Ack { .. } | ShellMsg::Fail { .. }) => {
                tracing::debug!("[{}] Ignoring '{}' sent to a spout", name, msg.command());
            }
        }
    }
}

/// Spout whose tuples come from a child process.
pub struct ShellSpout {
    config: ShellConfig,
    name: String,
    process: Option<ShellProcess>,
    collector: Option<Box<dyn SpoutOutputCollector + Send>>,
}

impl ShellSpout {
    pub fn new(config: impl Into<ShellConfig>) -> Self {
        Self {
            config: config.into(),
            name: "shell-spout".to_string(),
            process: None,
            collector: None,
        }
    }

    /// Launch the child and complete the handshake.
    pub fn open(
        &mut self,
        conf: &StormConf,
        context: &TopologyContext,
        collector: Box<dyn SpoutOutputCollector + Send>,
    ) -> Result<()> {
        if self.process.is_some() {
            return Err(ShellError::Configuration(format!(
                "shell spout '{}' is already open",
                self.name
            )));
        }
        self.config.validate()?;
        self.name = context.label();

        let process = ShellProcess::launch(&self.config.command, conf, context)?;
        tracing::info!(
            "[{}] Launched subprocess with pid {}",
            self.name,
            process.shell_pid()
        );
        self.process = Some(process);
        self.collector = Some(collector);
        Ok(())
    }

    /// Ask the child for its next batch of tuples.
    pub fn next_tuple(&mut self) -> Result<()> {
        self.send_command(SpoutCommand::Next)
    }

    /// Tell the child that the tuple emitted with `message_id` completed.
    pub fn ack(&mut self, message_id: &str) -> Result<()> {
        self.send_command(SpoutCommand::Ack(message_id.to_string()))
    }

    /// Tell the child that the tuple emitted with `message_id` failed.
    pub fn fail(&mut self, message_id: &str) -> Result<()> {
        self.send_command(SpoutCommand::Fail(message_id.to_string()))
    }

    fn send_command(&mut self, command: SpoutCommand) -> Result<()> {
        let (Some(process), Some(collector)) = (self.process.as_mut(), self.collector.as_mut())
        else {
            return Err(ShellError::NotRunning);
        };

        let result = round_trip(&self.name, process, &command, collector.as_mut());
        process.drain_error_stream();
        if let Err(e) = &result {
            tracing::error!("[{}] Spout '{}' round trip failed: {}", self.name, command_name(&command), e);
        }
        result
    }

    pub fn activate(&mut self) {
        tracing::debug!("[{}] Activated", self.name);
    }

    pub fn deactivate(&mut self) {
        tracing::debug!("[{}] Deactivated", self.name);
    }

    /// Terminate the child. Safe to call more than once.
    pub fn close(&mut self) {
        if let Some(mut process) = self.process.take() {
            tracing::info!("[{}] Closing shell spout", self.name);
            process.drain_error_stream();
            process.terminate();
        }
        self.collector = None;
    }

    pub fn is_open(&self) -> bool {
        self.process.is_some()
    }

    /// Pid the child reported during the handshake.
    pub fn shell_pid(&self) -> Option<i32> {
        self.process.as_ref().map(ShellProcess::shell_pid)
    }
}

impl Drop for ShellSpout {
    fn drop(&mut self) {
        self.close();
    }
}

fn command_name(command: &SpoutCommand) -> &'static str {
    match command {
        SpoutCommand::Next => "next",
        SpoutCommand::Ack(_) => "ack",
        SpoutCommand::Fail(_) => "fail",
    }
}
