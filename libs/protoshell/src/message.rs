// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Typed views of the command frames exchanged with the child.

use crate::error::{Result, ShellError};
use crate::proto;
use crate::topology::DEFAULT_STREAM_ID;

/// Where an emission goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmitTarget {
    /// Let the stream grouping pick the receiving tasks.
    FanOut,
    /// Send to one task, bypassing the grouping.
    Direct(i32),
}

impl EmitTarget {
    /// An absent task means fan-out. Task 0 is also read as fan-out: children
    /// built on encoders that cannot leave a scalar unset always send 0, and
    /// no component task is ever assigned id 0.
    pub fn from_wire(task: Option<i64>) -> Result<Self> {
        match task {
            None | Some(0) => Ok(Self::FanOut),
            Some(task) => i32::try_from(task).map(Self::Direct).map_err(|_| {
                ShellError::Protocol(format!("emit target task {} out of range", task))
            }),
        }
    }
}

/// An `emit` command from the child.
#[derive(Debug, Clone, PartialEq)]
pub struct Emission {
    /// Spout message id; empty for bolts.
    pub id: Option<String>,
    pub stream: String,
    pub target: EmitTarget,
    pub anchors: Vec<String>,
    pub need_task_ids: bool,
    pub values: Vec<Vec<u8>>,
}

/// One frame read from the child after the handshake.
#[derive(Debug, Clone, PartialEq)]
pub enum ShellMsg {
    Ack { id: String },
    Fail { id: String },
    Error { msg: String },
    Log { msg: String },
    Emit(Emission),
    Sync,
}

impl ShellMsg {
    pub fn command(&self) -> &'static str {
        match self {
            Self::Ack { .. } => "ack",
            Self::Fail { .. } => "fail",
            Self::Error { .. } => "error",
            Self::Log { .. } => "log",
            Self::Emit(_) => "emit",
            Self::Sync => "sync",
        }
    }
}

impl TryFrom<proto::EmissionProto> for ShellMsg {
    type Error = ShellError;

    fn try_from(emission: proto::EmissionProto) -> Result<Self> {
        let meta = emission.emission_metadata.ok_or_else(|| {
            ShellError::Protocol("emission frame without metadata".to_string())
        })?;

        let msg = match meta.command.as_str() {
            "ack" => ShellMsg::Ack { id: meta.id },
            "fail" => ShellMsg::Fail { id: meta.id },
            "error" => ShellMsg::Error { msg: meta.msg },
            "log" => ShellMsg::Log { msg: meta.msg },
            "sync" => ShellMsg::Sync,
            "emit" => ShellMsg::Emit(Emission {
                id: Some(meta.id).filter(|id| !id.is_empty()),
                stream: meta
                    .stream
                    .filter(|s| !s.is_empty())
                    .unwrap_or_else(|| DEFAULT_STREAM_ID.to_string()),
                target: EmitTarget::from_wire(meta.task)?,
                anchors: meta.anchors,
                need_task_ids: meta.need_task_ids.unwrap_or(true),
                values: emission.contents,
            }),
            other => {
                return Err(ShellError::Protocol(format!(
                    "unknown command '{}' from shell process",
                    other
                )));
            }
        };
        Ok(msg)
    }
}

impl From<&ShellMsg> for proto::EmissionProto {
    fn from(msg: &ShellMsg) -> Self {
        let mut meta = proto::EmissionMetadata {
            command: msg.command().to_string(),
            ..Default::default()
        };
        let mut contents = Vec::new();
        match msg {
            ShellMsg::Ack { id } | ShellMsg::Fail { id } => meta.id = id.clone(),
            ShellMsg::Error { msg } | ShellMsg::Log { msg } => meta.msg = msg.clone(),
            ShellMsg::Sync => {}
            ShellMsg::Emit(emission) => {
                meta.id = emission.id.clone().unwrap_or_default();
                meta.stream = Some(emission.stream.clone());
                meta.task = match emission.target {
                    EmitTarget::FanOut => None,
                    EmitTarget::Direct(task) => Some(i64::from(task)),
                };
                meta.anchors = emission.anchors.clone();
                meta.need_task_ids = Some(emission.need_task_ids);
                contents = emission.values.clone();
            }
        }
        Self {
            emission_metadata: Some(meta),
            contents,
        }
    }
}

/// A request from a spout to its child.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpoutCommand {
    Next,
    Ack(String),
    Fail(String),
}

impl From<&SpoutCommand> for proto::SpoutMsg {
    fn from(command: &SpoutCommand) -> Self {
        match command {
            SpoutCommand::Next => proto::SpoutMsg {
                command: "next".to_string(),
                id: None,
            },
            SpoutCommand::Ack(id) => proto::SpoutMsg {
                command: "ack".to_string(),
                id: Some(id.clone()),
            },
            SpoutCommand::Fail(id) => proto::SpoutMsg {
                command: "fail".to_string(),
                id: Some(id.clone()),
            },
        }
    }
}

impl TryFrom<proto::SpoutMsg> for SpoutCommand {
    type Error = ShellError;

    fn try_from(msg: proto::SpoutMsg) -> Result<Self> {
        match (msg.command.as_str(), msg.id) {
            ("next", _) => Ok(Self::Next),
            ("ack", Some(id)) => Ok(Self::Ack(id)),
            ("fail", Some(id)) => Ok(Self::Fail(id)),
            (command, _) => Err(ShellError::Protocol(format!(
                "malformed spout command '{}'",
                command
            ))),
        }
    }
}
