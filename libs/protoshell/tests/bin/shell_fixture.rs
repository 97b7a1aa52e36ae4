// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Child side of the shell protocol, for the integration tests.
//!
//! Usage: `protoshell-fixture <mode>`. Every mode except `no-pid` answers the
//! handshake with its own pid, then:
//!
//! - `bolt-ack`: emit each tuple's first value anchored on it, then ack.
//! - `bolt-fail`: fail each tuple.
//! - `bolt-double-ack`: ack each tuple twice.
//! - `bolt-error`: report an error for each tuple, then ack it.
//! - `bolt-task-ids`: emit asking for task ids, emit the ids it got back, ack.
//! - `bolt-context`: emit what the handshake delivered, then ack.
//! - `bolt-exit`: exit after reading one tuple.
//! - `stderr-noise`: flood stderr before acking each tuple.
//! - `exit`: exit right after the handshake.
//! - `spout`: answer next / ack / fail requests.
//! - `spout-noisy`: answer `next` with three direct emits, each preceded by a
//!   stderr burst; together they overflow a pipe buffer.
//! - `no-pid`: complain on stderr and exit without sending a pid.

use std::io::{Read, Write};

use anyhow::{Context as _, Result, bail};
use protoshell::codec::{FrameReader, FrameWriter};
use protoshell::proto;
use protoshell::{EmitTarget, Emission, ShellError, ShellMsg, SpoutCommand};
use tracing_subscriber::EnvFilter;

/// More than a pipe buffer holds, so an undrained stderr stalls the fixture.
const NOISE_BYTES: usize = 256 * 1024;

/// Fits in a pipe buffer on its own; three of them do not.
const BURST_BYTES: usize = 48 * 1024;

fn flood_stderr(len: usize) -> Result<()> {
    let mut stderr = std::io::stderr().lock();
    stderr.write_all(&vec![b'!'; len])?;
    stderr.flush()?;
    Ok(())
}

struct Shell<R: Read, W: Write> {
    input: FrameReader<R>,
    output: FrameWriter<W>,
}

impl<R: Read, W: Write> Shell<R, W> {
    fn send(&mut self, msg: &ShellMsg) -> Result<()> {
        self.output.write_frame(&proto::EmissionProto::from(msg))?;
        Ok(())
    }

    fn emit(&mut self, anchors: Vec<String>, values: Vec<Vec<u8>>, need_task_ids: bool) -> Result<()> {
        self.send(&ShellMsg::Emit(Emission {
            id: None,
            stream: "default".to_string(),
            target: EmitTarget::FanOut,
            anchors,
            need_task_ids,
            values,
        }))
    }

    /// Next tuple from the host, or `None` once the host hung up.
    fn next_tuple(&mut self) -> Result<Option<proto::TupleProto>> {
        match self.input.read_frame() {
            Ok(tuple) => Ok(Some(tuple)),
            Err(ShellError::StreamClosed) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

fn tuple_id(tuple: &proto::TupleProto) -> String {
    tuple
        .tuple_metadata
        .as_ref()
        .map(|meta| meta.id.clone())
        .unwrap_or_default()
}

fn run_bolt<R: Read, W: Write>(shell: &mut Shell<R, W>, mode: &str, context: &proto::Context) -> Result<()> {
    while let Some(tuple) = shell.next_tuple()? {
        let id = tuple_id(&tuple);
        tracing::debug!("fixture got tuple {}", id);

        match mode {
            "bolt-ack" => {
                shell.emit(vec![id.clone()], tuple.contents.into_iter().take(1).collect(), false)?;
                shell.send(&ShellMsg::Ack { id })?;
            }
            "bolt-fail" => shell.send(&ShellMsg::Fail { id })?,
            "bolt-double-ack" => {
                shell.send(&ShellMsg::Ack { id: id.clone() })?;
                shell.send(&ShellMsg::Ack { id })?;
            }
            "bolt-error" => {
                shell.send(&ShellMsg::Error {
                    msg: format!("bad tuple {}", id),
                })?;
                shell.send(&ShellMsg::Ack { id })?;
            }
            "bolt-task-ids" => {
                shell.emit(vec![id.clone()], vec![b"first".to_vec()], true)?;
                let reply: proto::TaskIds = shell.input.read_frame()?;
                let ids = reply
                    .task_ids
                    .iter()
                    .map(i32::to_string)
                    .collect::<Vec<_>>()
                    .join(",");
                shell.emit(vec![id.clone()], vec![ids.into_bytes()], false)?;
                shell.send(&ShellMsg::Ack { id })?;
            }
            "bolt-context" => {
                let topology = context.topology.clone().unwrap_or_default();
                let component = topology
                    .task_component_mappings
                    .iter()
                    .find(|m| m.task == topology.task_id)
                    .map(|m| m.component.clone())
                    .unwrap_or_default();
                let name = context
                    .confs
                    .iter()
                    .find(|c| c.key == "topology.name")
                    .map(|c| c.value.clone())
                    .unwrap_or_default();
                shell.emit(
                    vec![id.clone()],
                    vec![
                        context.pid_dir.clone().into_bytes(),
                        component.into_bytes(),
                        name.into_bytes(),
                        topology.task_id.to_string().into_bytes(),
                    ],
                    false,
                )?;
                shell.send(&ShellMsg::Ack { id })?;
            }
            "bolt-exit" => return Ok(()),
            "stderr-noise" => {
                flood_stderr(NOISE_BYTES)?;
                shell.send(&ShellMsg::Ack { id })?;
            }
            other => bail!("unknown bolt mode '{}'", other),
        }
    }
    Ok(())
}

fn run_spout<R: Read, W: Write>(shell: &mut Shell<R, W>) -> Result<()> {
    let mut emitted = 0u32;
    loop {
        let request: proto::SpoutMsg = match shell.input.read_frame() {
            Ok(request) => request,
            Err(ShellError::StreamClosed) => return Ok(()),
            Err(e) => return Err(e.into()),
        };

        match SpoutCommand::try_from(request)? {
            SpoutCommand::Next => {
                emitted += 1;
                shell.send(&ShellMsg::Emit(Emission {
                    id: Some(format!("m-{}", emitted)),
                    stream: "default".to_string(),
                    target: EmitTarget::FanOut,
                    anchors: vec![],
                    need_task_ids: true,
                    values: vec![format!("sentence {}", emitted).into_bytes()],
                }))?;
                let reply: proto::TaskIds = shell.input.read_frame()?;
                let first = reply.task_ids.first().copied().context("no task ids for fan-out")?;
                let ids = reply
                    .task_ids
                    .iter()
                    .map(i32::to_string)
                    .collect::<Vec<_>>()
                    .join(",");
                shell.send(&ShellMsg::Emit(Emission {
                    id: None,
                    stream: "taskids".to_string(),
                    target: EmitTarget::Direct(first),
                    anchors: vec![],
                    need_task_ids: false,
                    values: vec![ids.into_bytes()],
                }))?;
            }
            SpoutCommand::Ack(id) => shell.send(&ShellMsg::Log {
                msg: format!("acked {}", id),
            })?,
            SpoutCommand::Fail(id) => shell.send(&ShellMsg::Error {
                msg: format!("failed {}", id),
            })?,
        }
        shell.send(&ShellMsg::Sync)?;
    }
}

fn run_noisy_spout<R: Read, W: Write>(shell: &mut Shell<R, W>) -> Result<()> {
    loop {
        let request: proto::SpoutMsg = match shell.input.read_frame() {
            Ok(request) => request,
            Err(ShellError::StreamClosed) => return Ok(()),
            Err(e) => return Err(e.into()),
        };
        if SpoutCommand::try_from(request)? == SpoutCommand::Next {
            for burst in 0..3 {
                flood_stderr(BURST_BYTES)?;
                shell.send(&ShellMsg::Emit(Emission {
                    id: None,
                    stream: "default".to_string(),
                    target: EmitTarget::Direct(7),
                    anchors: vec![],
                    need_task_ids: false,
                    values: vec![format!("burst {}", burst).into_bytes()],
                }))?;
            }
        }
        shell.send(&ShellMsg::Sync)?;
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    let mode = std::env::args().nth(1).context("usage: protoshell-fixture <mode>")?;

    let mut shell = Shell {
        input: FrameReader::new(std::io::stdin().lock()),
        output: FrameWriter::new(std::io::stdout().lock()),
    };

    let context: proto::Context = shell.input.read_frame().context("reading handshake context")?;
    if mode == "no-pid" {
        tracing::error!("fixture refusing handshake for {}", context.pid_dir);
        std::process::exit(3);
    }
    shell.output.write_frame(&proto::Pid {
        pid: std::process::id() as i32,
    })?;

    match mode.as_str() {
        "exit" => Ok(()),
        "spout" => run_spout(&mut shell),
        "spout-noisy" => run_noisy_spout(&mut shell),
        bolt => run_bolt(&mut shell, bolt, &context),
    }
}
