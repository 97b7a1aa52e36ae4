// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Launching a shell process and talking to it over its standard streams.
//!
//! stdin carries host → child frames, stdout carries child → host frames and
//! stderr is free text from the child that must be drained continuously: a
//! child blocked on a full stderr pipe stops reading stdin too.

use std::io::{BufReader, BufWriter, ErrorKind, Read};
use std::process::{ChildStderr, ChildStdin, ChildStdout, Command, Stdio};
use std::time::Duration;

use prost::Message;

use crate::codec::{FrameReader, FrameWriter};
use crate::config::ShellComponent;
use crate::error::{Result, ShellError};
use crate::process_handle::ProcessHandle;
use crate::proto;
use crate::topology::{StormConf, TopologyContext};

/// How long a child that failed the handshake gets to finish writing to
/// stderr and exit before its output is collected.
const HANDSHAKE_EXIT_GRACE: Duration = Duration::from_millis(500);

/// Non-blocking reader over the child's stderr.
pub struct ErrorStream {
    inner: Option<ChildStderr>,
}

impl ErrorStream {
    fn new(stderr: ChildStderr) -> Self {
        #[cfg(unix)]
        {
            use std::os::unix::io::AsRawFd;

            let fd = stderr.as_raw_fd();
            // SAFETY: `fd` is owned by `stderr`, which outlives these calls.
            let set = unsafe {
                let flags = libc::fcntl(fd, libc::F_GETFL);
                flags >= 0 && libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK) >= 0
            };
            if !set {
                tracing::warn!(
                    "Failed to make shell stderr non-blocking: {}",
                    std::io::Error::last_os_error()
                );
            }
        }
        Self {
            inner: Some(stderr),
        }
    }

    /// Read whatever the child has written to stderr so far. Never blocks;
    /// returns an empty string when nothing is pending. Always empty off
    /// unix, where the pipe cannot be switched to non-blocking.
    pub fn drain(&mut self) -> String {
        let mut collected = Vec::new();
        if cfg!(unix) {
            let mut buf = [0u8; 4096];
            while let Some(stderr) = self.inner.as_mut() {
                match stderr.read(&mut buf) {
                    Ok(0) => {
                        // Child closed stderr; nothing more will ever arrive.
                        self.inner = None;
                    }
                    Ok(n) => collected.extend_from_slice(&buf[..n]),
                    Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                    Err(e) if e.kind() == ErrorKind::WouldBlock => break,
                    Err(e) => {
                        tracing::debug!("Stopped draining shell stderr: {}", e);
                        self.inner = None;
                    }
                }
            }
        }
        String::from_utf8_lossy(&collected).into_owned()
    }
}

/// Host → child half: stdin plus the stderr drain.
pub struct ShellWriter {
    frames: FrameWriter<BufWriter<ChildStdin>>,
    stderr: ErrorStream,
    name: String,
}

impl ShellWriter {
    pub fn write<M: Message>(&mut self, message: &M) -> Result<()> {
        self.frames.write_frame(message)
    }

    /// Drain stderr and forward it to diagnostics. Never blocks.
    pub fn drain_error_stream(&mut self) -> String {
        let text = self.stderr.drain();
        if !text.is_empty() {
            tracing::info!("[{}] Got error from shell process: {}", self.name, text.trim_end());
        }
        text
    }
}

/// Child → host half: stdout.
pub struct ShellReader {
    frames: FrameReader<BufReader<ChildStdout>>,
}

impl ShellReader {
    pub fn read<M: Message + Default>(&mut self) -> Result<M> {
        self.frames.read_frame()
    }
}

/// A launched shell process that completed the handshake.
pub struct ShellProcess {
    writer: ShellWriter,
    reader: ShellReader,
    handle: ProcessHandle,
    shell_pid: i32,
}

impl ShellProcess {
    /// Start `component` in the context's code directory and run the
    /// handshake: send the context, wait for the child's pid.
    pub fn launch(
        component: &ShellComponent,
        conf: &StormConf,
        context: &TopologyContext,
    ) -> Result<Self> {
        component.validate()?;
        let name = context.label();
        let program = component.program().unwrap_or_default();

        tracing::info!(
            "[{}] Spawning shell process: command='{}', code_dir='{}'",
            name,
            component,
            context.code_dir.display()
        );

        let mut child = Command::new(program)
            .args(component.args())
            .current_dir(&context.code_dir)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| ShellError::Spawn {
                command: component.to_string(),
                source,
            })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| ShellError::Configuration("Failed to capture shell stdin".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ShellError::Configuration("Failed to capture shell stdout".to_string()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| ShellError::Configuration("Failed to capture shell stderr".to_string()))?;

        let handle = ProcessHandle::new(child, &name);
        let mut writer = ShellWriter {
            frames: FrameWriter::new(BufWriter::new(stdin)),
            stderr: ErrorStream::new(stderr),
            name: name.clone(),
        };
        let mut reader = ShellReader {
            frames: FrameReader::new(BufReader::new(stdout)),
        };

        match Self::handshake(&mut writer, &mut reader, conf, context, &name) {
            Ok(shell_pid) => Ok(Self {
                writer,
                reader,
                handle,
                shell_pid,
            }),
            Err(e) => {
                handle.wait_for_exit(HANDSHAKE_EXIT_GRACE);
                let stderr = writer.stderr.drain();
                handle.terminate();
                tracing::error!("[{}] Shell process handshake failed: {}", name, e);
                Err(ShellError::Handshake {
                    reason: e.to_string(),
                    stderr,
                })
            }
        }
    }

    fn handshake(
        writer: &mut ShellWriter,
        reader: &mut ShellReader,
        conf: &StormConf,
        context: &TopologyContext,
        name: &str,
    ) -> Result<i32> {
        tracing::debug!("[{}] Writing configuration to shell process", name);
        writer.write(&context.handshake(conf))?;

        tracing::debug!("[{}] Waiting for pid from shell process", name);
        let pid: proto::Pid = reader.read()?;
        tracing::info!(
            "[{}] Shell process connection established (pid={})",
            name,
            pid.pid
        );
        Ok(pid.pid)
    }

    /// Pid the child reported during the handshake.
    pub fn shell_pid(&self) -> i32 {
        self.shell_pid
    }

    pub fn handle(&self) -> &ProcessHandle {
        &self.handle
    }

    pub fn write<M: Message>(&mut self, message: &M) -> Result<()> {
        self.writer.write(message)
    }

    pub fn read<M: Message + Default>(&mut self) -> Result<M> {
        self.reader.read()
    }

    pub fn drain_error_stream(&mut self) -> String {
        self.writer.drain_error_stream()
    }

    pub fn terminate(&self) {
        self.handle.terminate();
    }

    /// Split into independently owned halves for the bolt's threads.
    pub fn into_split(self) -> (ShellWriter, ShellReader, ProcessHandle) {
        (self.writer, self.reader, self.handle)
    }
}
