// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

use std::sync::Arc;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ShellError {
    #[error("Failed to spawn shell process `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Shell process handshake failed: {reason}\n{stderr}")]
    Handshake { reason: String, stderr: String },

    #[error("Shell process died")]
    StreamClosed,

    #[error("Protocol violation: {0}")]
    Protocol(String),

    #[error("Frame of {len} bytes exceeds the {max} byte limit")]
    FrameTooLarge { len: u64, max: u64 },

    #[error("Failed to encode message: {0}")]
    Encode(#[from] prost::EncodeError),

    #[error("Failed to decode message: {0}")]
    Decode(#[from] prost::DecodeError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid configuration: {0}")]
    Configuration(String),

    #[error("Shell component is not running")]
    NotRunning,

    #[error("Shell component failed earlier: {0}")]
    Fatal(Arc<ShellError>),
}

impl ShellError {
    /// True when the error means the child went away rather than misbehaved.
    pub fn is_stream_closed(&self) -> bool {
        match self {
            Self::StreamClosed => true,
            Self::Fatal(inner) => inner.is_stream_closed(),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, ShellError>;
