// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Shell bolts and spouts for a stream-processing host.
//!
//! A shell component runs as a child process and exchanges length-delimited
//! protobuf frames with the host over its stdin and stdout. The host sends the
//! topology context first and the child answers with its pid; after that a
//! bolt streams tuples in and receives ack / fail / emit commands back, while
//! a spout drives the child with next / ack / fail requests that each end in
//! `sync`.
//!
//! Unix only in practice: stderr is drained through a non-blocking pipe
//! descriptor, and elsewhere the drain reads nothing, so a chatty child can
//! stall and handshake failures carry no stderr text.

pub mod bolt;
pub mod codec;
pub mod collector;
pub mod config;
pub mod error;
pub mod in_flight;
pub mod message;
pub mod process;
pub mod process_handle;
pub mod proto;
pub mod spout;
pub mod topology;

pub use bolt::ShellBolt;
pub use codec::{FrameReader, FrameWriter, MAX_FRAME_LEN};
pub use collector::{OutputCollector, SpoutOutputCollector};
pub use config::{ShellComponent, ShellConfig};
pub use error::{Result, ShellError};
pub use message::{EmitTarget, Emission, ShellMsg, SpoutCommand};
pub use process::ShellProcess;
pub use process_handle::ProcessHandle;
pub use spout::ShellSpout;
pub use topology::{DEFAULT_STREAM_ID, StormConf, TopologyContext, Tuple};
