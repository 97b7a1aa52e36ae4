// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Helpers shared by the integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use protoshell::{
    OutputCollector, ShellComponent, ShellConfig, SpoutOutputCollector, StormConf, TopologyContext,
    Tuple,
};
use serde_json::json;

pub const TASK_ID: i32 = 3;
pub const COMPONENT: &str = "split";

/// Config that runs the fixture binary in `mode`.
pub fn fixture(mode: &str) -> ShellConfig {
    ShellConfig::new(ShellComponent::from_args([
        env!("CARGO_BIN_EXE_protoshell-fixture"),
        mode,
    ]))
    .with_writer_poll_interval(Duration::from_millis(20))
}

pub fn context(dir: &tempfile::TempDir) -> TopologyContext {
    TopologyContext::new(dir.path().join("pids"), dir.path(), TASK_ID)
        .with_task(1, "spout")
        .with_task(TASK_ID, COMPONENT)
}

pub fn storm_conf() -> StormConf {
    let mut conf = StormConf::new();
    conf.insert("topology.name".into(), json!("wordcount"));
    conf.insert("topology.workers".into(), json!(2));
    conf
}

pub fn sentence(text: &str) -> Tuple {
    Tuple::new("spout", "default", 1, vec![text.as_bytes().to_vec()])
}

/// Poll `condition` until it holds or `timeout` passes.
pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let start = Instant::now();
    while start.elapsed() < timeout {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    condition()
}

pub const WAIT: Duration = Duration::from_secs(10);

// =============================================================================
// Bolt collector
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct Emitted {
    pub stream: String,
    pub anchors: Vec<Tuple>,
    pub values: Vec<Vec<u8>>,
}

#[derive(Default)]
pub struct RecordingCollector {
    pub acked: Mutex<Vec<Tuple>>,
    pub failed: Mutex<Vec<Tuple>>,
    pub errors: Mutex<Vec<String>>,
    pub emitted: Mutex<Vec<Emitted>>,
}

impl RecordingCollector {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

impl OutputCollector for RecordingCollector {
    fn ack(&self, tuple: &Tuple) {
        self.acked.lock().push(tuple.clone());
    }

    fn fail(&self, tuple: &Tuple) {
        self.failed.lock().push(tuple.clone());
    }

    fn report_error(&self, message: &str) {
        self.errors.lock().push(message.to_string());
    }

    fn emit(&self, stream: &str, anchors: &[Arc<Tuple>], values: Vec<Vec<u8>>) -> Vec<i32> {
        self.emitted.lock().push(Emitted {
            stream: stream.to_string(),
            anchors: anchors.iter().map(|t| (**t).clone()).collect(),
            values,
        });
        vec![4, 5]
    }

    fn emit_direct(&self, _task: i32, stream: &str, anchors: &[Arc<Tuple>], values: Vec<Vec<u8>>) {
        self.emit(stream, anchors, values);
    }
}

// =============================================================================
// Spout collector
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct SpoutEmitted {
    pub task: Option<i32>,
    pub stream: String,
    pub values: Vec<Vec<u8>>,
    pub message_id: Option<String>,
}

#[derive(Default)]
pub struct SpoutRecords {
    pub emitted: Vec<SpoutEmitted>,
    pub errors: Vec<String>,
}

/// Spout collector whose records stay readable after the spout takes it.
#[derive(Clone, Default)]
pub struct SharedSpoutCollector {
    pub records: Arc<Mutex<SpoutRecords>>,
}

impl SpoutOutputCollector for SharedSpoutCollector {
    fn emit(&mut self, stream: &str, values: Vec<Vec<u8>>, message_id: Option<String>) -> Vec<i32> {
        self.records.lock().emitted.push(SpoutEmitted {
            task: None,
            stream: stream.to_string(),
            values,
            message_id,
        });
        vec![2, 3]
    }

    fn emit_direct(
        &mut self,
        task: i32,
        stream: &str,
        values: Vec<Vec<u8>>,
        message_id: Option<String>,
    ) {
        self.records.lock().emitted.push(SpoutEmitted {
            task: Some(task),
            stream: stream.to_string(),
            values,
            message_id,
        });
    }

    fn report_error(&mut self, message: &str) {
        self.records.lock().errors.push(message.to_string());
    }
}
