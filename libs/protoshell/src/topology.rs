// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! What the host runtime tells a shell component about itself.

use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::proto;

/// Topology-wide configuration as handed to a task. Entries keep their
/// insertion order and are forwarded to the child in that order.
pub type StormConf = serde_json::Map<String, serde_json::Value>;

/// Stream used when an emission does not name one.
pub const DEFAULT_STREAM_ID: &str = "default";

/// The task's view of the running topology.
#[derive(Debug, Clone, Default)]
pub struct TopologyContext {
    /// Directory in which the child is expected to drop its pid file.
    pub pid_dir: PathBuf,
    /// Working directory for the child process.
    pub code_dir: PathBuf,
    pub this_task_id: i32,
    pub task_to_component: BTreeMap<i32, String>,
}

impl TopologyContext {
    pub fn new(
        pid_dir: impl Into<PathBuf>,
        code_dir: impl Into<PathBuf>,
        this_task_id: i32,
    ) -> Self {
        Self {
            pid_dir: pid_dir.into(),
            code_dir: code_dir.into(),
            this_task_id,
            task_to_component: BTreeMap::new(),
        }
    }

    pub fn with_task(mut self, task_id: i32, component: impl Into<String>) -> Self {
        self.task_to_component.insert(task_id, component.into());
        self
    }

    /// Component that owns this task, if the mapping knows it.
    pub fn this_component_id(&self) -> Option<&str> {
        self.task_to_component
            .get(&self.this_task_id)
            .map(String::as_str)
    }

    /// `component:task`, used to prefix log lines.
    pub fn label(&self) -> String {
        format!(
            "{}:{}",
            self.this_component_id().unwrap_or("shell"),
            self.this_task_id
        )
    }

    /// Build the handshake message sent as the child's first frame.
    pub fn handshake(&self, conf: &StormConf) -> proto::Context {
        let confs = conf
            .iter()
            .filter_map(|(key, value)| {
                let value = match value {
                    serde_json::Value::Null => return None,
                    serde_json::Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                Some(proto::Conf {
                    key: key.clone(),
                    value,
                })
            })
            .collect();

        let task_component_mappings = self
            .task_to_component
            .iter()
            .map(|(task, component)| proto::TaskComponentMapping {
                task: *task,
                component: component.clone(),
            })
            .collect();

        proto::Context {
            pid_dir: self.pid_dir.to_string_lossy().into_owned(),
            confs,
            topology: Some(proto::Topology {
                task_id: self.this_task_id,
                task_component_mappings,
            }),
        }
    }
}

/// An input record delivered to a bolt.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Tuple {
    pub source_component: String,
    pub source_stream: String,
    pub source_task: i32,
    pub values: Vec<Vec<u8>>,
}

impl Tuple {
    pub fn new(
        source_component: impl Into<String>,
        source_stream: impl Into<String>,
        source_task: i32,
        values: Vec<Vec<u8>>,
    ) -> Self {
        Self {
            source_component: source_component.into(),
            source_stream: source_stream.into(),
            source_task,
            values,
        }
    }

    /// Envelope for the child, tagged with the in-flight id.
    pub(crate) fn to_proto(&self, id: &str) -> proto::TupleProto {
        proto::TupleProto {
            tuple_metadata: Some(proto::TupleMetadata {
                id: id.to_string(),
                comp: self.source_component.clone(),
                stream: self.source_stream.clone(),
                task: self.source_task,
            }),
            contents: self.values.clone(),
        }
    }
}
