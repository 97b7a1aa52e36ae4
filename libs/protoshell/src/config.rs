// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Shell component configuration via `protoshell.yaml`.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::{Result, ShellError};

/// The command line a shell component runs, e.g. `["python3", "split.py"]`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct ShellComponent {
    command: Vec<String>,
}

impl ShellComponent {
    /// Interpreter plus script, the way topologies usually declare shell
    /// components.
    pub fn new(execution_command: impl Into<String>, script: impl Into<String>) -> Self {
        Self {
            command: vec![execution_command.into(), script.into()],
        }
    }

    pub fn from_args<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            command: args.into_iter().map(Into::into).collect(),
        }
    }

    pub fn program(&self) -> Option<&str> {
        self.command.first().map(String::as_str)
    }

    pub fn args(&self) -> &[String] {
        self.command.get(1..).unwrap_or(&[])
    }

    pub fn validate(&self) -> Result<()> {
        match self.program() {
            Some(program) if !program.trim().is_empty() => Ok(()),
            _ => Err(ShellError::Configuration(
                "shell component command is empty".to_string(),
            )),
        }
    }
}

impl std::fmt::Display for ShellComponent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.command.join(" "))
    }
}

fn default_writer_poll_interval_ms() -> u64 {
    1000
}

/// Configuration for a shell bolt or spout.
#[derive(Debug, Clone, Deserialize)]
pub struct ShellConfig {
    pub command: ShellComponent,

    /// Capacity of the bolt's pending-write queue. `None` means unbounded.
    #[serde(default)]
    pub pending_write_capacity: Option<usize>,

    /// How long the bolt writer waits for work before draining stderr.
    #[serde(default = "default_writer_poll_interval_ms")]
    pub writer_poll_interval_ms: u64,
}

impl ShellConfig {
    /// Configuration file name.
    pub const FILE_NAME: &'static str = "protoshell.yaml";

    pub fn new(command: ShellComponent) -> Self {
        Self {
            command,
            pending_write_capacity: None,
            writer_poll_interval_ms: default_writer_poll_interval_ms(),
        }
    }

    /// Load `protoshell.yaml` from a directory.
    pub fn load(dir: &Path) -> Result<Self> {
        let config_path = dir.join(Self::FILE_NAME);

        let content = std::fs::read_to_string(&config_path).map_err(|e| {
            ShellError::Configuration(format!("Failed to read {}: {}", config_path.display(), e))
        })?;

        let config = Self::from_yaml_str(&content).map_err(|e| {
            ShellError::Configuration(format!("{} ({})", e, config_path.display()))
        })?;

        tracing::info!("Loaded shell config from {}", config_path.display());
        Ok(config)
    }

    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(content)
            .map_err(|e| ShellError::Configuration(format!("Failed to parse shell config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.command.validate()?;
        if self.pending_write_capacity == Some(0) {
            return Err(ShellError::Configuration(
                "pending_write_capacity must be at least 1".to_string(),
            ));
        }
        if self.writer_poll_interval_ms == 0 {
            return Err(ShellError::Configuration(
                "writer_poll_interval_ms must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn with_pending_write_capacity(mut self, capacity: usize) -> Self {
        self.pending_write_capacity = Some(capacity);
        self
    }

    pub fn with_writer_poll_interval(mut self, interval: Duration) -> Self {
        self.writer_poll_interval_ms = interval.as_millis().max(1) as u64;
        self
    }

    pub fn writer_poll_interval(&self) -> Duration {
        Duration::from_millis(self.writer_poll_interval_ms)
    }
}

impl From<ShellComponent> for ShellConfig {
    fn from(command: ShellComponent) -> Self {
        Self::new(command)
    }
}
