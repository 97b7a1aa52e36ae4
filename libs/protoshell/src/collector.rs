// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! The host side that receives what a shell component produces.

use std::sync::Arc;

use crate::topology::Tuple;

/// Delivery interface for a shell bolt.
///
/// Called from the bolt's reader thread, so implementations must be
/// shareable across threads.
pub trait OutputCollector: Send + Sync {
    fn ack(&self, tuple: &Tuple);

    fn fail(&self, tuple: &Tuple);

    /// An application error reported by the child. Never fatal.
    fn report_error(&self, message: &str);

    /// Emit through the stream grouping. Returns the receiving task ids.
    fn emit(&self, stream: &str, anchors: &[Arc<Tuple>], values: Vec<Vec<u8>>) -> Vec<i32>;

    fn emit_direct(&self, task: i32, stream: &str, anchors: &[Arc<Tuple>], values: Vec<Vec<u8>>);
}

/// Delivery interface for a shell spout. Only ever called from the thread
/// driving the spout.
pub trait SpoutOutputCollector {
    /// Emit through the stream grouping. Returns the receiving task ids.
    fn emit(&mut self, stream: &str, values: Vec<Vec<u8>>, message_id: Option<String>) -> Vec<i32>;

    fn emit_direct(
        &mut self,
        task: i32,
        stream: &str,
        values: Vec<Vec<u8>>,
        message_id: Option<String>,
    );

    fn report_error(&mut self, message: &str);
}
