// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Tuples handed to the child that it has not acked or failed yet.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::{Result, ShellError};
use crate::topology::Tuple;

/// Thread-safe map from in-flight id to tuple. Callers never lock.
#[derive(Default)]
pub struct InFlightTuples {
    tuples: Mutex<HashMap<String, Arc<Tuple>>>,
}

impl InFlightTuples {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track `tuple` under a fresh random id and return the id.
    pub fn insert(&self, tuple: Arc<Tuple>) -> String {
        let mut tuples = self.tuples.lock();
        loop {
            // Redraw on the (astronomically unlikely) clash with a live id.
            match tuples.entry(fastrand::i64(..).to_string()) {
                Entry::Occupied(_) => continue,
                Entry::Vacant(slot) => {
                    let id = slot.key().clone();
                    slot.insert(tuple);
                    return id;
                }
            }
        }
    }

    /// Resolve an ack. The id must be in flight.
    pub fn remove_acked(&self, id: &str) -> Result<Arc<Tuple>> {
        self.tuples.lock().remove(id).ok_or_else(|| {
            ShellError::Protocol(format!("Acked a non-existent or already acked/failed id: {}", id))
        })
    }

    /// Resolve a fail. The id must be in flight.
    pub fn remove_failed(&self, id: &str) -> Result<Arc<Tuple>> {
        self.tuples.lock().remove(id).ok_or_else(|| {
            ShellError::Protocol(format!("Failed a non-existent or already acked/failed id: {}", id))
        })
    }

    /// Look up every anchor of an emission. All of them must still be in
    /// flight.
    pub fn anchors(&self, ids: &[String]) -> Result<Vec<Arc<Tuple>>> {
        let tuples = self.tuples.lock();
        ids.iter()
            .map(|id| {
                tuples.get(id).cloned().ok_or_else(|| {
                    ShellError::Protocol(format!("Anchored onto {} after ack/fail", id))
                })
            })
            .collect()
    }

    /// Drop a tuple that never reached the child.
    pub(crate) fn discard(&self, id: &str) {
        self.tuples.lock().remove(id);
    }

    pub fn contains(&self, id: &str) -> bool {
        self.tuples.lock().contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.tuples.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tuples.lock().is_empty()
    }

    pub fn clear(&self) {
        self.tuples.lock().clear();
    }
}
