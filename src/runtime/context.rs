/// Run-scoped execution context
///
/// Holds the global input of a run plus the outputs produced so far.
/// Shared by every node task of the run behind an `Arc`.

use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use uuid::Uuid;

/// Append-only output arena indexed by node id
///
/// One write-once slot per node, allocated up front. A node task only ever
/// writes its own slot, and reads never take a lock.
#[derive(Debug)]
pub struct OutputStore {
    index: HashMap<String, usize>,
    slots: Box<[OnceLock<Value>]>,
}

impl OutputStore {
    /// Allocate one slot per node id
    pub fn with_nodes<'a>(ids: impl IntoIterator<Item = &'a str>) -> Self {
        let index: HashMap<String, usize> = ids
            .into_iter()
            .enumerate()
            .map(|(slot, id)| (id.to_string(), slot))
            .collect();
        let slots = (0..index.len()).map(|_| OnceLock::new()).collect();

        Self { index, slots }
    }

    /// Record a node's output
    ///
    /// Returns false if the id is unknown or the slot was already written.
    pub fn insert(&self, node_id: &str, value: Value) -> bool {
        match self.index.get(node_id) {
            Some(&slot) => self.slots[slot].set(value).is_ok(),
            None => false,
        }
    }

    pub fn get(&self, node_id: &str) -> Option<&Value> {
        self.index.get(node_id).and_then(|&slot| self.slots[slot].get())
    }

    /// Number of slots that hold a value
    pub fn filled(&self) -> usize {
        self.slots.iter().filter(|slot| slot.get().is_some()).count()
    }
}

/// Runtime context shared across all node executions of one run
#[derive(Debug)]
pub struct RunContext {
    run_id: Uuid,
    input: Value,
    outputs: OutputStore,
    cancelled: Arc<AtomicBool>,
}

impl RunContext {
    pub fn new<'a>(run_id: Uuid, input: Value, node_ids: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            run_id,
            input,
            outputs: OutputStore::with_nodes(node_ids),
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// The global input supplied at invocation
    pub fn input(&self) -> &Value {
        &self.input
    }

    /// Output of an already-finished node
    pub fn output(&self, node_id: &str) -> Option<&Value> {
        self.outputs.get(node_id)
    }

    /// Write a node's own output slot
    pub fn record_output(&self, node_id: &str, value: Value) -> bool {
        self.outputs.insert(node_id, value)
    }

    /// Resolve a template root: `input` is the global input, anything else a node id
    pub fn root(&self, name: &str) -> Option<&Value> {
        if name == "input" {
            Some(&self.input)
        } else {
            self.outputs.get(name)
        }
    }

    pub fn outputs(&self) -> &OutputStore {
        &self.outputs
    }

    /// Mark the run as timed out or aborted
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// The flag itself, for work that polls it off the async runtime
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancelled)
    }
}
