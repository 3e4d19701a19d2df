//! Reassembly of streamed tool-call fragments

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

use crate::api::{FunctionCall, ToolCallFragment, ToolCallRecord};

/// How fragments are assigned to in-progress records
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SlotMode {
    /// Every fragment merges into one record, whatever its index.
    /// Only one tool call per model turn survives this mode.
    #[default]
    Single,
    /// One record per distinct fragment index
    PerIndex,
}

impl SlotMode {
    pub fn from_parallel(parallel_tool_calls: bool) -> Self {
        if parallel_tool_calls {
            SlotMode::PerIndex
        } else {
            SlotMode::Single
        }
    }
}

/// Merges tool-call fragments into complete invocation records
#[derive(Debug, Default)]
pub struct ToolCallAccumulator {
    mode: SlotMode,
    /// Slot -> record still receiving fragments
    open: BTreeMap<u32, ToolCallRecord>,
    completed: Vec<ToolCallRecord>,
}

impl ToolCallAccumulator {
    pub fn new(mode: SlotMode) -> Self {
        Self {
            mode,
            ..Self::default()
        }
    }

    fn slot_for(&self, fragment: &ToolCallFragment) -> u32 {
        match self.mode {
            SlotMode::Single => 0,
            SlotMode::PerIndex => fragment.slot(),
        }
    }

    /// Merge one fragment.
    ///
    /// The first fragment for a slot opens a record. Later fragments overwrite
    /// id and name when non-empty and append their arguments substring.
    pub fn collect(&mut self, fragment: &ToolCallFragment) {
        let slot = self.slot_for(fragment);
        let id = fragment.id.as_deref().unwrap_or_default();
        let function = fragment.function.as_ref();
        let name = function.and_then(|f| f.name.as_deref()).unwrap_or_default();
        let arguments = function.and_then(|f| f.arguments.as_deref()).unwrap_or_default();

        match self.open.entry(slot) {
            Entry::Vacant(entry) => {
                let call_type = fragment
                    .call_type
                    .as_deref()
                    .filter(|t| !t.is_empty())
                    .unwrap_or("function");
                entry.insert(ToolCallRecord {
                    id: id.to_string(),
                    call_type: call_type.to_string(),
                    function: FunctionCall {
                        name: name.to_string(),
                        arguments: arguments.to_string(),
                    },
                });
            }
            Entry::Occupied(mut entry) => {
                let record = entry.get_mut();
                if !id.is_empty() {
                    record.id = id.to_string();
                }
                if !name.is_empty() {
                    record.function.name = name.to_string();
                }
                record.function.arguments.push_str(arguments);
            }
        }

        tracing::trace!(slot, fragment_args = arguments.len(), "Collected tool call fragment");
    }

    /// Close any open records and return everything completed so far.
    ///
    /// Calling this again without new fragments returns the same list.
    pub fn finalize(&mut self) -> Vec<ToolCallRecord> {
        let open = std::mem::take(&mut self.open);
        self.completed.extend(open.into_values());
        self.completed.clone()
    }
}
