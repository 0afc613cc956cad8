//! Process formations.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Mapping from process-type name to its scaling and sizing parameters.
///
/// A `BTreeMap` so that the JSON written to storage has a stable key
/// order.
pub type Formation = BTreeMap<String, Process>;

/// Scaling and sizing parameters for one process type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Process {
    /// Command override, if the process does not use the image default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,

    /// Number of instances to run.
    pub quantity: u32,

    /// Memory limit in bytes.
    pub memory: u64,

    /// Relative CPU share.
    pub cpu_share: u16,
}

impl Default for Process {
    fn default() -> Self {
        Self {
            command: None,
            quantity: 1,
            memory: 512 * 1024 * 1024,
            cpu_share: 256,
        }
    }
}
