//! Point-in-time snapshots of a running machine.
//!
//! A snapshot captures where the machine is (current state, active chain,
//! tick bookkeeping) and how it got there (transition history). Hooks and
//! handlers are not serializable, so snapshots are for inspection and
//! debugging only and cannot be turned back into a machine.

pub mod error;

pub use error::SnapshotError;

use crate::core::{StateNode, TransitionRecord};
use crate::machine::StateMachine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Version identifier of the snapshot format
pub const SNAPSHOT_VERSION: u32 = 1;

/// Serializable view of a machine.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MachineSnapshot {
    /// Snapshot format version
    pub version: u32,

    pub machine_id: Uuid,

    /// Name of the root state
    pub name: String,

    pub taken_at: DateTime<Utc>,

    pub running: bool,

    pub terminated: bool,

    /// Tick reported by the tick source when the snapshot was taken
    pub tick: u64,

    /// Transitions admitted during that tick
    pub transition_count: u32,

    /// Path of the current state, `None` after termination
    pub current_path: Option<String>,

    /// Paths of the active chain, root first
    pub active_paths: Vec<String>,

    /// Retained transition history, oldest first
    pub history: Vec<TransitionRecord>,
}

impl MachineSnapshot {
    pub fn to_json(&self) -> Result<String, SnapshotError> {
        serde_json::to_string_pretty(self)
            .map_err(|e| SnapshotError::SerializationFailed(e.to_string()))
    }

    pub fn from_json(json: &str) -> Result<Self, SnapshotError> {
        let snapshot: Self = serde_json::from_str(json)
            .map_err(|e| SnapshotError::DeserializationFailed(e.to_string()))?;
        snapshot.check_version()?;
        Ok(snapshot)
    }

    /// Compact binary encoding.
    pub fn to_bytes(&self) -> Result<Vec<u8>, SnapshotError> {
        bincode::serialize(self).map_err(|e| SnapshotError::SerializationFailed(e.to_string()))
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SnapshotError> {
        let snapshot: Self = bincode::deserialize(bytes)
            .map_err(|e| SnapshotError::DeserializationFailed(e.to_string()))?;
        snapshot.check_version()?;
        Ok(snapshot)
    }

    fn check_version(&self) -> Result<(), SnapshotError> {
        if self.version != SNAPSHOT_VERSION {
            return Err(SnapshotError::UnsupportedVersion {
                found: self.version,
                supported: SNAPSHOT_VERSION,
            });
        }
        Ok(())
    }
}

impl StateMachine {
    /// Capture the machine's current position and history.
    pub fn snapshot(&self) -> MachineSnapshot {
        let active_paths = self
            .active_path()
            .into_iter()
            .filter_map(|id| self.state(id).ok())
            .map(StateNode::path)
            .map(str::to_string)
            .collect();

        MachineSnapshot {
            version: SNAPSHOT_VERSION,
            machine_id: self.id(),
            name: self.name().to_string(),
            taken_at: Utc::now(),
            running: self.is_running(),
            terminated: self.is_terminated(),
            tick: self.tick(),
            transition_count: self.transition_count(),
            current_path: self.current_path().map(str::to_string),
            active_paths,
            history: self.history().records().cloned().collect(),
        }
    }
}
