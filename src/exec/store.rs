//! In-memory store of execution data, merged across loads.

use super::ExecDataError;
use std::collections::{HashMap, HashSet};

/// Probe hit counts recorded for one class.
///
/// The agent records booleans; each load of a fired probe adds one, so
/// loading several dumps yields a run count per probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionData {
    /// CRC64 of the class bytes the agent instrumented
    pub id: u64,
    /// VM class name, e.g. `com/example/Foo`
    pub name: String,
    pub probes: Vec<u64>,
}

impl ExecutionData {
    pub fn from_probes(id: u64, name: impl Into<String>, probes: &[bool]) -> Self {
        Self {
            id,
            name: name.into(),
            probes: probes.iter().map(|&hit| u64::from(hit)).collect(),
        }
    }

    pub fn probe(&self, index: usize) -> u64 {
        self.probes.get(index).copied().unwrap_or(0)
    }

    /// Additive merge; both records must describe the same class.
    pub fn merge(&mut self, other: &ExecutionData) -> Result<(), ExecDataError> {
        if self.name != other.name {
            return Err(ExecDataError::NameConflict {
                id: self.id,
                existing: self.name.clone(),
                incoming: other.name.clone(),
            });
        }
        if self.probes.len() != other.probes.len() {
            return Err(ExecDataError::ProbeCountConflict {
                name: self.name.clone(),
                existing: self.probes.len(),
                incoming: other.probes.len(),
            });
        }
        for (mine, theirs) in self.probes.iter_mut().zip(&other.probes) {
            *mine = mine.saturating_add(*theirs);
        }
        Ok(())
    }
}

#[derive(Debug, Default, Clone)]
pub struct ExecutionDataStore {
    entries: HashMap<u64, ExecutionData>,
    names: HashSet<String>,
}

impl ExecutionDataStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&mut self, data: ExecutionData) -> Result<(), ExecDataError> {
        match self.entries.get_mut(&data.id) {
            Some(existing) => existing.merge(&data),
            None => {
                self.names.insert(data.name.clone());
                self.entries.insert(data.id, data);
                Ok(())
            }
        }
    }

    pub fn get(&self, id: u64) -> Option<&ExecutionData> {
        self.entries.get(&id)
    }

    /// Whether any record, under any id, exists for this class name.
    pub fn contains_name(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ExecutionData> {
        self.entries.values()
    }
}
