//! The set of instances created by this run.

use super::instance::InstanceRecord;
use crate::error::{Result, SwarmError};

/// Every instance whose runtime directory exists on disk for this run.
///
/// Appended to during startup and drained during teardown. Iteration order
/// carries no meaning.
#[derive(Debug, Default)]
pub struct FleetRegistry {
    records: Vec<InstanceRecord>,
}

impl FleetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a record, returning a handle to the stored copy.
    ///
    /// Rejects records whose runtime directory is not on disk and records
    /// whose identity is already registered.
    pub fn insert(&mut self, record: InstanceRecord) -> Result<&mut InstanceRecord> {
        if !record.runtime_dir.is_dir() {
            return Err(SwarmError::ConfigBuild(format!(
                "runtime directory '{}' for instance {} does not exist",
                record.runtime_dir.display(),
                record.id
            )));
        }
        if self.contains(&record.id) {
            return Err(SwarmError::ConfigBuild(format!(
                "instance {} is already registered",
                record.id
            )));
        }

        self.records.push(record);
        let last = self.records.len() - 1;
        Ok(&mut self.records[last])
    }

    pub fn contains(&self, id: &str) -> bool {
        self.records.iter().any(|r| r.id == id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    #[cfg(test)]
    pub fn iter(&self) -> impl Iterator<Item = &InstanceRecord> {
        self.records.iter()
    }

    /// Remove and return every record.
    pub fn drain(&mut self) -> Vec<InstanceRecord> {
        std::mem::take(&mut self.records)
    }
}
