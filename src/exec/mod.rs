//! Execution data: the binary probe records written by the JaCoCo agent.
//!
//! # Module Structure
//!
//! - [`reader`] - Block-level decoder, an iterator over [`Block`]s
//! - [`writer`] - Encoder for the same format (fixtures, tests)
//! - [`store`] - [`ExecutionDataStore`], merging records by class id
//!
//! # Format
//!
//! ```text
//! 0x01 header        magic u16 (0xC0C0), version u16 (0x1007)
//! 0x10 session info  id utf, start i64, dump i64
//! 0x11 exec data     class id i64, class name utf, probes bool[]
//! ```
//!
//! Several dumps may be concatenated into one file, each starting with
//! its own header block.
//!
//! # Example
//!
//! ```ignore
//! use jacoco_lcov::exec::ExecFileLoader;
//!
//! let mut loader = ExecFileLoader::new();
//! loader.load_file(Path::new("coverage.exec"))?;
//! loader.load_file(Path::new("coverage-2.exec"))?;
//! println!("{} classes", loader.store().len());
//! ```

pub mod reader;
pub mod store;
pub mod writer;

pub use reader::{Block, ExecDataReader};
pub use store::{ExecutionData, ExecutionDataStore};
pub use writer::ExecFileWriter;

use crate::mutf8::Mutf8Error;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use thiserror::Error;
use tracing::debug;

/// Block type of the file header.
pub const BLOCK_HEADER: u8 = 0x01;
/// Block type of a session info record.
pub const BLOCK_SESSIONINFO: u8 = 0x10;
/// Block type of a per-class probe record.
pub const BLOCK_EXECUTIONDATA: u8 = 0x11;

/// Magic number following the header block type.
pub const MAGIC_NUMBER: u16 = 0xC0C0;
/// Only supported format version.
pub const FORMAT_VERSION: u16 = 0x1007;

#[derive(Debug, Error)]
pub enum ExecDataError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("invalid execution data file: first block must be a header")]
    MissingHeader,
    #[error("invalid execution data magic number 0x{magic:04x}")]
    InvalidMagic { magic: u16 },
    #[error("incompatible execution data version 0x{version:04x}")]
    IncompatibleVersion { version: u16 },
    #[error("unknown block type 0x{block:02x}")]
    UnknownBlock { block: u8 },
    #[error("invalid string in execution data: {0}")]
    InvalidString(#[from] Mutf8Error),
    #[error("different class names {existing} and {incoming} for id {id:016x}")]
    NameConflict {
        id: u64,
        existing: String,
        incoming: String,
    },
    #[error("incompatible probe count for class {name} ({existing} vs {incoming})")]
    ProbeCountConflict {
        name: String,
        existing: usize,
        incoming: usize,
    },
}

/// Metadata of one agent dump.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionInfo {
    pub id: String,
    pub start: i64,
    pub dump: i64,
}

/// Reads execution data files and merges them into one store.
#[derive(Debug, Default)]
pub struct ExecFileLoader {
    store: ExecutionDataStore,
    sessions: Vec<SessionInfo>,
}

impl ExecFileLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load one file, merging its records into the store.
    ///
    /// On error, records decoded before the failing block stay merged.
    pub fn load_file(&mut self, path: &Path) -> Result<(), ExecDataError> {
        let file = File::open(path)?;
        self.load(BufReader::new(file))
    }

    pub fn load<R: Read>(&mut self, input: R) -> Result<(), ExecDataError> {
        for block in ExecDataReader::new(input) {
            match block? {
                Block::Header { .. } => {}
                Block::SessionInfo(info) => {
                    debug!(session = %info.id, start = info.start, dump = info.dump, "Session");
                    self.sessions.push(info);
                }
                Block::ExecutionData(data) => self.store.put(data)?,
            }
        }
        Ok(())
    }

    pub fn store(&self) -> &ExecutionDataStore {
        &self.store
    }

    pub fn sessions(&self) -> &[SessionInfo] {
        &self.sessions
    }

    pub fn into_store(self) -> ExecutionDataStore {
        self.store
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn dump(entries: &[(u64, &str, &[bool])]) -> Vec<u8> {
        let mut writer = ExecFileWriter::new(Vec::new()).unwrap();
        writer
            .write_session_info(&SessionInfo {
                id: "host-1".into(),
                start: 1_000,
                dump: 2_000,
            })
            .unwrap();
        for (id, name, probes) in entries {
            writer.write_execution_data(*id, name, probes).unwrap();
        }
        writer.into_inner()
    }

    #[test]
    fn test_load_collects_sessions_and_classes() {
        let bytes = dump(&[(1, "com/example/Foo", &[true, false])]);
        let mut loader = ExecFileLoader::new();
        loader.load(Cursor::new(bytes)).unwrap();

        assert_eq!(loader.sessions().len(), 1);
        assert_eq!(loader.sessions()[0].id, "host-1");
        let data = loader.store().get(1).unwrap();
        assert_eq!(data.name, "com/example/Foo");
        assert_eq!(data.probes, vec![1, 0]);
    }

    #[test]
    fn test_loading_twice_accumulates_hits() {
        let bytes = dump(&[(7, "a/B", &[true, true, false])]);
        let mut loader = ExecFileLoader::new();
        loader.load(Cursor::new(bytes.clone())).unwrap();
        loader.load(Cursor::new(bytes)).unwrap();

        assert_eq!(loader.store().get(7).unwrap().probes, vec![2, 2, 0]);
        assert_eq!(loader.sessions().len(), 2);
    }

    #[test]
    fn test_concatenated_dumps() {
        let mut bytes = dump(&[(1, "a/A", &[true])]);
        bytes.extend(dump(&[(2, "a/B", &[false, true])]));
        let mut loader = ExecFileLoader::new();
        loader.load(Cursor::new(bytes)).unwrap();

        assert_eq!(loader.store().len(), 2);
    }

    #[test]
    fn test_empty_input_is_valid() {
        let mut loader = ExecFileLoader::new();
        loader.load(Cursor::new(Vec::new())).unwrap();
        assert!(loader.store().is_empty());
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let mut loader = ExecFileLoader::new();
        let err = loader
            .load_file(Path::new("/nonexistent/coverage.exec"))
            .unwrap_err();
        assert!(matches!(err, ExecDataError::Io(_)));
    }

    #[test]
    fn test_conflicting_probe_counts_fail() {
        let mut bytes = dump(&[(3, "a/C", &[true])]);
        bytes.extend(dump(&[(3, "a/C", &[true, true])]));
        let mut loader = ExecFileLoader::new();
        let err = loader.load(Cursor::new(bytes)).unwrap_err();
        assert!(matches!(err, ExecDataError::ProbeCountConflict { .. }));
    }
}
