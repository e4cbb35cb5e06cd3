//! Input walking for class analysis.
//!
//! Inputs are recognized by content, not by name: class files start with
//! `CAFEBABE`, archives (jar, war, zip) with a local zip header and jmod
//! files with their own header in front of the zip data.
//! Anything else is ignored. Directories are walked recursively in file
//! name order and archives nested in archives are opened in place.

use super::{AnalysisEngine, AnalysisError, LineBlockEngine};
use crate::coverage::CoverageBuilder;
use crate::exec::ExecutionDataStore;
use std::fs;
use std::io::{Cursor, Read};
use std::path::Path;
use tracing::{debug, trace};
use walkdir::WalkDir;
use zip::ZipArchive;

const CLASS_MAGIC: [u8; 4] = [0xCA, 0xFE, 0xBA, 0xBE];
const ZIP_MAGIC: [u8; 4] = [0x50, 0x4B, 0x03, 0x04];
/// `jmod` files are a zip archive behind a four byte header.
const JMOD_MAGIC: [u8; 4] = [0x4A, 0x4D, 0x01, 0x00];

/// Analyzes classes against a fixed execution data store.
///
/// The store is moved in on construction, so execution data loaded later
/// can never reach classes analyzed by this instance.
pub struct ClassAnalyzer<E = LineBlockEngine> {
    engine: E,
    store: ExecutionDataStore,
}

impl ClassAnalyzer<LineBlockEngine> {
    pub fn new(store: ExecutionDataStore) -> Self {
        Self::with_engine(LineBlockEngine::new(), store)
    }
}

impl<E: AnalysisEngine> ClassAnalyzer<E> {
    pub fn with_engine(engine: E, store: ExecutionDataStore) -> Self {
        Self { engine, store }
    }

    pub fn store(&self) -> &ExecutionDataStore {
        &self.store
    }

    /// Analyze a class file, an archive, or every file below a directory.
    /// Symlinks below a directory are followed. Returns the number of
    /// classes added to `builder`.
    pub fn analyze_all(
        &self,
        path: &Path,
        builder: &mut CoverageBuilder,
    ) -> Result<usize, AnalysisError> {
        if path.is_dir() {
            let mut count = 0;
            for entry in WalkDir::new(path).follow_links(true).sort_by_file_name() {
                let entry = entry?;
                if entry.file_type().is_file() {
                    count += self.analyze_file(entry.path(), builder)?;
                }
            }
            Ok(count)
        } else {
            self.analyze_file(path, builder)
        }
    }

    fn analyze_file(
        &self,
        path: &Path,
        builder: &mut CoverageBuilder,
    ) -> Result<usize, AnalysisError> {
        let location = path.display().to_string();
        let bytes = fs::read(path).map_err(|e| AnalysisError::from(e).at(location.as_str()))?;
        self.analyze_bytes(&bytes, &location, builder)
    }

    fn analyze_bytes(
        &self,
        bytes: &[u8],
        location: &str,
        builder: &mut CoverageBuilder,
    ) -> Result<usize, AnalysisError> {
        match bytes.get(..4) {
            Some(magic) if magic == CLASS_MAGIC => self.analyze_class(bytes, location, builder),
            Some(magic) if magic == ZIP_MAGIC => self.analyze_archive(bytes, location, builder),
            Some(magic) if magic == JMOD_MAGIC => {
                self.analyze_archive(&bytes[4..], location, builder)
            }
            _ => {
                trace!(location, "Ignoring content of unknown type");
                Ok(0)
            }
        }
    }

    fn analyze_class(
        &self,
        bytes: &[u8],
        location: &str,
        builder: &mut CoverageBuilder,
    ) -> Result<usize, AnalysisError> {
        let analyzed = self
            .engine
            .analyze_class(bytes, &self.store)
            .map_err(|e| e.at(location))?;
        match analyzed {
            Some(class) => {
                debug!(class = %class.name, no_match = class.no_match, "Analyzed class");
                builder.add(class).map_err(|e| e.at(location))?;
                Ok(1)
            }
            None => Ok(0),
        }
    }

    fn analyze_archive(
        &self,
        bytes: &[u8],
        location: &str,
        builder: &mut CoverageBuilder,
    ) -> Result<usize, AnalysisError> {
        let mut archive =
            ZipArchive::new(Cursor::new(bytes)).map_err(|e| AnalysisError::from(e).at(location))?;
        let mut count = 0;
        for index in 0..archive.len() {
            let mut entry = archive
                .by_index(index)
                .map_err(|e| AnalysisError::from(e).at(location))?;
            if !entry.is_file() {
                continue;
            }
            let entry_location = format!("{}@{}", location, entry.name());
            let mut buffer = Vec::new();
            entry
                .read_to_end(&mut buffer)
                .map_err(|e| AnalysisError::from(e).at(entry_location.as_str()))?;
            drop(entry);
            count += self.analyze_bytes(&buffer, &entry_location, builder)?;
        }
        Ok(count)
    }
}
