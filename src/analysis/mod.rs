//! Class analysis: turning class bytes plus execution data into coverage.
//!
//! # Module Structure
//!
//! - [`crc64`] - Class id hash shared with the instrumenting agent
//! - [`engine`] - [`AnalysisEngine`] implementation mapping probes to lines
//! - [`analyzer`] - [`ClassAnalyzer`], walking class files, directories and
//!   archives and feeding the [`CoverageBuilder`](crate::coverage::CoverageBuilder)
//!
//! The engine is a trait so the probe model can be swapped without
//! touching the walk or the report.

pub mod analyzer;
pub mod crc64;
pub mod engine;

pub use analyzer::ClassAnalyzer;
pub use engine::LineBlockEngine;

use crate::classfile::ClassParseError;
use crate::coverage::ClassCoverage;
use crate::exec::ExecutionDataStore;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Walk(#[from] walkdir::Error),
    #[error(transparent)]
    Zip(#[from] zip::result::ZipError),
    #[error(transparent)]
    ClassFile(#[from] ClassParseError),
    #[error("execution data for {class} has {actual} probes, class has {expected}")]
    ProbeCount {
        class: String,
        expected: usize,
        actual: usize,
    },
    #[error("can't add different class with same name: {name}")]
    DuplicateClass { name: String },
    #[error("error while analyzing {location}: {source}")]
    Location {
        location: String,
        #[source]
        source: Box<AnalysisError>,
    },
}

impl AnalysisError {
    pub fn at(self, location: impl Into<String>) -> Self {
        Self::Location {
            location: location.into(),
            source: Box::new(self),
        }
    }
}

/// Combines the static structure of one class with its execution data.
pub trait AnalysisEngine {
    /// Returns `None` for classes without any instruction (interfaces,
    /// annotations, `module-info`).
    fn analyze_class(
        &self,
        bytes: &[u8],
        store: &ExecutionDataStore,
    ) -> Result<Option<ClassCoverage>, AnalysisError>;
}
