// Export modules for library usage
pub mod analysis;
pub mod classfile;
pub mod cli;
pub mod config;
pub mod coverage;
pub mod errors;
pub mod exec;
pub mod mutf8;
pub mod report;
pub mod session;
pub mod source_index;
pub mod testkit;

// Re-export commonly used types
pub use crate::analysis::{AnalysisEngine, AnalysisError, ClassAnalyzer, LineBlockEngine};
pub use crate::config::ConverterConfig;
pub use crate::coverage::{ClassCoverage, Counter, CoverageBuilder, LineStatus, MethodCoverage};
pub use crate::errors::{ConvertError, ErrorKind, Result};
pub use crate::exec::{ExecFileLoader, ExecutionData, ExecutionDataStore};
pub use crate::report::{LcovReportWriter, WriteSummary};
pub use crate::session::{ClassPhase, Converter, ExecPhase, LoadPolicy};
pub use crate::source_index::SourceIndex;
