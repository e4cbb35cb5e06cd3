//! Conversion session.
//!
//! A [`Converter`] moves through two phases. In [`ExecPhase`] it indexes
//! source roots and merges execution data files. [`Converter::begin_class_analysis`]
//! freezes the execution data and yields a converter in [`ClassPhase`],
//! which analyzes class files and writes the report. Execution data can no
//! longer be loaded once classes have been analyzed against it.
//!
//! ```ignore
//! let mut converter = Converter::new(&ConverterConfig::default());
//! converter.add_source_path(Path::new("src/main/java"))?;
//! converter.load_exec_file(Path::new("jacoco.exec"))?;
//!
//! let mut converter = converter.begin_class_analysis();
//! converter.load_class_file(Path::new("build/classes"))?;
//! converter.write(Path::new("coverage.info"))?;
//! ```

use crate::analysis::ClassAnalyzer;
use crate::config::ConverterConfig;
use crate::coverage::CoverageBuilder;
use crate::errors::{ConvertError, Result};
use crate::exec::ExecFileLoader;
use crate::report::{LcovReportWriter, WriteSummary};
use crate::source_index::SourceIndex;
use std::path::Path;
use tracing::{debug, error, info_span};

/// Strict/lenient handling of load failures.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadPolicy {
    pub strict: bool,
}

impl LoadPolicy {
    pub fn new(strict: bool) -> Self {
        Self { strict }
    }

    /// Propagate a failure, or log and swallow it.
    ///
    /// Returns `Ok(None)` for a swallowed failure. Errors that are not
    /// recoverable propagate regardless of strictness. Propagated errors
    /// are left to the caller to report.
    pub fn apply<T>(&self, result: Result<T>) -> Result<Option<T>> {
        match result {
            Ok(value) => Ok(Some(value)),
            Err(e) if self.strict || !e.is_recoverable() => Err(e),
            Err(e) => {
                error!("{}", e);
                Ok(None)
            }
        }
    }
}

/// Indexing sources and loading execution data.
pub struct ExecPhase {
    loader: ExecFileLoader,
}

/// Analyzing classes against frozen execution data.
pub struct ClassPhase {
    analyzer: ClassAnalyzer,
    builder: CoverageBuilder,
    classfiles_loaded: usize,
}

pub struct Converter<P> {
    policy: LoadPolicy,
    test_name: Option<String>,
    index: SourceIndex,
    execfiles_loaded: usize,
    phase: P,
}

impl<P> Converter<P> {
    pub fn policy(&self) -> LoadPolicy {
        self.policy
    }

    pub fn source_index(&self) -> &SourceIndex {
        &self.index
    }

    pub fn execfiles_loaded(&self) -> usize {
        self.execfiles_loaded
    }
}

impl Converter<ExecPhase> {
    pub fn new(config: &ConverterConfig) -> Self {
        Self {
            policy: LoadPolicy::new(config.strict),
            test_name: config.test_name.clone(),
            index: SourceIndex::with_suffixes(config.source_suffixes.iter().cloned()),
            execfiles_loaded: 0,
            phase: ExecPhase {
                loader: ExecFileLoader::new(),
            },
        }
    }

    /// Index the sources below `root`. Scan failures are always fatal.
    pub fn add_source_path(&mut self, root: &Path) -> Result<usize> {
        let count = self.index.add_root(root)?;
        debug!("Indexed {} source files under {}", count, root.display());
        Ok(count)
    }

    /// Merge one execution data file.
    ///
    /// Returns whether the file loaded; a failure is `Ok(false)` unless
    /// the policy is strict.
    pub fn load_exec_file(&mut self, path: &Path) -> Result<bool> {
        debug!("Loading execfile {}", path.display());
        let result = self
            .phase
            .loader
            .load_file(path)
            .map_err(|source| ConvertError::ExecData {
                path: path.to_path_buf(),
                source,
            });
        let loaded = self.policy.apply(result)?.is_some();
        if loaded {
            self.execfiles_loaded += 1;
        }
        Ok(loaded)
    }

    /// Freeze the execution data and move on to class analysis.
    pub fn begin_class_analysis(self) -> Converter<ClassPhase> {
        let loader = self.phase.loader;
        debug!(
            classes = loader.store().len(),
            sessions = loader.sessions().len(),
            "Execution data loaded"
        );
        Converter {
            policy: self.policy,
            test_name: self.test_name,
            index: self.index,
            execfiles_loaded: self.execfiles_loaded,
            phase: ClassPhase {
                analyzer: ClassAnalyzer::new(loader.into_store()),
                builder: CoverageBuilder::new(),
                classfiles_loaded: 0,
            },
        }
    }
}

impl Converter<ClassPhase> {
    /// Analyze a class file, a directory or an archive.
    ///
    /// Returns whether the input loaded; a failure is `Ok(false)` unless
    /// the policy is strict.
    pub fn load_class_file(&mut self, path: &Path) -> Result<bool> {
        debug!("Loading classfile {}", path.display());
        let ClassPhase {
            analyzer, builder, ..
        } = &mut self.phase;
        let result = analyzer
            .analyze_all(path, builder)
            .map_err(|source| ConvertError::Classes {
                path: path.to_path_buf(),
                source,
            });
        match self.policy.apply(result)? {
            Some(count) => {
                debug!("Analyzed {} classes from {}", count, path.display());
                self.phase.classfiles_loaded += 1;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn classfiles_loaded(&self) -> usize {
        self.phase.classfiles_loaded
    }

    pub fn coverage(&self) -> &CoverageBuilder {
        &self.phase.builder
    }

    /// Write the LCOV report to `output`.
    pub fn write(&self, output: &Path) -> Result<WriteSummary> {
        let _span = info_span!("write_report", output = %output.display()).entered();
        debug!(
            "{} execfiles loaded and {} classfiles loaded.",
            self.execfiles_loaded, self.phase.classfiles_loaded
        );

        let summary = LcovReportWriter::new(&self.index)
            .strict(self.policy.strict)
            .test_name(self.test_name.clone())
            .write(output, self.phase.builder.classes())?;
        debug!(
            blocks = summary.blocks,
            skipped = summary.skipped,
            mismatched = summary.mismatched,
            "Report written"
        );
        Ok(summary)
    }
}
