//! LCOV serialization of the aggregated class coverage.
//!
//! One block per class whose source file resolves through the
//! [`SourceIndex`]. Within a block all `FN` records precede all `FNDA`
//! records, and every `DA` record is followed by the line totals:
//!
//! ```text
//! TN:<label>
//! SF:<absolute source path>
//! FN:<first line>,<name><descriptor>
//! FNDA:<hits>,<name><descriptor>
//! FNF:<methods found>
//! FNH:<methods hit>
//! DA:<line>,<hits>
//! LH:<lines hit>
//! LF:<lines found>
//! end_of_record
//! ```

use crate::coverage::{ClassCoverage, LineStatus, MethodCoverage};
use crate::errors::{ConvertError, Result};
use crate::source_index::SourceIndex;
use lcov::Record;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum RenderError {
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error("Mismatch in coverage data for {class}")]
    Mismatch { class: String },
}

/// Totals over everything written.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteSummary {
    /// `SF` ... `end_of_record` blocks written
    pub blocks: usize,
    /// Classes left out because their source file did not resolve
    pub skipped: usize,
    /// Classes flagged as mismatched and written anyway
    pub mismatched: usize,
    pub functions_found: usize,
    pub functions_hit: usize,
    pub lines_found: usize,
    pub lines_hit: usize,
}

/// Found/hit pair for one block.
#[derive(Debug, Clone, Copy, Default)]
struct Tally {
    found: u32,
    hit: u32,
}

impl Tally {
    fn count(&mut self, hits: u64) {
        self.found += 1;
        if hits > 0 {
            self.hit += 1;
        }
    }
}

pub struct LcovReportWriter<'a> {
    index: &'a SourceIndex,
    strict: bool,
    test_name: Option<String>,
}

impl<'a> LcovReportWriter<'a> {
    pub fn new(index: &'a SourceIndex) -> Self {
        Self {
            index,
            strict: false,
            test_name: None,
        }
    }

    /// Fail on the first mismatched class instead of writing it.
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// `TN` label; defaults to the output file name.
    pub fn test_name(mut self, test_name: Option<String>) -> Self {
        self.test_name = test_name;
        self
    }

    /// Create `path` and write the report to it.
    pub fn write<'c>(
        &self,
        path: &Path,
        classes: impl IntoIterator<Item = &'c ClassCoverage>,
    ) -> Result<WriteSummary> {
        let write_error = |source: io::Error| ConvertError::Write {
            path: path.to_path_buf(),
            source,
        };
        let label = self.test_name.clone().unwrap_or_else(|| {
            path.file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default()
        });

        let file = File::create(path).map_err(write_error)?;
        let mut out = BufWriter::new(file);
        let summary = self
            .render(&label, classes, &mut out)
            .map_err(|e| match e {
                RenderError::Io(source) => write_error(source),
                RenderError::Mismatch { class } => ConvertError::Mismatch { class },
            })?;
        out.flush().map_err(write_error)?;
        Ok(summary)
    }

    /// Serialize `classes` in iteration order to `out`.
    pub fn render<'c, W: Write>(
        &self,
        test_name: &str,
        classes: impl IntoIterator<Item = &'c ClassCoverage>,
        out: &mut W,
    ) -> std::result::Result<WriteSummary, RenderError> {
        writeln!(
            out,
            "{}",
            Record::TestName {
                name: test_name.to_string()
            }
        )?;

        let mut summary = WriteSummary::default();
        for class in classes {
            if class.no_match {
                if self.strict {
                    return Err(RenderError::Mismatch {
                        class: class.name.clone(),
                    });
                }
                warn!("Mismatch in coverage data for {}", class.name);
                summary.mismatched += 1;
            }

            let Some(source) = self.resolve(class) else {
                summary.skipped += 1;
                continue;
            };

            let (functions, lines) = write_block(out, &source, class.methods())?;
            summary.blocks += 1;
            summary.functions_found += functions.found as usize;
            summary.functions_hit += functions.hit as usize;
            summary.lines_found += lines.found as usize;
            summary.lines_hit += lines.hit as usize;
        }
        Ok(summary)
    }

    fn resolve(&self, class: &ClassCoverage) -> Option<PathBuf> {
        let Some(key) = class.source_file_key() else {
            debug!(class = %class.name, "No source file attribute, skipping");
            return None;
        };
        self.index.resolve(&key).map(Path::to_path_buf)
    }
}

fn write_block<W: Write>(
    out: &mut W,
    source: &Path,
    methods: &[MethodCoverage],
) -> io::Result<(Tally, Tally)> {
    writeln!(
        out,
        "{}",
        Record::SourceFile {
            path: source.to_path_buf()
        }
    )?;

    for method in methods {
        match method.first_line {
            Some(start_line) => writeln!(
                out,
                "{}",
                Record::FunctionName {
                    name: method.identity(),
                    start_line,
                }
            )?,
            None => writeln!(out, "FN:-1,{}", method.identity())?,
        }
    }

    let mut functions = Tally::default();
    for method in methods {
        let count = method.counter.hits;
        writeln!(
            out,
            "{}",
            Record::FunctionData {
                name: method.identity(),
                count,
            }
        )?;
        functions.count(count);
    }
    writeln!(out, "{}", Record::FunctionsFound { found: functions.found })?;
    writeln!(out, "{}", Record::FunctionsHit { hit: functions.hit })?;

    let mut lines = Tally::default();
    for method in methods {
        for (line, counter) in method.line_range() {
            if counter.status() == LineStatus::Empty {
                continue;
            }
            writeln!(
                out,
                "{}",
                Record::LineData {
                    line,
                    count: counter.hits,
                    checksum: None,
                }
            )?;
            lines.count(counter.hits);
        }
    }
    writeln!(out, "{}", Record::LinesHit { hit: lines.hit })?;
    writeln!(out, "{}", Record::LinesFound { found: lines.found })?;
    writeln!(out, "{}", Record::EndOfRecord)?;

    Ok((functions, lines))
}
