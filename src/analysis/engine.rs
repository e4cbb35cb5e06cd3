//! Line-block probe model.
//!
//! Instructions of a method are grouped into line blocks: maximal runs of
//! consecutive instructions (in bytecode order) that map to the same
//! source line. Each block owns one probe. Probes are numbered across the
//! class in method declaration order, skipping methods without code and
//! compiler-generated synthetic methods other than lambda bodies. Every
//! instruction of a block is executed as many times as its probe fired.

use super::{crc64, AnalysisEngine, AnalysisError};
use crate::classfile::{parse_class, MethodCode, ParsedClass, ParsedMethod};
use crate::coverage::{ClassCoverage, MethodCoverage};
use crate::exec::ExecutionDataStore;
use tracing::trace;

#[derive(Debug, Clone, Copy, Default)]
pub struct LineBlockEngine;

impl LineBlockEngine {
    pub fn new() -> Self {
        Self
    }

    /// Number of probes an agent using this model records for the class.
    pub fn probe_count(class: &ParsedClass) -> usize {
        instrumented_methods(class)
            .map(|(_, code)| line_blocks(code).filter(|&(_, starts)| starts).count())
            .sum()
    }
}

impl AnalysisEngine for LineBlockEngine {
    fn analyze_class(
        &self,
        bytes: &[u8],
        store: &ExecutionDataStore,
    ) -> Result<Option<ClassCoverage>, AnalysisError> {
        let parsed = parse_class(bytes)?;
        let id = crc64::class_id(bytes);
        let data = store.get(id);
        let no_match = data.is_none() && store.contains_name(&parsed.name);

        let mut class = ClassCoverage::new(parsed.name.clone(), id)
            .with_source_file(parsed.source_file.clone());
        class.no_match = no_match;

        let mut probe = 0usize;
        for (method, code) in instrumented_methods(&parsed) {
            let mut coverage = MethodCoverage::new(method.name.clone(), method.descriptor.clone());
            let mut hits = 0;
            for (line, starts_block) in line_blocks(code) {
                if starts_block {
                    hits = data.map_or(0, |d| d.probe(probe));
                    probe += 1;
                }
                coverage.increment(line, hits);
            }
            class.add_method(coverage);
        }

        if let Some(data) = data {
            if data.probes.len() != probe {
                return Err(AnalysisError::ProbeCount {
                    class: parsed.name,
                    expected: probe,
                    actual: data.probes.len(),
                });
            }
        }

        if class.counter.total == 0 {
            trace!(class = %class.name, "Skipping class without code");
            return Ok(None);
        }
        Ok(Some(class))
    }
}

fn instrumented_methods(class: &ParsedClass) -> impl Iterator<Item = (&ParsedMethod, &MethodCode)> {
    class
        .methods
        .iter()
        .filter(|m| !m.is_synthetic() || m.name.starts_with("lambda$"))
        .filter_map(|m| m.code.as_ref().map(|code| (m, code)))
}

/// Source line of each instruction and whether it opens a new block.
fn line_blocks(code: &MethodCode) -> impl Iterator<Item = (Option<u32>, bool)> + '_ {
    let mut previous: Option<Option<u32>> = None;
    code.instructions.iter().map(move |&pc| {
        let line = code.line_for_pc(pc);
        let starts = previous != Some(line);
        previous = Some(line);
        (line, starts)
    })
}
