//! Per-class coverage model and the builder that accumulates it.
//!
//! The model mirrors what the report needs and nothing more: for each
//! class its methods in declaration order, and for each method an
//! instruction counter per source line.

use crate::analysis::AnalysisError;
use std::collections::BTreeMap;

/// Instruction counter.
///
/// `hits` sums the execution counts of covered instructions, so with a
/// single load of boolean execution data it equals the number of covered
/// instructions, and it grows additively when more dumps are merged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Counter {
    pub total: u64,
    pub missed: u64,
    pub hits: u64,
}

impl Counter {
    /// Count one instruction executed `hits` times.
    pub fn record(&mut self, hits: u64) {
        self.total += 1;
        if hits == 0 {
            self.missed += 1;
        } else {
            self.hits = self.hits.saturating_add(hits);
        }
    }

    pub fn merge(&mut self, other: &Counter) {
        self.total += other.total;
        self.missed += other.missed;
        self.hits = self.hits.saturating_add(other.hits);
    }

    pub fn covered(&self) -> u64 {
        self.total - self.missed
    }

    pub fn status(&self) -> LineStatus {
        if self.total == 0 {
            LineStatus::Empty
        } else if self.missed == self.total {
            LineStatus::NotCovered
        } else if self.missed == 0 {
            LineStatus::FullyCovered
        } else {
            LineStatus::PartlyCovered
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineStatus {
    /// No instruction maps to the line
    Empty,
    NotCovered,
    PartlyCovered,
    FullyCovered,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodCoverage {
    pub name: String,
    pub descriptor: String,
    /// `None` when the method carries no line information
    pub first_line: Option<u32>,
    pub last_line: Option<u32>,
    pub counter: Counter,
    lines: BTreeMap<u32, Counter>,
}

impl MethodCoverage {
    pub fn new(name: impl Into<String>, descriptor: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            descriptor: descriptor.into(),
            first_line: None,
            last_line: None,
            counter: Counter::default(),
            lines: BTreeMap::new(),
        }
    }

    /// Count one instruction, optionally attributed to a source line.
    pub fn increment(&mut self, line: Option<u32>, hits: u64) {
        self.counter.record(hits);
        if let Some(nr) = line {
            self.lines.entry(nr).or_default().record(hits);
            self.first_line = Some(self.first_line.map_or(nr, |first| first.min(nr)));
            self.last_line = Some(self.last_line.map_or(nr, |last| last.max(nr)));
        }
    }

    /// Name plus descriptor; plain names are not unique across overloads.
    pub fn identity(&self) -> String {
        format!("{}{}", self.name, self.descriptor)
    }

    /// Counter for a line; lines without instructions are empty.
    pub fn line(&self, nr: u32) -> Counter {
        self.lines.get(&nr).copied().unwrap_or_default()
    }

    /// Every line from first to last inclusive, empty ones included.
    pub fn line_range(&self) -> impl Iterator<Item = (u32, Counter)> + '_ {
        self.first_line
            .zip(self.last_line)
            .into_iter()
            .flat_map(|(first, last)| first..=last)
            .map(move |nr| (nr, self.line(nr)))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassCoverage {
    /// VM name, e.g. `com/example/Foo`
    pub name: String,
    pub id: u64,
    /// VM package name, e.g. `com/example`
    pub package_name: String,
    /// Declared by the class's `SourceFile` attribute
    pub source_file_name: Option<String>,
    /// Execution data exists for this class name, but for a different id
    pub no_match: bool,
    pub counter: Counter,
    methods: Vec<MethodCoverage>,
}

impl ClassCoverage {
    pub fn new(name: impl Into<String>, id: u64) -> Self {
        let name = name.into();
        let package_name = name
            .rsplit_once('/')
            .map(|(package, _)| package.to_string())
            .unwrap_or_default();
        Self {
            name,
            id,
            package_name,
            source_file_name: None,
            no_match: false,
            counter: Counter::default(),
            methods: Vec::new(),
        }
    }

    pub fn with_source_file(mut self, source_file_name: Option<String>) -> Self {
        self.source_file_name = source_file_name;
        self
    }

    pub fn add_method(&mut self, method: MethodCoverage) {
        self.counter.merge(&method.counter);
        self.methods.push(method);
    }

    /// Methods in declaration order.
    pub fn methods(&self) -> &[MethodCoverage] {
        &self.methods
    }

    /// `package/SourceFile.ext`, always with a forward slash.
    pub fn source_file_key(&self) -> Option<String> {
        self.source_file_name
            .as_ref()
            .map(|file| format!("{}/{}", self.package_name, file))
    }
}

/// Accumulates analyzed classes across every class load of a run.
#[derive(Debug, Default)]
pub struct CoverageBuilder {
    classes: BTreeMap<String, ClassCoverage>,
}

impl CoverageBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Re-adding a class with the same id replaces it; the same name with
    /// a different id means two different builds were mixed.
    pub fn add(&mut self, class: ClassCoverage) -> Result<(), AnalysisError> {
        if let Some(existing) = self.classes.get(&class.name) {
            if existing.id != class.id {
                return Err(AnalysisError::DuplicateClass { name: class.name });
            }
        }
        self.classes.insert(class.name.clone(), class);
        Ok(())
    }

    /// Classes ordered by VM name.
    pub fn classes(&self) -> impl Iterator<Item = &ClassCoverage> {
        self.classes.values()
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}
