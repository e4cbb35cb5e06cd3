//! In-memory fixtures for tests.
//!
//! Builds the binary inputs the converter consumes without a compiler or a
//! running agent:
//!
//! - [`ClassFileBuilder`] / [`MethodSpec`]: minimal valid class files whose
//!   methods consist of `nop`s ending in `return`, with a `LineNumberTable`
//!   describing which lines the instructions belong to
//! - [`ExecDumpBuilder`]: execution data files recording probes for such
//!   classes
//! - [`jar`]: zip archives holding arbitrary entries
//!
//! # Example
//!
//! ```rust,ignore
//! use jacoco_lcov::testkit::{ClassFileBuilder, ExecDumpBuilder, MethodSpec};
//!
//! let class = ClassFileBuilder::new("com/example/Foo")
//!     .source_file("Foo.java")
//!     .method(MethodSpec::new("run", "()V").line(10, 2).line(11, 1))
//!     .build();
//! let exec = ExecDumpBuilder::new().class(&class, &[true, false]).build();
//! ```
//!
//! Builders panic on failure; they are meant for test code only.

use crate::analysis::{crc64, LineBlockEngine};
use crate::classfile::{parse_class, ACC_ABSTRACT, ACC_SYNTHETIC};
use crate::exec::{ExecFileWriter, SessionInfo};
use std::collections::HashMap;
use std::io::{Cursor, Write};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

const ACC_PUBLIC: u16 = 0x0001;
const ACC_SUPER: u16 = 0x0020;

const OP_NOP: u8 = 0x00;
const OP_RETURN: u8 = 0xb1;

/// One method of a generated class.
#[derive(Debug, Clone)]
pub struct MethodSpec {
    name: String,
    descriptor: String,
    access_flags: u16,
    blocks: Vec<(Option<u32>, usize)>,
    has_code: bool,
}

impl MethodSpec {
    pub fn new(name: impl Into<String>, descriptor: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            descriptor: descriptor.into(),
            access_flags: ACC_PUBLIC,
            blocks: Vec::new(),
            has_code: true,
        }
    }

    /// A method without a `Code` attribute.
    pub fn abstract_method(name: impl Into<String>, descriptor: impl Into<String>) -> Self {
        Self {
            access_flags: ACC_PUBLIC | ACC_ABSTRACT,
            has_code: false,
            ..Self::new(name, descriptor)
        }
    }

    /// Append `instructions` instructions attributed to `line`.
    pub fn line(mut self, line: u32, instructions: usize) -> Self {
        self.blocks.push((Some(line), instructions));
        self
    }

    /// Append instructions without a line number. Only meaningful before
    /// the first [`line`](Self::line) call.
    pub fn unmapped(mut self, instructions: usize) -> Self {
        self.blocks.push((None, instructions));
        self
    }

    pub fn synthetic(mut self) -> Self {
        self.access_flags |= ACC_SYNTHETIC;
        self
    }

    pub fn access(mut self, access_flags: u16) -> Self {
        self.access_flags = access_flags;
        self
    }

    /// Bytecode plus `(start_pc, line)` entries.
    fn code(&self) -> (Vec<u8>, Vec<(u16, u16)>) {
        let total: usize = self.blocks.iter().map(|&(_, n)| n).sum();
        if total == 0 {
            return (vec![OP_RETURN], Vec::new());
        }

        let mut code = vec![OP_NOP; total];
        code[total - 1] = OP_RETURN;

        let mut line_numbers = Vec::new();
        let mut pc = 0usize;
        for &(line, count) in &self.blocks {
            if let (Some(line), true) = (line, count > 0) {
                line_numbers.push((pc as u16, line as u16));
            }
            pc += count;
        }
        (code, line_numbers)
    }
}

/// Assembles a class file from [`MethodSpec`]s.
#[derive(Debug, Clone)]
pub struct ClassFileBuilder {
    name: String,
    source_file: Option<String>,
    major_version: u16,
    methods: Vec<MethodSpec>,
}

impl ClassFileBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source_file: None,
            major_version: 52,
            methods: Vec::new(),
        }
    }

    pub fn source_file(mut self, source_file: impl Into<String>) -> Self {
        self.source_file = Some(source_file.into());
        self
    }

    pub fn major_version(mut self, major_version: u16) -> Self {
        self.major_version = major_version;
        self
    }

    pub fn method(mut self, method: MethodSpec) -> Self {
        self.methods.push(method);
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let mut pool = ConstantPoolBuilder::default();
        let this_class = pool.class(&self.name);
        let super_class = pool.class("java/lang/Object");

        let mut body = Vec::new();
        put_u2(&mut body, ACC_PUBLIC | ACC_SUPER);
        put_u2(&mut body, this_class);
        put_u2(&mut body, super_class);
        put_u2(&mut body, 0); // interfaces
        put_u2(&mut body, 0); // fields

        put_u2(&mut body, self.methods.len() as u16);
        for method in &self.methods {
            write_method(&mut body, &mut pool, method);
        }

        match &self.source_file {
            Some(source_file) => {
                put_u2(&mut body, 1);
                put_u2(&mut body, pool.utf8("SourceFile"));
                put_u4(&mut body, 2);
                put_u2(&mut body, pool.utf8(source_file));
            }
            None => put_u2(&mut body, 0),
        }

        let mut out = vec![0xCA, 0xFE, 0xBA, 0xBE];
        put_u2(&mut out, 0);
        put_u2(&mut out, self.major_version);
        pool.write(&mut out);
        out.extend(body);
        out
    }
}

fn write_method(out: &mut Vec<u8>, pool: &mut ConstantPoolBuilder, method: &MethodSpec) {
    put_u2(out, method.access_flags);
    put_u2(out, pool.utf8(&method.name));
    put_u2(out, pool.utf8(&method.descriptor));
    if !method.has_code {
        put_u2(out, 0);
        return;
    }

    let (code, line_numbers) = method.code();
    let mut attribute = Vec::new();
    put_u2(&mut attribute, 1); // max_stack
    put_u2(&mut attribute, 1); // max_locals
    put_u4(&mut attribute, code.len() as u32);
    attribute.extend(&code);
    put_u2(&mut attribute, 0); // exception table
    if line_numbers.is_empty() {
        put_u2(&mut attribute, 0);
    } else {
        put_u2(&mut attribute, 1);
        put_u2(&mut attribute, pool.utf8("LineNumberTable"));
        put_u4(&mut attribute, 2 + 4 * line_numbers.len() as u32);
        put_u2(&mut attribute, line_numbers.len() as u16);
        for (start_pc, line) in line_numbers {
            put_u2(&mut attribute, start_pc);
            put_u2(&mut attribute, line);
        }
    }

    put_u2(out, 1);
    put_u2(out, pool.utf8("Code"));
    put_u4(out, attribute.len() as u32);
    out.extend(attribute);
}

#[derive(Default)]
struct ConstantPoolBuilder {
    entries: Vec<Vec<u8>>,
    utf8: HashMap<String, u16>,
    classes: HashMap<String, u16>,
}

impl ConstantPoolBuilder {
    fn push(&mut self, entry: Vec<u8>) -> u16 {
        self.entries.push(entry);
        self.entries.len() as u16
    }

    fn utf8(&mut self, value: &str) -> u16 {
        if let Some(&index) = self.utf8.get(value) {
            return index;
        }
        let mut entry = vec![1];
        put_u2(&mut entry, value.len() as u16);
        entry.extend(value.as_bytes());
        let index = self.push(entry);
        self.utf8.insert(value.to_string(), index);
        index
    }

    fn class(&mut self, name: &str) -> u16 {
        if let Some(&index) = self.classes.get(name) {
            return index;
        }
        let name_index = self.utf8(name);
        let mut entry = vec![7];
        put_u2(&mut entry, name_index);
        let index = self.push(entry);
        self.classes.insert(name.to_string(), index);
        index
    }

    fn write(&self, out: &mut Vec<u8>) {
        put_u2(out, self.entries.len() as u16 + 1);
        for entry in &self.entries {
            out.extend(entry);
        }
    }
}

fn put_u2(out: &mut Vec<u8>, value: u16) {
    out.extend(value.to_be_bytes());
}

fn put_u4(out: &mut Vec<u8>, value: u32) {
    out.extend(value.to_be_bytes());
}

/// Number of probes the built-in engine expects for `class_bytes`.
pub fn probe_count(class_bytes: &[u8]) -> usize {
    let parsed = parse_class(class_bytes).expect("fixture class must parse");
    LineBlockEngine::probe_count(&parsed)
}

/// Writes an execution data file in memory.
pub struct ExecDumpBuilder {
    writer: ExecFileWriter<Vec<u8>>,
}

impl Default for ExecDumpBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ExecDumpBuilder {
    /// Starts with a header and a session info block.
    pub fn new() -> Self {
        let mut writer = ExecFileWriter::new(Vec::new()).expect("writing to memory");
        writer
            .write_session_info(&SessionInfo {
                id: "testkit".to_string(),
                start: 0,
                dump: 0,
            })
            .expect("writing to memory");
        Self { writer }
    }

    /// Record `probes` for the class in `class_bytes`, using its real id.
    pub fn class(self, class_bytes: &[u8], probes: &[bool]) -> Self {
        let parsed = parse_class(class_bytes).expect("fixture class must parse");
        self.record(crc64::class_id(class_bytes), &parsed.name, probes)
    }

    /// Record `probes` under an arbitrary id and name.
    pub fn record(mut self, id: u64, name: &str, probes: &[bool]) -> Self {
        self.writer
            .write_execution_data(id, name, probes)
            .expect("writing to memory");
        self
    }

    pub fn build(self) -> Vec<u8> {
        self.writer.into_inner()
    }
}

/// Zip `entries` into an archive, uncompressed.
pub fn jar(entries: &[(&str, Vec<u8>)]) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
    for (name, bytes) in entries {
        writer.start_file(*name, options).expect("zip entry");
        writer.write_all(bytes).expect("zip entry");
    }
    writer.finish().expect("zip archive").into_inner()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::ExecFileLoader;

    #[test]
    fn test_constants_are_shared() {
        let once = ClassFileBuilder::new("a/A")
            .method(MethodSpec::new("run", "()V").line(1, 1))
            .build();
        let twice = ClassFileBuilder::new("a/A")
            .method(MethodSpec::new("run", "()V").line(1, 1))
            .method(MethodSpec::new("run", "()V").line(1, 1))
            .build();
        let parsed = parse_class(&twice).unwrap();
        assert_eq!(parsed.methods.len(), 2);
        // constant_pool_count follows magic and versions
        assert_eq!(twice[8..10], once[8..10]);
    }

    #[test]
    fn test_probe_count_helper() {
        let class = ClassFileBuilder::new("a/A")
            .method(MethodSpec::new("run", "()V").line(1, 2).line(2, 1))
            .build();
        assert_eq!(probe_count(&class), 2);
    }

    #[test]
    fn test_exec_dump_loads() {
        let class = ClassFileBuilder::new("a/A")
            .method(MethodSpec::new("run", "()V").line(1, 1))
            .build();
        let dump = ExecDumpBuilder::new().class(&class, &[true]).build();

        let mut loader = ExecFileLoader::new();
        loader.load(dump.as_slice()).unwrap();
        let data = loader.store().get(crc64::class_id(&class)).unwrap();
        assert_eq!(data.name, "a/A");
        assert_eq!(data.probes, vec![1]);
        assert_eq!(loader.sessions().len(), 1);
    }
}
