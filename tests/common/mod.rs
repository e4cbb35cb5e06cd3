// Test utility module for jacoco-lcov integration tests
#![allow(dead_code)]

use jacoco_lcov::testkit::{ClassFileBuilder, MethodSpec};
use lcov::Record;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Temporary directory holding the inputs and output of one conversion.
pub struct Workspace {
    dir: TempDir,
}

impl Workspace {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().unwrap(),
        }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn path(&self, relative: &str) -> PathBuf {
        self.dir.path().join(relative)
    }

    pub fn write(&self, relative: &str, contents: impl AsRef<[u8]>) -> PathBuf {
        let path = self.path(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, contents).unwrap();
        path
    }

    /// An empty source file; only its location matters.
    pub fn source(&self, relative: &str) -> PathBuf {
        self.write(relative, "")
    }

    pub fn read(&self, relative: &str) -> String {
        fs::read_to_string(self.path(relative)).unwrap()
    }
}

/// `com/example/Foo` with one method spanning lines 10 (two
/// instructions) and 11 (one instruction): two probes.
pub fn foo_class() -> Vec<u8> {
    ClassFileBuilder::new("com/example/Foo")
        .source_file("Foo.java")
        .method(MethodSpec::new("run", "()V").line(10, 2).line(11, 1))
        .build()
}

/// `com/example/Bar` with a constructor and one uncalled method.
pub fn bar_class() -> Vec<u8> {
    ClassFileBuilder::new("com/example/Bar")
        .source_file("Bar.java")
        .method(MethodSpec::new("<init>", "()V").line(3, 3))
        .method(MethodSpec::new("idle", "(I)I").line(6, 1).line(7, 2))
        .build()
}

pub fn read_records(path: &Path) -> Vec<Record> {
    lcov::Reader::open_file(path)
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap()
}
