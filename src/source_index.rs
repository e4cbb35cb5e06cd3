//! Index of source files found under the configured source roots.
//!
//! Classes only know `package/File.ext`; the index maps the bare file name
//! to every absolute path registered under it, and resolution picks the
//! candidate whose trailing path components spell out the full key.
//! Candidates are kept sorted, so when several roots contain the same
//! relative path the lexicographically smallest absolute path wins.

use crate::errors::{ConvertError, Result};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use tracing::{debug, trace};
use walkdir::{DirEntry, WalkDir};

pub const DEFAULT_SOURCE_SUFFIXES: &[&str] = &[".java", ".kt"];

#[derive(Debug, Clone)]
pub struct SourceIndex {
    suffixes: Vec<String>,
    files: BTreeMap<String, BTreeSet<PathBuf>>,
}

impl Default for SourceIndex {
    fn default() -> Self {
        Self::with_suffixes(DEFAULT_SOURCE_SUFFIXES.iter().map(|s| s.to_string()))
    }
}

impl SourceIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_suffixes<I, S>(suffixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            suffixes: suffixes.into_iter().map(Into::into).collect(),
            files: BTreeMap::new(),
        }
    }

    /// Register every matching regular file below `root`, including
    /// symlinks to regular files. Returns the number of files found.
    pub fn add_root(&mut self, root: &Path) -> Result<usize> {
        let scan_error = |source: std::io::Error| ConvertError::SourcePath {
            path: root.to_path_buf(),
            source,
        };
        let absolute_root = std::path::absolute(root).map_err(scan_error)?;

        let mut added = 0;
        for entry in WalkDir::new(&absolute_root) {
            let entry = entry.map_err(|e| scan_error(e.into()))?;
            if !is_regular_file(&entry) {
                continue;
            }
            let name = entry.file_name().to_string_lossy();
            if !self.has_source_suffix(&name) {
                continue;
            }
            trace!(path = %entry.path().display(), "Found source file");
            self.insert(name.into_owned(), entry.path().to_path_buf());
            added += 1;
        }
        debug!(root = %root.display(), files = added, "Indexed source root");
        Ok(added)
    }

    pub fn insert(&mut self, file_name: String, path: PathBuf) {
        self.files.entry(file_name).or_default().insert(path);
    }

    /// Resolve `package/File.ext` to an indexed absolute path.
    ///
    /// A leading `/` (classes in the default package) is ignored.
    pub fn resolve(&self, key: &str) -> Option<&Path> {
        let relative = Path::new(key.trim_start_matches('/'));
        let file_name = relative.file_name()?.to_str()?;
        let found = self
            .files
            .get(file_name)?
            .iter()
            .find(|candidate| candidate.ends_with(relative))
            .map(PathBuf::as_path);
        match found {
            Some(path) => debug!("{} matched to {}", key, path.display()),
            None => debug!("{} did not match any source path", key),
        }
        found
    }

    /// Every path registered under a bare file name.
    pub fn candidates(&self, file_name: &str) -> impl Iterator<Item = &Path> {
        self.files
            .get(file_name)
            .into_iter()
            .flatten()
            .map(PathBuf::as_path)
    }

    /// Number of indexed files.
    pub fn len(&self) -> usize {
        self.files.values().map(BTreeSet::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    fn has_source_suffix(&self, name: &str) -> bool {
        self.suffixes.iter().any(|suffix| name.ends_with(suffix.as_str()))
    }
}

/// Symlinked files are indexed under the link's own path.
fn is_regular_file(entry: &DirEntry) -> bool {
    entry.file_type().is_file() || (entry.path_is_symlink() && entry.path().is_file())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::fs;
    use tempfile::TempDir;

    fn touch(root: &Path, relative: &str) {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "").unwrap();
    }

    #[test]
    fn test_add_root_filters_by_suffix() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "com/example/Foo.java");
        touch(dir.path(), "com/example/Bar.kt");
        touch(dir.path(), "com/example/notes.txt");
        touch(dir.path(), "com/example/Foo.class");

        let mut index = SourceIndex::new();
        assert_eq!(index.add_root(dir.path()).unwrap(), 2);
        assert_eq!(index.len(), 2);
        assert!(index.resolve("com/example/Foo.java").is_some());
        assert!(index.resolve("com/example/Bar.kt").is_some());
    }

    #[test]
    fn test_resolve_requires_package_directories() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "com/other/Foo.java");
        touch(dir.path(), "src/com/example/Foo.java");

        let mut index = SourceIndex::new();
        index.add_root(dir.path()).unwrap();

        let resolved = index.resolve("com/example/Foo.java").unwrap();
        assert!(resolved.ends_with("src/com/example/Foo.java"));
        assert!(resolved.is_absolute());
        assert!(index.resolve("org/example/Foo.java").is_none());
        assert_eq!(index.candidates("Foo.java").count(), 2);
    }

    #[test]
    fn test_resolve_matches_whole_components() {
        let mut index = SourceIndex::new();
        index.insert("Foo.java".into(), PathBuf::from("/src/xcom/example/Foo.java"));
        assert!(index.resolve("com/example/Foo.java").is_none());
    }

    #[test]
    fn test_default_package_key() {
        let mut index = SourceIndex::new();
        index.insert("Main.java".into(), PathBuf::from("/work/src/Main.java"));
        assert_eq!(
            index.resolve("/Main.java"),
            Some(Path::new("/work/src/Main.java"))
        );
    }

    #[test]
    fn test_ambiguous_candidates_resolve_lexicographically() {
        let mut index = SourceIndex::new();
        index.insert("Foo.java".into(), PathBuf::from("/b/com/example/Foo.java"));
        index.insert("Foo.java".into(), PathBuf::from("/a/com/example/Foo.java"));
        assert_eq!(
            index.resolve("com/example/Foo.java"),
            Some(Path::new("/a/com/example/Foo.java"))
        );
    }

    #[test]
    fn test_custom_suffixes() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "a/B.groovy");
        touch(dir.path(), "a/C.java");

        let mut index = SourceIndex::with_suffixes([".groovy"]);
        assert_eq!(index.add_root(dir.path()).unwrap(), 1);
        assert!(index.resolve("a/B.groovy").is_some());
        assert!(index.resolve("a/C.java").is_none());
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinked_source_file_is_indexed() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "shared/Foo.java");
        fs::create_dir_all(dir.path().join("src/com/example")).unwrap();
        std::os::unix::fs::symlink(
            dir.path().join("shared/Foo.java"),
            dir.path().join("src/com/example/Foo.java"),
        )
        .unwrap();
        std::os::unix::fs::symlink(
            dir.path().join("missing/Gone.java"),
            dir.path().join("src/com/example/Gone.java"),
        )
        .unwrap();

        let mut index = SourceIndex::new();
        assert_eq!(index.add_root(&dir.path().join("src")).unwrap(), 1);
        let resolved = index.resolve("com/example/Foo.java").unwrap();
        assert!(resolved.ends_with("src/com/example/Foo.java"));
        assert!(index.resolve("com/example/Gone.java").is_none());
    }

    #[test]
    fn test_missing_root_is_error() {
        let mut index = SourceIndex::new();
        let err = index.add_root(Path::new("/nonexistent/src")).unwrap_err();
        assert_eq!(err.kind(), crate::errors::ErrorKind::SourceIndex);
    }

    fn segment() -> impl Strategy<Value = String> {
        prop::sample::select(vec!["com", "org", "example", "util", "src", "main", "java"])
            .prop_map(str::to_string)
    }

    proptest! {
        /// Property: a resolved path always ends with the requested key.
        #[test]
        fn resolve_never_returns_non_matching_path(
            paths in prop::collection::vec(
                (
                    prop::collection::vec(segment(), 0..4),
                    prop::sample::select(vec!["Foo.java", "Bar.kt"]),
                ),
                0..12,
            ),
            key_dirs in prop::collection::vec(segment(), 0..3),
            key_file in prop::sample::select(vec!["Foo.java", "Bar.kt"]),
        ) {
            let mut index = SourceIndex::new();
            for (dirs, file) in &paths {
                let mut path = PathBuf::from("/root");
                path.extend(dirs);
                path.push(file);
                index.insert(file.to_string(), path);
            }
            let key = format!("{}/{}", key_dirs.join("/"), key_file);

            if let Some(resolved) = index.resolve(&key) {
                let relative = key.trim_start_matches('/');
                prop_assert!(resolved.ends_with(relative));
                prop_assert!(resolved.to_string_lossy().ends_with(relative));
            }
        }
    }
}
