//! Input discovery.
//!
//! Roots are walked with `walkdir`. Hidden entries and dependency/build
//! directories are pruned below a root, but a root itself is always
//! entered. Exclude globs drop files before they are read. When include
//! globs are given, only files matching one of them are kept; exclude still
//! wins over include.

use std::collections::HashSet;
use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};

use globset::GlobSet;
use tracing::{debug, warn};
use walkdir::{DirEntry, WalkDir};

use crate::config::{build_globset, Config};
use crate::error::{Error, Result};
use crate::langs::{classify, LanguageFilter, LanguageId, SAMPLE_LEN};

/// Directory names pruned during walks.
pub const PRUNED_DIRS: &[&str] = &[".git", "node_modules", "target", "vendor"];

#[derive(Debug, Clone)]
pub struct Filters {
    include: GlobSet,
    exclude: GlobSet,
    languages: LanguageFilter,
}

impl Default for Filters {
    fn default() -> Self {
        Self {
            include: GlobSet::empty(),
            exclude: GlobSet::empty(),
            languages: LanguageFilter::all(),
        }
    }
}

impl Filters {
    pub fn new(include: &[String], exclude: &[String], languages: LanguageFilter) -> Result<Self> {
        Ok(Self {
            include: build_globset(include)?,
            exclude: build_globset(exclude)?,
            languages,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(&config.include, &config.exclude, config.language_filter()?)
    }

    fn excluded(&self, relative: &str, display: &str) -> bool {
        self.exclude.is_match(relative) || self.exclude.is_match(display)
    }

    fn included(&self, relative: &str, display: &str) -> bool {
        self.include.is_empty() || self.include.is_match(relative) || self.include.is_match(display)
    }

    /// Glob verdict for one file, exclude first.
    fn selects(&self, relative: &str, display: &str) -> bool {
        !self.excluded(relative, display) && self.included(relative, display)
    }

    fn wants(&self, language: Option<LanguageId>) -> bool {
        language.map_or(true, |id| self.languages.includes(id))
    }
}

/// A file selected for analysis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourcePath {
    /// Location on disk.
    pub path: PathBuf,
    /// Reported path: `/`-separated, without a leading `./`.
    pub display: String,
}

#[derive(Debug, Default)]
pub struct Discovery {
    /// Sorted by display path, without duplicates.
    pub files: Vec<SourcePath>,
}

impl Discovery {
    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

pub fn discover<P: AsRef<Path>>(roots: &[P], filters: &Filters) -> Result<Discovery> {
    let mut seen = HashSet::new();
    let mut files = Vec::new();

    for root in roots {
        let root = root.as_ref();
        let metadata = fs::metadata(root)
            .map_err(|e| Error::config(format!("cannot access path {}: {}", root.display(), e)))?;

        if metadata.is_file() {
            let shown = display_path(root);
            let name = root
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| shown.clone());
            if !filters.selects(&name, &shown) {
                debug!(path = %shown, "filtered by globs");
                continue;
            }
            if !filters.wants(detect(root)) {
                debug!(path = %shown, "language not selected");
                continue;
            }
            push_unique(&mut files, &mut seen, root.to_path_buf(), shown);
            continue;
        }

        let walker = WalkDir::new(root)
            .follow_links(true)
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !is_pruned(e));

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(error = %e, "skipping unreadable entry");
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }

            let path = entry.path();
            let relative = path
                .strip_prefix(root)
                .map(|p| p.to_string_lossy().replace('\\', "/"))
                .unwrap_or_else(|_| display_path(path));
            let shown = display_path(path);

            if !filters.selects(&relative, &shown) {
                debug!(path = %shown, "filtered by globs");
                continue;
            }
            match detect(path) {
                Some(id) if filters.wants(Some(id)) => {
                    push_unique(&mut files, &mut seen, path.to_path_buf(), shown);
                }
                _ => {}
            }
        }
    }

    files.sort_by(|a, b| a.display.cmp(&b.display));
    Ok(Discovery { files })
}

fn push_unique(files: &mut Vec<SourcePath>, seen: &mut HashSet<PathBuf>, path: PathBuf, display: String) {
    let key = fs::canonicalize(&path).unwrap_or_else(|_| path.clone());
    if seen.insert(key) {
        files.push(SourcePath { path, display });
    }
}

fn is_pruned(entry: &DirEntry) -> bool {
    let name = entry.file_name().to_string_lossy();
    if name.starts_with('.') {
        return true;
    }
    entry.file_type().is_dir() && PRUNED_DIRS.contains(&&*name)
}

/// Classify by extension, reading a content sample only when the extension
/// alone is not conclusive.
fn detect(path: &Path) -> Option<LanguageId> {
    match classify(path, None) {
        Some(LanguageId::Typescript) | None => classify(path, read_sample(path).as_deref()),
        known => known,
    }
}

fn read_sample(path: &Path) -> Option<Vec<u8>> {
    let file = File::open(path).ok()?;
    let mut sample = Vec::with_capacity(SAMPLE_LEN);
    file.take(SAMPLE_LEN as u64).read_to_end(&mut sample).ok()?;
    Some(sample)
}

pub(crate) fn display_path(path: &Path) -> String {
    let mut display = path.to_string_lossy().replace('\\', "/");
    while let Some(rest) = display.strip_prefix("./") {
        display = rest.to_string();
    }
    display
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn touch(dir: &Path, rel: &str, content: &str) {
        let path = dir.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn names(discovery: &Discovery, root: &Path) -> Vec<String> {
        let prefix = display_path(root);
        discovery
            .files
            .iter()
            .map(|f| f.display.trim_start_matches(&prefix).trim_start_matches('/').to_string())
            .collect()
    }

    #[test]
    fn test_walk_prunes_and_sorts() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        touch(root, "src/b.go", "package b\n");
        touch(root, "src/a.py", "x = 1\n");
        touch(root, "node_modules/lib/index.ts", "export {};\n");
        touch(root, "vendor/dep/dep.go", "package dep\n");
        touch(root, ".hidden/x.rs", "fn x() {}\n");
        touch(root, "README.md", "# readme\n");
        touch(root, "bin/tool", "#!/usr/bin/env python3\nprint(1)\n");

        let discovery = discover(&[root], &Filters::default()).unwrap();
        assert_eq!(names(&discovery, root), vec!["bin/tool", "src/a.py", "src/b.go"]);
    }

    #[test]
    fn test_root_naming_pruned_dir_is_walked() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "vendor/dep/dep.go", "package dep\n");
        let vendor = dir.path().join("vendor");
        let discovery = discover(&[&vendor], &Filters::default()).unwrap();
        assert_eq!(discovery.len(), 1);
    }

    #[test]
    fn test_globs_and_language_filter() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        touch(root, "gen/types.go", "package gen\n");
        touch(root, "main.go", "package main\n");
        touch(root, "lib.rs", "fn f() {}\n");
        touch(root, "docs/notes.txt", "notes\n");

        let filters = Filters::new(&[], &["gen/**".to_string()], LanguageFilter::parse(&["go"]).unwrap()).unwrap();
        let discovery = discover(&[root], &filters).unwrap();
        assert_eq!(names(&discovery, root), vec!["main.go"]);
    }

    #[test]
    fn test_include_narrows_walk() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        touch(root, "src/a.go", "package a\n");
        touch(root, "src/gen/g.go", "package gen\n");
        touch(root, "tests/b.go", "package b\n");
        touch(root, "src/notes.txt", "notes\n");

        let filters = Filters::new(&["src/**".to_string()], &[], LanguageFilter::all()).unwrap();
        let discovery = discover(&[root], &filters).unwrap();
        assert_eq!(names(&discovery, root), vec!["src/a.go", "src/gen/g.go"]);

        let filters = Filters::new(
            &["src/**".to_string()],
            &["src/gen/**".to_string()],
            LanguageFilter::all(),
        )
        .unwrap();
        let discovery = discover(&[root], &filters).unwrap();
        assert_eq!(names(&discovery, root), vec!["src/a.go"], "exclude wins over include");
    }

    #[test]
    fn test_include_applies_to_explicit_files() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "a.go", "package a\n");
        touch(dir.path(), "b.py", "x = 1\n");
        let go = dir.path().join("a.go");
        let py = dir.path().join("b.py");

        let filters = Filters::new(&["*.go".to_string()], &[], LanguageFilter::all()).unwrap();
        let discovery = discover(&[go, py], &filters).unwrap();
        assert_eq!(discovery.len(), 1);
        assert!(discovery.files[0].display.ends_with("a.go"));
    }

    #[test]
    fn test_duplicates_removed() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "a.go", "package a\n");
        let file = dir.path().join("a.go");
        let discovery = discover(&[dir.path(), file.as_path()], &Filters::default()).unwrap();
        assert_eq!(discovery.len(), 1);
    }

    #[test]
    fn test_explicit_unknown_file_is_kept() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "notes.txt", "hello\n");
        let file = dir.path().join("notes.txt");
        let discovery = discover(&[file], &Filters::default()).unwrap();
        assert_eq!(discovery.len(), 1);
    }

    #[test]
    fn test_qt_translation_file_not_discovered() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "app_de.ts", "<?xml version=\"1.0\"?>\n<TS version=\"2.1\"></TS>\n");
        touch(dir.path(), "app.ts", "export const x = 1;\n");
        let discovery = discover(&[dir.path()], &Filters::default()).unwrap();
        assert_eq!(names(&discovery, dir.path()), vec!["app.ts"]);
    }

    #[test]
    fn test_missing_root_is_config_error() {
        let err = discover(&["/definitely/not/here"], &Filters::default()).unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn test_display_path() {
        assert_eq!(display_path(Path::new("./src/a.go")), "src/a.go");
        assert_eq!(display_path(Path::new("src/a.go")), "src/a.go");
    }
}
