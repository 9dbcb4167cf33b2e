//! End-to-end analysis tests over the fixture projects in `testdata/`.

use std::fs;
use std::path::PathBuf;

use mehen::aggregate::{FileStatus, ProjectReport};
use mehen::{discover, Filters, LanguageFilter, LanguageRegistry, RunOptions, Runner};
use tempfile::TempDir;

fn testdata_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("testdata")
}

fn analyze(root: &std::path::Path, jobs: usize) -> ProjectReport {
    let discovery = discover(&[root], &Filters::default()).expect("discovery should succeed");
    let registry = LanguageRegistry::load(LanguageFilter::all()).expect("grammars should load");
    let options = RunOptions {
        jobs,
        top: 3,
        timestamp: false,
        ..RunOptions::default()
    };
    Runner::new(registry, options)
        .run(&discovery)
        .expect("run should succeed")
}

fn relative(report: &ProjectReport, root: &std::path::Path) -> Vec<String> {
    let prefix = root.to_string_lossy().replace('\\', "/");
    report
        .files
        .iter()
        .map(|f| f.path.trim_start_matches(&prefix).trim_start_matches('/').to_string())
        .collect()
}

#[test]
fn test_every_source_file_reported_once() {
    let root = testdata_path().join("project");
    let report = analyze(&root, 2);

    assert_eq!(
        relative(&report, &root),
        vec![
            "go/server.go",
            "python/inventory.py",
            "rust/tokens.rs",
            "typescript/badge.tsx",
            "typescript/cart.ts",
        ],
        "NOTES.md must not be picked up by the walk"
    );
    assert!(report.files.iter().all(|f| f.status == FileStatus::Ok));
    assert!(!report.cancelled);

    let languages: Vec<&str> = report.project_totals.languages.keys().map(|k| k.as_str()).collect();
    assert_eq!(languages, vec!["go", "python", "rust", "typescript"]);
    assert_eq!(report.project_totals.languages["typescript"].files, 2);
}

#[test]
fn test_deterministic_across_worker_counts() {
    let root = testdata_path().join("project");
    let one = analyze(&root, 1);
    let many = analyze(&root, 8);
    let again = analyze(&root, 8);

    assert_eq!(one, many);
    assert_eq!(
        serde_json::to_string(&many).unwrap(),
        serde_json::to_string(&again).unwrap(),
        "repeated runs must serialize identically"
    );
}

#[test]
fn test_if_else_if_else_scores_alike_in_all_languages() {
    let root = testdata_path().join("equivalence");
    let report = analyze(&root, 4);
    assert_eq!(report.files.len(), 4);

    for file in &report.files {
        assert_eq!(file.functions.len(), 1, "{}", file.path);
        let f = &file.functions[0];
        assert_eq!(f.name, "classify", "{}", file.path);
        assert_eq!(f.cyclomatic, 3, "cyclomatic in {}", file.path);
        assert_eq!(f.cognitive, 3, "cognitive in {}", file.path);
        assert_eq!(f.nesting_depth, 1, "nesting in {}", file.path);
    }
}

#[test]
fn test_returns_closing_each_branch_score_like_tail_expressions() {
    let root = testdata_path().join("branch_returns");
    let report = analyze(&root, 2);
    assert_eq!(report.files.len(), 4);

    for file in &report.files {
        assert_eq!(file.functions.len(), 1, "{}", file.path);
        let f = &file.functions[0];
        assert_eq!(f.name, "sign", "{}", file.path);
        assert_eq!(f.cyclomatic, 3, "cyclomatic in {}", file.path);
        assert_eq!(f.cognitive, 3, "cognitive in {}", file.path);
        assert_eq!(f.nesting_depth, 1, "nesting in {}", file.path);
    }
}

#[test]
fn test_straight_line_functions_have_base_scores() {
    let root = testdata_path().join("project");
    let report = analyze(&root, 2);

    for name in ["Version", "identity"] {
        let f = report
            .files
            .iter()
            .flat_map(|file| file.functions.iter())
            .find(|f| f.name == name)
            .unwrap_or_else(|| panic!("{} not found", name));
        assert_eq!(f.cyclomatic, 1, "{}", name);
        assert_eq!(f.cognitive, 0, "{}", name);
        assert_eq!(f.nesting_depth, 0, "{}", name);
    }
}

#[test]
fn test_top_offenders_are_the_most_complex() {
    let root = testdata_path().join("project");
    let report = analyze(&root, 2);

    assert_eq!(report.top_offenders.len(), 3);
    assert_eq!(report.top_offenders[0].name, "Route");

    let mut all: Vec<u32> = report
        .files
        .iter()
        .flat_map(|f| f.functions.iter().map(|m| m.cognitive))
        .collect();
    all.sort_unstable_by(|a, b| b.cmp(a));
    let top: Vec<u32> = report.top_offenders.iter().map(|o| o.cognitive).collect();
    assert_eq!(top, all[..3].to_vec());
}

#[test]
fn test_one_broken_file_does_not_affect_the_rest() {
    let dir = TempDir::new().unwrap();
    for i in 0..9 {
        fs::write(
            dir.path().join(format!("ok_{}.py", i)),
            "def f(x):\n    if x:\n        return 1\n    return 0\n",
        )
        .unwrap();
    }
    fs::write(dir.path().join("zz_broken.py"), "def broken(:\n    return\n").unwrap();

    let report = analyze(dir.path(), 4);
    assert_eq!(report.files.len(), 10);

    let ok: Vec<_> = report.files.iter().filter(|f| f.status == FileStatus::Ok).collect();
    assert_eq!(ok.len(), 9);
    for file in ok {
        assert_eq!(file.functions.len(), 1);
        assert_eq!(file.functions[0].cyclomatic, 2);
        assert!(file.functions[0].halstead.volume > 0.0);
    }

    let broken = report.files.last().unwrap();
    assert!(broken.path.ends_with("zz_broken.py"));
    assert_ne!(broken.status, FileStatus::Ok);
    assert!(broken.error.is_some());
}

#[test]
fn test_language_filter_omits_other_languages() {
    let root = testdata_path().join("project");
    let discovery = discover(
        &[&root],
        &Filters::new(&[], &[], LanguageFilter::parse(&["rust"]).unwrap()).unwrap(),
    )
    .unwrap();
    assert_eq!(discovery.len(), 1);
    assert!(discovery.files[0].display.ends_with("rust/tokens.rs"));
}

#[test]
fn test_bom_and_crlf_sources() {
    let dir = TempDir::new().unwrap();
    let mut bytes = vec![0xEF, 0xBB, 0xBF];
    bytes.extend_from_slice(b"def f(x):\r\n    if x:\r\n        return 1\r\n    return 0\r\n");
    fs::write(dir.path().join("bom.py"), bytes).unwrap();
    fs::write(dir.path().join("utf16.py"), [0xFF, 0xFE, b'd', 0, b'e', 0]).unwrap();

    let report = analyze(dir.path(), 1);
    let bom = &report.files[0];
    assert_eq!(bom.status, FileStatus::Ok);
    assert_eq!(bom.functions[0].cyclomatic, 2);
    assert_eq!(bom.functions[0].start_line, 1);

    let utf16 = &report.files[1];
    assert_eq!(utf16.status, FileStatus::Failed);
}
