//! Cross-stage pipeline scenarios: the end-to-end behaviors that individual
//! module tests cannot see (score/clean interplay, archive round-trips,
//! property-level determinism and idempotency).

use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;
use std::sync::atomic::AtomicBool;

use proptest::prelude::*;

use crate::cleaner::{ActionKind, CleanOptions, clean};
use crate::core::tree::FileEntry;
use crate::pipeline::{Pipeline, PipelineOptions, archive_destination};
use crate::scanner::patterns::PatternRegistry;
use crate::scanner::scan::{ScanOptions, scan};
use crate::scanner::scoring::{BuildSignals, Grade, score};

fn scan_files(files: &[FileEntry]) -> crate::scanner::report::ScanReport {
    scan(
        files,
        &PatternRegistry::builtin(),
        &ScanOptions::default(),
        &AtomicBool::new(false),
    )
    .expect("scan")
}

fn clean_files(files: &[FileEntry]) -> crate::cleaner::CleanOutcome {
    let registry = PatternRegistry::builtin();
    let report = scan_files(files);
    clean(
        files,
        &report,
        &registry,
        &CleanOptions::default(),
        &AtomicBool::new(false),
    )
    .expect("clean")
}

fn pipeline_options(output_dir: std::path::PathBuf) -> PipelineOptions {
    PipelineOptions {
        project_name: "demo".to_string(),
        output_dir,
        dry_run: false,
        no_archive: false,
        parallelism: 2,
        max_file_size_bytes: 4 * 1_048_576,
    }
}

#[test]
fn scenario_a_single_critical_marker_on_line_three() {
    let files = vec![FileEntry::text(
        "index.html",
        "<html>\n<head>\n<script src=\"https://cdn.gpteng.co/gptengineer.js\"></script>\n</head>\n</html>\n",
    )];

    let report = scan_files(&files);
    assert_eq!(report.by_severity.critical, 1);
    assert_eq!(report.issues[0].line, 3);

    let result = score(&report, &BuildSignals::default());
    assert_eq!(result.value, 90);
    assert_eq!(result.grade, Grade::MinorCleanup);

    let outcome = clean_files(&files);
    let action = outcome
        .actions
        .iter()
        .find(|a| a.path == "index.html")
        .expect("action");
    assert!(matches!(
        action.kind,
        ActionKind::Removed | ActionKind::Rewritten
    ));

    let rescan = scan_files(&outcome.files);
    assert_eq!(rescan.by_severity.critical, 0);
}

#[test]
fn scenario_b_ten_majors_with_all_signals_failing() {
    let files: Vec<FileEntry> = (0..10)
        .map(|index| {
            FileEntry::text(
                format!("docs/page-{index}.md"),
                "Built with Lovable\n",
            )
        })
        .collect();

    let report = scan_files(&files);
    assert_eq!(report.by_severity.major, 10);
    assert_eq!(report.by_severity.critical, 0);

    let signals = BuildSignals {
        minified: false,
        chunk_names_hashed: false,
        sourcemaps_disabled: false,
        dev_tooling_gated: false,
    };
    let result = score(&report, &signals);
    assert_eq!(result.value, 62);
    assert_eq!(result.grade, Grade::ModerateCleanup);
}

#[test]
fn scenario_c_vendor_directory_is_always_removed_never_rewritten() {
    // Innocent content in a vendor directory still goes.
    let files = vec![
        FileEntry::text(".lovable/README.md", "nothing vendor-specific here\n"),
        FileEntry::new(".gpt_engineer/blob.bin", vec![0, 1, 2]),
    ];
    let outcome = clean_files(&files);
    assert!(outcome.files.is_empty());
    for action in &outcome.actions {
        assert_eq!(action.kind, ActionKind::Removed, "{} must be removed", action.path);
    }
}

#[test]
fn scenario_d_dry_run_reports_without_writing() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let output_dir = tmp.path().join("app-liberated");
    let mut options = pipeline_options(output_dir.clone());
    options.dry_run = true;

    let files = vec![
        FileEntry::text("src/api.ts", "const c = createClient({ appId: \"0123456789abcdef01234567\" });\n"),
        FileEntry::text("README.md", "Built with Lovable\n"),
    ];
    let run = Pipeline::new()
        .run(&files, &options, &AtomicBool::new(false))
        .expect("run");

    assert!(!output_dir.exists());
    assert!(!archive_destination(&output_dir).exists());
    // The client-construction line trips both the stub rule and the
    // credential rule; every occurrence counts.
    assert_eq!(run.scan_report.by_severity.critical, 2);
    assert_eq!(run.scan_report.by_severity.major, 1);
    assert_eq!(run.score.value, 78);
    assert!(run.report.archive.is_none());
}

#[test]
fn cleaning_never_increases_critical_count() {
    let files = vec![
        FileEntry::text("src/api.ts", "import { createClient } from \"@base44/sdk\";\nconst c = createClient({ appId: \"0123456789abcdef01234567\" });\n"),
        FileEntry::text("index.html", "<script src=\"https://cdn.gpteng.co/g.js\"></script>\n"),
        FileEntry::text(".env", "VITE_BASE44_APP_ID=abc123\n"),
        FileEntry::text("README.md", "This app runs on the Base44 platform.\n"),
    ];
    let before = scan_files(&files);
    let outcome = clean_files(&files);
    let after = scan_files(&outcome.files);
    assert!(
        after.by_severity.critical <= before.by_severity.critical,
        "critical count must not grow: {} -> {}",
        before.by_severity.critical,
        after.by_severity.critical
    );
    assert_eq!(after.by_severity.critical, 0);
}

#[test]
fn archive_round_trip_reproduces_the_output_tree() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let output_dir = tmp.path().join("demo-liberated");
    let files = vec![
        FileEntry::text("index.html", "<html><body>app</body></html>\n"),
        FileEntry::text("src/main.tsx", "export {};\n"),
        FileEntry::text("empty.txt", ""),
    ];
    let run = Pipeline::new()
        .run(&files, &pipeline_options(output_dir.clone()), &AtomicBool::new(false))
        .expect("run");

    let archive_info = run.archive.expect("archive produced");
    let expected: BTreeMap<String, Vec<u8>> = run
        .clean
        .expect("cleaned")
        .files
        .iter()
        .map(|f| (format!("demo/{}", f.path), f.content.clone()))
        .collect();

    let file = std::fs::File::open(&archive_info.path).expect("open archive");
    let mut tar = tar::Archive::new(flate2::read::GzDecoder::new(file));
    let mut extracted = BTreeMap::new();
    for entry in tar.entries().expect("entries") {
        let mut entry = entry.expect("entry");
        let path = entry
            .path()
            .expect("path")
            .to_string_lossy()
            .into_owned();
        let mut content = Vec::new();
        entry.read_to_end(&mut content).expect("read");
        extracted.insert(path, content);
    }

    assert_eq!(extracted, expected);
}

#[test]
fn liberate_output_contains_polyfill_and_artifacts_on_disk() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let output_dir = tmp.path().join("demo-liberated");
    let files = vec![FileEntry::text(
        "src/api.ts",
        "import { createClient } from \"@base44/sdk\";\nexport const client = createClient({ appId: \"0123456789abcdef01234567\" });\n",
    )];
    Pipeline::new()
        .run(&files, &pipeline_options(output_dir.clone()), &AtomicBool::new(false))
        .expect("run");

    assert!(output_dir.join("src/lib/local-client.js").exists());
    assert!(output_dir.join("Dockerfile").exists());
    assert!(output_dir.join("nginx.conf").exists());
    let sidecar = Path::new(&archive_destination(&output_dir)).with_file_name("demo-liberated.tar.gz.sha256");
    assert!(sidecar.exists());
}

// ──────────────────── property-level checks ────────────────────

/// Fragments that may or may not trip rules, mixed into generated files.
fn line_fragment() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("const x = 1;".to_string()),
        Just("Built with Lovable".to_string()),
        Just("<script src=\"https://cdn.gpteng.co/g.js\"></script>".to_string()),
        Just("appId: \"0123456789abcdef01234567\"".to_string()),
        Just("plain prose line".to_string()),
        Just(String::new()),
        Just("window.__LOVABLE_TELEMETRY__.send()".to_string()),
    ]
}

fn generated_tree() -> impl Strategy<Value = Vec<FileEntry>> {
    proptest::collection::vec(proptest::collection::vec(line_fragment(), 0..12), 1..6).prop_map(
        |files| {
            files
                .into_iter()
                .enumerate()
                .map(|(index, lines)| {
                    let mut content = lines.join("\n");
                    content.push('\n');
                    FileEntry::text(format!("src/gen-{index}.ts"), &content)
                })
                .collect()
        },
    )
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn scan_is_deterministic(files in generated_tree()) {
        let first = scan_files(&files);
        let second = scan_files(&files);
        prop_assert_eq!(first, second);
    }

    #[test]
    fn clean_is_idempotent_on_generated_trees(files in generated_tree()) {
        let once = clean_files(&files);
        let twice = clean_files(&once.files);
        prop_assert_eq!(&once.files, &twice.files);
    }

    #[test]
    fn clean_monotonically_reduces_criticals(files in generated_tree()) {
        let before = scan_files(&files);
        let outcome = clean_files(&files);
        let after = scan_files(&outcome.files);
        prop_assert!(after.by_severity.critical <= before.by_severity.critical);
    }
}
