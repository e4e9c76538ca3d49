//! Integration tests: CLI smoke tests and full-pipeline runs through the
//! spawned `plh` binary.

mod common;

use serde_json::Value;

fn parse_json_line(result: &common::CmdResult) -> Value {
    serde_json::from_str(result.stdout.trim()).unwrap_or_else(|err| {
        panic!(
            "stdout is not a single JSON line ({err}); log: {}",
            result.log_path.display()
        )
    })
}

#[test]
fn help_command_prints_usage() {
    let result = common::run_cli_case("help_command_prints_usage", &["--help"]);
    assert!(
        result.status.success(),
        "expected success; log: {}",
        result.log_path.display()
    );
    assert!(
        result.stdout.contains("Usage: plh [OPTIONS] <COMMAND>"),
        "missing help banner; log: {}",
        result.log_path.display()
    );
}

#[test]
fn version_command_prints_version() {
    let result = common::run_cli_case("version_command_prints_version", &["--version"]);
    assert!(
        result.status.success(),
        "expected success; log: {}",
        result.log_path.display()
    );
    assert!(
        result.stdout.contains("plh") || result.stdout.contains("project_liberation_helper"),
        "missing version output; log: {}",
        result.log_path.display()
    );
}

#[test]
fn subcommand_help_flags_work() {
    for subcmd in ["scan", "audit", "liberate", "version", "completions"] {
        let case_name = format!("subcommand_{subcmd}_help");
        let result = common::run_cli_case(&case_name, &[subcmd, "--help"]);
        assert!(
            result.status.success(),
            "subcommand '{subcmd} --help' failed; log: {}",
            result.log_path.display()
        );
        assert!(
            result.stdout.contains("Usage") || result.stdout.contains("usage"),
            "subcommand '{subcmd} --help' missing usage info; log: {}",
            result.log_path.display()
        );
    }
}

#[test]
fn scan_missing_path_exits_one() {
    let result = common::run_cli_case(
        "scan_missing_path_exits_one",
        &["scan", "/nonexistent/exported-app"],
    );
    assert_eq!(
        result.status.code(),
        Some(1),
        "missing input must be a user error; log: {}",
        result.log_path.display()
    );
    assert!(
        result.stderr.contains("PLH-2001"),
        "stderr should carry the input error code; log: {}",
        result.log_path.display()
    );
}

#[test]
fn scan_reports_issues_as_json() {
    let tmp = tempfile::tempdir().expect("tempdir");
    common::locked_in_fixture(tmp.path());

    let result = common::run_cli_case(
        "scan_reports_issues_as_json",
        &["scan", tmp.path().to_str().expect("utf8 path"), "--json"],
    );
    assert!(
        result.status.success(),
        "scan should succeed; log: {}",
        result.log_path.display()
    );

    let payload = parse_json_line(&result);
    assert_eq!(payload["command"], "scan");
    assert_eq!(payload["report"]["by_severity"]["critical"], 5);
    assert_eq!(payload["report"]["by_severity"]["major"], 1);
    let flagged = payload["report"]["flagged_paths"]
        .as_array()
        .expect("flagged_paths array");
    assert!(
        flagged.iter().any(|p| p == ".lovable/state.json"),
        "vendor workspace dir should be flagged; log: {}",
        result.log_path.display()
    );
}

#[test]
fn audit_gate_rejects_with_exit_code_four() {
    let tmp = tempfile::tempdir().expect("tempdir");
    common::locked_in_fixture(tmp.path());

    let result = common::run_cli_case(
        "audit_gate_rejects_with_exit_code_four",
        &["audit", tmp.path().to_str().expect("utf8 path"), "--gate"],
    );
    assert_eq!(
        result.status.code(),
        Some(4),
        "below-threshold gate must use the policy exit code; log: {}",
        result.log_path.display()
    );
    assert!(
        result.stderr.contains("below gate threshold"),
        "gate rejection should name the threshold; log: {}",
        result.log_path.display()
    );
}

#[test]
fn audit_gate_passes_a_clean_tree() {
    let tmp = tempfile::tempdir().expect("tempdir");
    common::write_fixture_tree(
        tmp.path(),
        &[
            ("index.html", "<!doctype html>\n<body></body>\n"),
            ("src/main.tsx", "export {};\n"),
        ],
    );

    let result = common::run_cli_case(
        "audit_gate_passes_a_clean_tree",
        &[
            "audit",
            tmp.path().to_str().expect("utf8 path"),
            "--gate",
            "--min-score",
            "95",
            "--json",
        ],
    );
    assert!(
        result.status.success(),
        "clean tree must pass the gate; log: {}",
        result.log_path.display()
    );

    let payload = parse_json_line(&result);
    assert_eq!(payload["score"], 100);
    assert_eq!(payload["grade"], "fully-compliant");
    assert_eq!(payload["gate"]["enforced"], true);
    assert_eq!(payload["gate"]["threshold"], 95);
}

#[test]
fn liberate_dry_run_writes_nothing() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let project = tmp.path().join("app");
    std::fs::create_dir_all(&project).expect("mkdir");
    common::locked_in_fixture(&project);
    let output_dir = tmp.path().join("app-out");

    let result = common::run_cli_case(
        "liberate_dry_run_writes_nothing",
        &[
            "liberate",
            project.to_str().expect("utf8 path"),
            "--output",
            output_dir.to_str().expect("utf8 path"),
            "--dry-run",
            "--json",
        ],
    );
    assert!(
        result.status.success(),
        "dry run should succeed; log: {}",
        result.log_path.display()
    );
    assert!(
        !output_dir.exists(),
        "dry run must not create the output dir; log: {}",
        result.log_path.display()
    );
    assert!(
        !tmp.path().join("app-out.tar.gz").exists(),
        "dry run must not archive; log: {}",
        result.log_path.display()
    );

    let payload = parse_json_line(&result);
    assert_eq!(payload["dry_run"], true);
    assert_eq!(payload["by_severity"]["critical"], 5);
    assert!(payload["score"].is_u64());
    assert!(payload.get("archive").is_none());
}

#[test]
fn liberate_produces_cleaned_tree_and_archive() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let project = tmp.path().join("app");
    std::fs::create_dir_all(&project).expect("mkdir");
    common::locked_in_fixture(&project);
    let output_dir = tmp.path().join("app-liberated");

    let result = common::run_cli_case(
        "liberate_produces_cleaned_tree_and_archive",
        &[
            "liberate",
            project.to_str().expect("utf8 path"),
            "--output",
            output_dir.to_str().expect("utf8 path"),
            "--name",
            "demo",
            "--json",
        ],
    );
    assert!(
        result.status.success(),
        "liberate should succeed; log: {}",
        result.log_path.display()
    );

    // Vendor-only files are gone; generated artifacts and the polyfill exist.
    assert!(!output_dir.join(".lovable").exists());
    assert!(!output_dir.join("bun.lockb").exists());
    assert!(output_dir.join("Dockerfile").exists());
    assert!(output_dir.join("nginx.conf").exists());
    assert!(output_dir.join("deploy.sh").exists());
    assert!(output_dir.join("docker-compose.yml").exists());
    assert!(output_dir.join("liberation-manifest.json").exists());
    assert!(output_dir.join("src/lib/local-client.js").exists());

    let index = std::fs::read_to_string(output_dir.join("index.html")).expect("index.html");
    assert!(
        !index.contains("cdn.gpteng.co"),
        "loader script must be gone; log: {}",
        result.log_path.display()
    );
    let manifest =
        std::fs::read_to_string(output_dir.join("package.json")).expect("package.json");
    assert!(!manifest.contains("@base44/sdk"));
    assert!(manifest.contains("react"));

    let archive = tmp.path().join("app-liberated.tar.gz");
    assert!(
        archive.exists(),
        "archive missing; log: {}",
        result.log_path.display()
    );
    assert!(tmp.path().join("app-liberated.tar.gz.sha256").exists());

    let payload = parse_json_line(&result);
    assert_eq!(payload["project"], "demo");
    assert_eq!(payload["files_removed"], 2);
    assert!(
        payload["archive"]["sha256"]
            .as_str()
            .is_some_and(|s| s.len() == 64)
    );
}

#[test]
fn liberate_no_archive_still_writes_the_tree() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let project = tmp.path().join("app");
    std::fs::create_dir_all(&project).expect("mkdir");
    common::write_fixture_tree(&project, &[("src/main.tsx", "export {};\n")]);
    let output_dir = tmp.path().join("app-liberated");

    let result = common::run_cli_case(
        "liberate_no_archive_still_writes_the_tree",
        &[
            "liberate",
            project.to_str().expect("utf8 path"),
            "--output",
            output_dir.to_str().expect("utf8 path"),
            "--no-archive",
            "--json",
        ],
    );
    assert!(
        result.status.success(),
        "liberate --no-archive should succeed; log: {}",
        result.log_path.display()
    );
    assert!(output_dir.join("src/main.tsx").exists());
    assert!(!tmp.path().join("app-liberated.tar.gz").exists());

    let payload = parse_json_line(&result);
    assert!(payload.get("archive").is_none());
}

#[test]
fn liberate_rerun_is_idempotent_on_disk() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let project = tmp.path().join("app");
    std::fs::create_dir_all(&project).expect("mkdir");
    common::locked_in_fixture(&project);
    let output_dir = tmp.path().join("app-liberated");
    let args = [
        "liberate",
        project.to_str().expect("utf8 path"),
        "--output",
        output_dir.to_str().expect("utf8 path"),
        "--name",
        "demo",
        "--no-archive",
        "--json",
    ];

    let first = common::run_cli_case("liberate_rerun_first", &args);
    assert!(first.status.success(), "log: {}", first.log_path.display());
    let index_first = std::fs::read_to_string(output_dir.join("index.html")).expect("index");

    let second = common::run_cli_case("liberate_rerun_second", &args);
    assert!(second.status.success(), "log: {}", second.log_path.display());
    let index_second = std::fs::read_to_string(output_dir.join("index.html")).expect("index");

    assert_eq!(index_first, index_second);
}

#[test]
fn completions_emit_a_bash_script() {
    let result = common::run_cli_case("completions_emit_a_bash_script", &["completions", "bash"]);
    assert!(
        result.status.success(),
        "completions should succeed; log: {}",
        result.log_path.display()
    );
    assert!(
        result.stdout.contains("plh"),
        "completion script should mention the binary; log: {}",
        result.log_path.display()
    );
}
