use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus};
use std::time::{SystemTime, UNIX_EPOCH};

pub struct CmdResult {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
    pub log_path: PathBuf,
}

fn now_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_millis())
}

fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

fn resolve_bin_path() -> PathBuf {
    if let Ok(path) = std::env::var("CARGO_BIN_EXE_plh") {
        return PathBuf::from(path);
    }

    let exe_name = if cfg!(windows) { "plh.exe" } else { "plh" };
    let fallback = std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(PathBuf::from))
        .and_then(|deps| deps.parent().map(PathBuf::from))
        .map(|debug_dir| debug_dir.join(exe_name));

    match fallback {
        Some(path) if path.exists() => path,
        _ => panic!("unable to resolve plh binary path for integration test"),
    }
}

pub fn run_cli_case(case_name: &str, args: &[&str]) -> CmdResult {
    let root = std::env::temp_dir().join("plh-test-logs");
    fs::create_dir_all(&root).expect("create temp test log dir");

    // Isolated HOME so the run never picks up a developer's real config file.
    let home = root.join(format!("home-{}", sanitize(case_name)));
    fs::create_dir_all(&home).expect("create temp home dir");

    let log_path = root.join(format!("{}-{}.log", sanitize(case_name), now_millis()));
    let bin_path = resolve_bin_path();

    let output = Command::new(&bin_path)
        .args(args)
        .env("HOME", &home)
        .env_remove("PLH_OUTPUT_FORMAT")
        .env_remove("PLH_GATE_ENFORCE")
        .env_remove("PLH_GATE_MIN_SCORE")
        .env("RUST_BACKTRACE", "1")
        .output()
        .expect("execute plh command");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();

    let mut log_content = String::new();
    log_content.push_str(&format!("case={case_name}\n"));
    log_content.push_str(&format!("bin={}\n", bin_path.display()));
    log_content.push_str(&format!("args={args:?}\n"));
    log_content.push_str(&format!("status={}\n", output.status));
    log_content.push_str("----- stdout -----\n");
    log_content.push_str(&stdout);
    log_content.push('\n');
    log_content.push_str("----- stderr -----\n");
    log_content.push_str(&stderr);
    log_content.push('\n');
    fs::write(&log_path, log_content).expect("write test log");

    CmdResult {
        status: output.status,
        stdout,
        stderr,
        log_path,
    }
}

/// Write a fixture project tree under `root` from (relative path, content)
/// pairs, creating parent directories as needed.
pub fn write_fixture_tree(root: &Path, files: &[(&str, &str)]) {
    for (rel, content) in files {
        let dest = root.join(rel);
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).expect("create fixture dir");
        }
        fs::write(&dest, content).expect("write fixture file");
    }
}

/// A small exported app tree carrying one marker of every severity plus a
/// vendor-only directory and a platform lockfile.
pub fn locked_in_fixture(root: &Path) {
    write_fixture_tree(
        root,
        &[
            (
                "index.html",
                "<!doctype html>\n<head>\n<script src=\"https://cdn.gpteng.co/gptengineer.js\" type=\"module\"></script>\n</head>\n<body></body>\n",
            ),
            (
                "src/api.ts",
                "import { createClient } from \"@base44/sdk\";\nexport const client = createClient({ appId: \"0123456789abcdef01234567\" });\n",
            ),
            (
                "package.json",
                "{\n  \"name\": \"demo-app\",\n  \"dependencies\": {\n    \"@base44/sdk\": \"^1.2.0\",\n    \"react\": \"^18.3.0\"\n  }\n}\n",
            ),
            (".lovable/state.json", "{}\n"),
            ("bun.lockb", "lockfile\n"),
            ("README.md", "Built with Lovable\n"),
        ],
    );
}
