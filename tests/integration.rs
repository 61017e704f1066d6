use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn notiq_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("notiq");
    path
}

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    let data_dir = root.join("data");
    fs::create_dir_all(&data_dir).unwrap();

    let vault_dir = root.join("vault");
    fs::create_dir_all(&vault_dir).unwrap();
    fs::write(
        vault_dir.join("2025-01-02.md"),
        "---\ndate: 2025-01-02\ntags: [work, kubernetes]\n---\n\nWorked on the kubernetes operator rollout and reviewed the deployment pipeline.",
    )
    .unwrap();
    fs::write(
        vault_dir.join("recipes.md"),
        "Soup recipes and grocery planning for the week. #cooking",
    )
    .unwrap();
    fs::write(
        vault_dir.join("scratch.txt"),
        "Plain text scratch file that should not be indexed.",
    )
    .unwrap();

    let config_content = format!(
        r#"[db]
path = "{root}/data/notiq.sqlite"

[vault]
root = "{root}/vault"

[llm]
provider = "disabled"
"#,
        root = root.display()
    );

    let config_path = config_dir.join("notiq.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_notiq(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = notiq_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run notiq binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let success = output.status.success();
    (stdout, stderr, success)
}

#[test]
fn test_init_creates_database() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_notiq(&config_path, &["init"]);
    assert!(success, "init failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("initialized"));
}

#[test]
fn test_init_idempotent() {
    let (_tmp, config_path) = setup_test_env();

    let (_, _, success1) = run_notiq(&config_path, &["init"]);
    assert!(success1, "First init failed");

    let (_, _, success2) = run_notiq(&config_path, &["init"]);
    assert!(success2, "Second init failed (not idempotent)");
}

#[test]
fn test_index_counts_markdown_only() {
    let (_tmp, config_path) = setup_test_env();

    run_notiq(&config_path, &["init"]);
    let (stdout, stderr, success) = run_notiq(&config_path, &["index"]);
    assert!(success, "index failed: stdout={}, stderr={}", stdout, stderr);
    // The .txt file is not indexed.
    assert!(stdout.contains("Indexed 2 files"), "stdout: {}", stdout);
    assert!(stdout.contains("0 failed"), "stdout: {}", stdout);
}

#[test]
fn test_reindex_no_duplicates() {
    let (_tmp, config_path) = setup_test_env();

    run_notiq(&config_path, &["init"]);
    let (_, _, first) = run_notiq(&config_path, &["index"]);
    assert!(first);

    let (stdout, stderr, success) = run_notiq(&config_path, &["index"]);
    assert!(
        success,
        "re-index failed: stdout={}, stderr={}",
        stdout, stderr
    );
    assert!(stdout.contains("Indexed 2 files"), "stdout: {}", stdout);
}

#[test]
fn test_index_without_init_bootstraps_schema() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_notiq(&config_path, &["index"]);
    assert!(success, "index failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("Indexed 2 files"), "stdout: {}", stdout);
}

#[test]
fn test_search_requires_model() {
    let (_tmp, config_path) = setup_test_env();

    run_notiq(&config_path, &["init"]);
    run_notiq(&config_path, &["index"]);

    // Query interpretation needs a configured model; the disabled
    // provider is a hard error for search.
    let (_, stderr, success) = run_notiq(&config_path, &["search", "kubernetes"]);
    assert!(!success);
    assert!(
        stderr.to_lowercase().contains("language model"),
        "stderr: {}",
        stderr
    );
}

#[test]
fn test_enrich_disabled_model_counts_failures() {
    let (_tmp, config_path) = setup_test_env();

    // Header generation needs a model; headerless files fail, the file
    // with existing frontmatter is skipped, and the batch still succeeds.
    let (stdout, stderr, success) = run_notiq(&config_path, &["enrich", "--sequential"]);
    assert!(success, "enrich failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("Success: 0"), "stdout: {}", stdout);
    assert!(stdout.contains("Failed: 1"), "stdout: {}", stdout);
    assert!(stdout.contains("Skipped: 1"), "stdout: {}", stdout);
    assert!(stdout.contains("Total: 2"), "stdout: {}", stdout);
}

#[test]
fn test_enrich_preserves_existing_header() {
    let (tmp, config_path) = setup_test_env();
    let dated = tmp.path().join("vault").join("2025-01-02.md");
    let before = fs::read_to_string(&dated).unwrap();

    run_notiq(&config_path, &["enrich", "--sequential"]);

    assert_eq!(fs::read_to_string(&dated).unwrap(), before);
}

#[test]
fn test_missing_config_is_an_error() {
    let (tmp, _config_path) = setup_test_env();
    let missing = tmp.path().join("nope.toml");

    let (_, stderr, success) = run_notiq(&missing, &["init"]);
    assert!(!success);
    assert!(stderr.contains("config"), "stderr: {}", stderr);
}
