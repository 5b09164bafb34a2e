use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn gqlgen_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("gqlgen");
    path
}

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_content = format!(
        r#"[db]
path = "{}/data/gqlgen.sqlite"
table = "schema"

[chunking]
max_content_length = 4000

[embedding]
model = "text-embedding-3-small"
dims = 8

[llm]
model = "gpt-4o-mini"
"#,
        root.display()
    );

    let config_path = root.join("gqlgen.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_gqlgen(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = gqlgen_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run gqlgen binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let success = output.status.success();
    (stdout, stderr, success)
}

#[test]
fn init_creates_database_file() {
    let (tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_gqlgen(&config_path, &["init"]);
    assert!(success, "init failed: stdout={stdout} stderr={stderr}");
    assert!(stdout.contains("initialized"));
    assert!(tmp.path().join("data/gqlgen.sqlite").exists());
}

#[test]
fn init_is_idempotent() {
    let (_tmp, config_path) = setup_test_env();

    let (_, _, first) = run_gqlgen(&config_path, &["init"]);
    assert!(first);
    let (_, stderr, second) = run_gqlgen(&config_path, &["init"]);
    assert!(second, "second init failed: {stderr}");
}

#[test]
fn embed_fails_fast_without_api_key() {
    let (_tmp, config_path) = setup_test_env();
    run_gqlgen(&config_path, &["init"]);

    let schema_dir = TempDir::new().unwrap();
    let schema_path = schema_dir.path().join("schema.graphql");
    fs::write(&schema_path, "type User { id: ID! name: String! } type Query { users: [User!]! }").unwrap();

    let binary = gqlgen_binary();
    let output = Command::new(&binary)
        .env_remove("OPENAI_API_KEY")
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .arg("embed")
        .arg(schema_path.to_str().unwrap())
        .output()
        .unwrap();

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("OPENAI_API_KEY"), "unexpected stderr: {stderr}");
}

#[test]
fn generate_fails_fast_without_api_key() {
    let (_tmp, config_path) = setup_test_env();
    run_gqlgen(&config_path, &["init"]);

    let binary = gqlgen_binary();
    let output = Command::new(&binary)
        .env_remove("OPENAI_API_KEY")
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .arg("generate")
        .arg("list all users")
        .output()
        .unwrap();

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("OPENAI_API_KEY"), "unexpected stderr: {stderr}");
}

#[test]
fn rejects_config_missing_required_fields() {
    let tmp = TempDir::new().unwrap();
    let config_path = tmp.path().join("gqlgen.toml");
    fs::write(&config_path, "[db]\npath = \"./x.sqlite\"\n").unwrap();

    let (_, stderr, success) = run_gqlgen(&config_path, &["init"]);
    assert!(!success);
    assert!(stderr.contains("embedding.dims") || stderr.contains("embedding.model"), "unexpected stderr: {stderr}");
}

#[test]
fn rejects_missing_config_file() {
    let tmp = TempDir::new().unwrap();
    let config_path = tmp.path().join("does-not-exist.toml");

    let (_, _, success) = run_gqlgen(&config_path, &["init"]);
    assert!(!success);
}

#[test]
fn embed_rejects_missing_schema_file() {
    let (_tmp, config_path) = setup_test_env();
    run_gqlgen(&config_path, &["init"]);

    let binary = gqlgen_binary();
    let output = Command::new(&binary)
        .env("OPENAI_API_KEY", "sk-test-not-a-real-key")
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .arg("embed")
        .arg("/nonexistent/schema.graphql")
        .output()
        .unwrap();

    assert!(!output.status.success());
}
