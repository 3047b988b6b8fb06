use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn rotator_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("rotator");
    path
}

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    let config_content = format!(
        r#"[server]
bind = "127.0.0.1:0"
static_dir = "{root}/static"

[content]
static_dir = "{root}/static"

[reddit]
credentials_path = "{root}/data/credentials.json"
api_url = "http://127.0.0.1:9"
auth_url = "http://127.0.0.1:9/api/v1/access_token"
timeout_secs = 2

[settings]
path = "{root}/data/user_settings.json"
"#,
        root = root.display()
    );
    let config_path = config_dir.join("rotator.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_rotator(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let output = Command::new(rotator_binary())
        .arg("--config")
        .arg(config_path)
        .args(args)
        .env("RUST_LOG", "off")
        .output()
        .expect("failed to run rotator");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

fn write_settings(config_path: &Path, settings: &str) {
    let root = config_path.parent().unwrap().parent().unwrap();
    fs::create_dir_all(root.join("data")).unwrap();
    fs::write(root.join("data/user_settings.json"), settings).unwrap();
}

#[test]
fn test_init_creates_layout() {
    let (tmp, config) = setup_test_env();
    let (stdout, stderr, success) = run_rotator(&config, &["init"]);
    assert!(success, "init failed: {}", stderr);
    assert!(stdout.contains("Initialized."));

    let root = tmp.path();
    assert!(root.join("static/custom_content").is_dir());
    assert!(root.join("static/custom_punishment").is_dir());
    assert!(root.join("data/credentials_template.json").exists());
    assert!(root.join("data/user_settings.json").exists());
}

#[test]
fn test_init_idempotent() {
    let (_tmp, config) = setup_test_env();
    let (_, _, first) = run_rotator(&config, &["init"]);
    assert!(first);
    let (stdout, stderr, second) = run_rotator(&config, &["init"]);
    assert!(second, "second init failed: {}", stderr);
    assert!(stdout.contains("Settings already present"));
}

#[test]
fn test_missing_config_fails() {
    let tmp = TempDir::new().unwrap();
    let (_, stderr, success) = run_rotator(&tmp.path().join("nope.toml"), &["folders"]);
    assert!(!success);
    assert!(stderr.contains("Failed to read config file"));
}

#[test]
fn test_folders_lists_counts() {
    let (tmp, config) = setup_test_env();
    let cats = tmp.path().join("static/custom_content/cats");
    fs::create_dir_all(&cats).unwrap();
    fs::write(cats.join("a.jpg"), b"x").unwrap();
    fs::write(cats.join("b.MP4"), b"x").unwrap();
    fs::write(cats.join("c.txt"), b"x").unwrap();

    let (stdout, stderr, success) = run_rotator(&config, &["folders", "--refresh"]);
    assert!(success, "folders failed: {}", stderr);
    assert!(stdout.contains("Content folders (1):"));
    assert!(stdout.contains("cats"));
    assert!(stdout.contains("2 files"));
    assert!(stdout.contains("Punishment folders (0):"));
}

#[test]
fn test_credentials_lifecycle() {
    let (_tmp, config) = setup_test_env();

    let (stdout, _, success) = run_rotator(&config, &["credentials", "status"]);
    assert!(success);
    assert!(stdout.contains("configured:            false"));

    let (_, stderr, success) = run_rotator(
        &config,
        &["credentials", "set", "--client-id", "abc", "--client-secret", "xyz"],
    );
    assert!(success, "set failed: {}", stderr);

    let (stdout, _, _) = run_rotator(&config, &["credentials", "status"]);
    assert!(stdout.contains("configured:            true"));
    assert!(!stdout.contains("xyz"));

    let (_, _, success) = run_rotator(&config, &["credentials", "clear"]);
    assert!(success);
    let (stdout, _, _) = run_rotator(&config, &["credentials", "status"]);
    assert!(stdout.contains("client_id present:     false"));
}

#[test]
fn test_credentials_set_rejects_blank_secret() {
    let (_tmp, config) = setup_test_env();
    let (_, _, success) = run_rotator(
        &config,
        &["credentials", "set", "--client-id", "abc", "--client-secret", "  "],
    );
    assert!(!success);
}

#[test]
fn test_pick_local_prints_descriptor() {
    let (tmp, config) = setup_test_env();
    let folder = tmp.path().join("static/custom_content/example");
    fs::create_dir_all(&folder).unwrap();
    fs::write(folder.join("a.jpg"), b"x").unwrap();
    write_settings(&config, r#"{"timerMin": "30", "timerMax": "30"}"#);

    let (stdout, stderr, success) = run_rotator(&config, &["pick", "--mode", "local"]);
    assert!(success, "pick failed: {}", stderr);
    let descriptor: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(descriptor["source"], "local");
    assert_eq!(descriptor["url"], "/media/content/example/a.jpg");
    assert_eq!(descriptor["timer_seconds"], 30);
}

#[test]
fn test_pick_remote_without_favorites_fails() {
    let (_tmp, config) = setup_test_env();
    let (_, stderr, success) = run_rotator(&config, &["pick", "--mode", "remote"]);
    assert!(!success);
    assert!(stderr.contains("no enabled subreddits"));
}

#[test]
fn test_pick_remote_without_credentials_is_auth_error() {
    let (_tmp, config) = setup_test_env();
    write_settings(&config, r#"{"favorites": ["pics"]}"#);
    let (_, stderr, success) = run_rotator(&config, &["pick"]);
    assert!(!success);
    assert!(stderr.contains("authentication failed"));
}

#[test]
fn test_pick_unknown_mode_errors() {
    let (_tmp, config) = setup_test_env();
    let (_, stderr, success) = run_rotator(&config, &["pick", "--mode", "sideways"]);
    assert!(!success);
    assert!(stderr.contains("Unknown content source"));
}
