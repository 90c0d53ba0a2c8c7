mod common;

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use tempfile::TempDir;

use common::{closed_port, spawn_mock, state_with_files, Shared, ANSWER};

fn setup_test_env(base_url: &str) -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let config_dir = tmp.path().join("config");
    fs::create_dir_all(&config_dir).unwrap();

    let config_content = format!(
        r#"[service]
base_url = "{}"
connect_timeout_secs = 2

[chat]
entertainment = false

[log]
filter = "warn"
"#,
        base_url
    );
    let config_path = config_dir.join("docqa.toml");
    fs::write(&config_path, config_content).unwrap();
    (tmp, config_path)
}

/// Run the binary off the async runtime so the mock keeps serving.
async fn run_docqa(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let config_path = config_path.to_path_buf();
    let args: Vec<String> = args.iter().map(|a| a.to_string()).collect();
    tokio::task::spawn_blocking(move || {
        let binary = env!("CARGO_BIN_EXE_docqa");
        let output = Command::new(binary)
            .arg("--config")
            .arg(&config_path)
            .args(&args)
            .env_remove("RUST_LOG")
            .output()
            .unwrap_or_else(|e| panic!("Failed to run docqa binary at {}: {}", binary, e));
        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();
        (stdout, stderr, output.status.success())
    })
    .await
    .unwrap()
}

async fn with_mock(state: Shared) -> (TempDir, PathBuf, tokio::task::JoinHandle<()>) {
    let (base, handle) = spawn_mock(state).await;
    let (tmp, config_path) = setup_test_env(&base);
    (tmp, config_path, handle)
}

#[tokio::test(flavor = "multi_thread")]
async fn test_files_lists_inventory() {
    let state = state_with_files(&[("leaflet.pdf", 3), ("guide.pdf", 2)]);
    let (_tmp, config_path, server_handle) = with_mock(state).await;

    let (stdout, stderr, success) = run_docqa(&config_path, &["files"]).await;
    assert!(success, "files failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("Documents:   2"));
    assert!(stdout.contains("Chunks: 5"));
    assert!(stdout.contains("leaflet.pdf"));
    assert!(stdout.contains("First lines of guide.pdf"));

    server_handle.abort();
}

#[tokio::test(flavor = "multi_thread")]
async fn test_ask_streams_answer() {
    let state = state_with_files(&[("leaflet.pdf", 3)]);
    let (_tmp, config_path, server_handle) = with_mock(state.clone()).await;

    let (stdout, stderr, success) =
        run_docqa(&config_path, &["ask", "How should I take it?"]).await;
    assert!(success, "ask failed: stdout={}, stderr={}", stdout, stderr);
    assert_eq!(stdout.trim_end(), ANSWER);
    assert_eq!(state.lock().unwrap().questions[0]["entertainment"], false);

    server_handle.abort();
}

#[tokio::test(flavor = "multi_thread")]
async fn test_ask_without_sources_is_refused() {
    let state = state_with_files(&[]);
    let (_tmp, config_path, server_handle) = with_mock(state.clone()).await;

    let (stdout, stderr, success) = run_docqa(&config_path, &["ask", "Anything?"]).await;
    assert!(!success, "ask should fail: stdout={}", stdout);
    assert!(stderr.contains("entertainment mode"));
    assert!(state.lock().unwrap().questions.is_empty());

    server_handle.abort();
}

#[tokio::test(flavor = "multi_thread")]
async fn test_ask_entertainment_without_sources() {
    let state = state_with_files(&[]);
    let (_tmp, config_path, server_handle) = with_mock(state.clone()).await;

    let (stdout, stderr, success) =
        run_docqa(&config_path, &["ask", "Tell me a joke", "--entertainment"]).await;
    assert!(success, "ask failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains(ANSWER));
    assert_eq!(state.lock().unwrap().questions[0]["entertainment"], true);

    server_handle.abort();
}

#[tokio::test(flavor = "multi_thread")]
async fn test_ask_service_error_prints_fallback() {
    let state = state_with_files(&[("leaflet.pdf", 3)]);
    let (_tmp, config_path, server_handle) = with_mock(state).await;

    let (stdout, stderr, success) = run_docqa(&config_path, &["ask", "please fail"]).await;
    assert!(!success);
    assert!(stdout.contains("Sorry, I encountered an error"));
    assert!(stderr.contains("Model overloaded"));

    server_handle.abort();
}

#[tokio::test(flavor = "multi_thread")]
async fn test_delete_then_files() {
    let state = state_with_files(&[("a.pdf", 3), ("b.pdf", 2)]);
    let (_tmp, config_path, server_handle) = with_mock(state.clone()).await;

    let (stdout, stderr, success) = run_docqa(&config_path, &["delete", "a.pdf"]).await;
    assert!(success, "delete failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("Deleted a.pdf."));
    assert!(stdout.contains("1 document(s) remaining."));

    let (stdout, _, success) = run_docqa(&config_path, &["delete", "a.pdf"]).await;
    assert!(!success, "second delete should fail: {}", stdout);

    let (stdout, _, _) = run_docqa(&config_path, &["files"]).await;
    assert!(!stdout.contains("a.pdf"));
    assert!(stdout.contains("b.pdf"));

    server_handle.abort();
}

#[tokio::test(flavor = "multi_thread")]
async fn test_clear() {
    let state = state_with_files(&[("a.pdf", 3)]);
    let (_tmp, config_path, server_handle) = with_mock(state.clone()).await;

    let (stdout, stderr, success) = run_docqa(&config_path, &["clear"]).await;
    assert!(success, "clear failed: stdout={}, stderr={}", stdout, stderr);
    assert!(state.lock().unwrap().files.is_empty());

    server_handle.abort();
}

#[tokio::test(flavor = "multi_thread")]
async fn test_upload_files() {
    let state = state_with_files(&[]);
    let (tmp, config_path, server_handle) = with_mock(state.clone()).await;
    let doc = tmp.path().join("dosage.txt");
    fs::write(&doc, "Take one tablet twice daily with food.").unwrap();

    let (stdout, stderr, success) =
        run_docqa(&config_path, &["upload", doc.to_str().unwrap()]).await;
    assert!(success, "upload failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("Accepted: dosage.txt"));
    assert_eq!(state.lock().unwrap().files.len(), 1);

    server_handle.abort();
}

#[tokio::test(flavor = "multi_thread")]
async fn test_upload_over_limit_is_refused_locally() {
    let state = state_with_files(&[("a.pdf", 1), ("b.pdf", 1), ("c.pdf", 1)]);
    let (tmp, config_path, server_handle) = with_mock(state.clone()).await;
    let doc = tmp.path().join("d.txt");
    fs::write(&doc, "more").unwrap();

    let (_, stderr, success) = run_docqa(&config_path, &["upload", doc.to_str().unwrap()]).await;
    assert!(!success);
    assert!(stderr.contains("Maximum 3 files allowed"));
    assert_eq!(state.lock().unwrap().files.len(), 3);

    server_handle.abort();
}

#[tokio::test(flavor = "multi_thread")]
async fn test_ingest_and_list_web_sources() {
    let state = state_with_files(&[]);
    let (_tmp, config_path, server_handle) = with_mock(state).await;

    let (stdout, stderr, success) =
        run_docqa(&config_path, &["ingest", "https://example.org/faq"]).await;
    assert!(success, "ingest failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("Chunks: 4"));

    let (stdout, _, success) = run_docqa(&config_path, &["files"]).await;
    assert!(success);
    assert!(stdout.contains("https://example.org/faq"));

    // a web source alone opens the gate
    let (stdout, stderr, success) = run_docqa(&config_path, &["ask", "What does it say?"]).await;
    assert!(success, "ask failed: stdout={}, stderr={}", stdout, stderr);

    let (_, stderr, success) = run_docqa(&config_path, &["ingest", "not a url"]).await;
    assert!(!success);
    assert!(stderr.contains("Invalid URL"));

    server_handle.abort();
}

#[tokio::test(flavor = "multi_thread")]
async fn test_new_session() {
    let state = state_with_files(&[]);
    let (_tmp, config_path, server_handle) = with_mock(state.clone()).await;

    let (stdout, stderr, success) = run_docqa(&config_path, &["new-session"]).await;
    assert!(success, "new-session failed: stdout={}, stderr={}", stdout, stderr);
    assert_eq!(state.lock().unwrap().resets, 1);

    server_handle.abort();
}

#[tokio::test(flavor = "multi_thread")]
async fn test_unreachable_service_fails() {
    let (_tmp, config_path) = setup_test_env(&format!("http://127.0.0.1:{}", closed_port()));
    let (_, stderr, success) = run_docqa(&config_path, &["files"]).await;
    assert!(!success);
    assert!(stderr.contains("Service unreachable"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_invalid_config_fails() {
    let tmp = TempDir::new().unwrap();
    let config_path = tmp.path().join("docqa.toml");
    fs::write(&config_path, "[service]\nbase_url = \"ftp://example.org\"\n").unwrap();
    let (_, stderr, success) = run_docqa(&config_path, &["files"]).await;
    assert!(!success);
    assert!(stderr.contains("http or https"));
}
