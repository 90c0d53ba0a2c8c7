//! A mock question-answering service for the integration tests.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use axum::{
    body::Body,
    extract::{Multipart, Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use serde_json::{json, Value};

/// The answer streamed for every question. Sent in pieces, the last of
/// which splits the multi-byte cup.
pub const ANSWER: &str = "Based on your documents: take it with food ☕";

#[derive(Debug, Clone)]
pub struct MockFile {
    pub name: String,
    pub chunks: u64,
    pub sample: Option<String>,
}

#[derive(Debug, Default)]
pub struct MockState {
    pub files: Vec<MockFile>,
    pub sources: Vec<(String, u64)>,
    pub questions: Vec<Value>,
    pub resets: usize,
    pub deleted: Vec<String>,
}

pub type Shared = Arc<Mutex<MockState>>;

pub fn state_with_files(names: &[(&str, u64)]) -> Shared {
    let files = names
        .iter()
        .map(|(name, chunks)| MockFile {
            name: name.to_string(),
            chunks: *chunks,
            sample: Some(format!("First lines of {}", name)),
        })
        .collect();
    Arc::new(Mutex::new(MockState {
        files,
        ..Default::default()
    }))
}

fn detail(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "detail": message }))).into_response()
}

async fn ask(State(state): State<Shared>, Json(body): Json<Value>) -> Response {
    let question = body["question"].as_str().unwrap_or_default().to_string();
    state.lock().unwrap().questions.push(body);

    if question.contains("fail") {
        return detail(StatusCode::INTERNAL_SERVER_ERROR, "Model overloaded");
    }

    let bytes = ANSWER.as_bytes();
    let cut = bytes.len() - 2;
    let chunks: Vec<Vec<u8>> = vec![
        b"Based on ".to_vec(),
        b"your documents: ".to_vec(),
        bytes[25..cut].to_vec(),
        bytes[cut..].to_vec(),
    ];
    let stream = futures::stream::iter(chunks.into_iter().map(Ok::<_, std::convert::Infallible>));
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        Body::from_stream(stream),
    )
        .into_response()
}

async fn list_files(State(state): State<Shared>) -> Json<Value> {
    let s = state.lock().unwrap();
    let details: Vec<Value> = s
        .files
        .iter()
        .map(|f| json!({ "filename": f.name, "chunk_count": f.chunks, "sample_text": f.sample }))
        .collect();
    Json(json!({
        "files": s.files.iter().map(|f| f.name.clone()).collect::<Vec<_>>(),
        "total_files": s.files.len(),
        "total_chunks": s.files.iter().map(|f| f.chunks).sum::<u64>(),
        "file_details": details,
    }))
}

async fn delete_file(State(state): State<Shared>, Path(name): Path<String>) -> Response {
    let mut s = state.lock().unwrap();
    let before = s.files.len();
    s.files.retain(|f| f.name != name);
    if s.files.len() == before {
        return detail(StatusCode::NOT_FOUND, "File not found");
    }
    s.deleted.push(name.clone());
    Json(json!({ "message": format!("{} deleted successfully", name) })).into_response()
}

async fn clear_all(State(state): State<Shared>) -> Json<Value> {
    let mut s = state.lock().unwrap();
    s.files.clear();
    s.sources.clear();
    Json(json!({ "message": "All data cleared" }))
}

async fn new_session(State(state): State<Shared>) -> Json<Value> {
    state.lock().unwrap().resets += 1;
    Json(json!({ "message": "New session started" }))
}

async fn upload(State(state): State<Shared>, mut multipart: Multipart) -> Response {
    let mut accepted = Vec::new();
    let mut rejected = Vec::new();
    let mut skipped = Vec::new();
    while let Some(field) = multipart.next_field().await.unwrap() {
        if field.name() != Some("files") {
            continue;
        }
        let name = field.file_name().unwrap_or_default().to_string();
        let bytes = field.bytes().await.unwrap();
        let mut s = state.lock().unwrap();
        if s.files.iter().any(|f| f.name == name) {
            skipped.push(name);
        } else if name.ends_with(".exe") {
            rejected.push(name);
        } else {
            s.files.push(MockFile {
                name: name.clone(),
                chunks: (bytes.len() as u64).div_ceil(100).max(1),
                sample: Some(String::from_utf8_lossy(&bytes).into_owned()),
            });
            accepted.push(name);
        }
    }
    let s = state.lock().unwrap();
    Json(json!({
        "message": format!("Processed {} file(s)", accepted.len()),
        "healthcare_files": accepted,
        "rejected_files": rejected,
        "skipped_files": skipped,
        "total_chunks": s.files.iter().map(|f| f.chunks).sum::<u64>(),
    }))
    .into_response()
}

async fn scrape(State(state): State<Shared>, Json(body): Json<Value>) -> Response {
    let url = body["url"].as_str().unwrap_or_default().to_string();
    if url.contains("unreachable") {
        return detail(StatusCode::BAD_REQUEST, "Could not fetch the page");
    }
    let mut s = state.lock().unwrap();
    if !s.sources.iter().any(|(u, _)| *u == url) {
        s.sources.push((url.clone(), 4));
    }
    Json(json!({ "message": format!("Scraped {}", url), "chunks": 4 })).into_response()
}

async fn web_sources(State(state): State<Shared>) -> Json<Value> {
    let s = state.lock().unwrap();
    let sources: Vec<Value> = s
        .sources
        .iter()
        .map(|(url, chunks)| json!({ "url": url, "chunk_count": chunks }))
        .collect();
    Json(json!({ "sources": sources }))
}

pub fn router(state: Shared) -> Router {
    Router::new()
        .route("/ask/", post(ask))
        .route("/files/", get(list_files))
        .route("/delete/{name}", delete(delete_file))
        .route("/clear-all/", delete(clear_all))
        .route("/new-session/", post(new_session))
        .route("/upload/", post(upload))
        .route("/scrape/", post(scrape))
        .route("/web-sources/", get(web_sources))
        .with_state(state)
}

/// Serve the mock on an ephemeral port. Returns its base URL.
pub async fn spawn_mock(state: Shared) -> (String, tokio::task::JoinHandle<()>) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = router(state);
    let handle = tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{}", addr), handle)
}

/// A port nothing listens on.
pub fn closed_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}
