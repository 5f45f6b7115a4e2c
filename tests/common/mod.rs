//! Local stand-in for the OpenAI embeddings and chat-completions endpoints.
//!
//! Embeddings are keyword counts over [`VOCAB`] plus a constant component,
//! so similarity follows shared vocabulary. The API key picks the
//! behaviour: `sk-quota` gets a 429 `insufficient_quota`, `sk-bad` a 401,
//! anything else succeeds.

#![allow(dead_code)]

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};

pub const VOCAB: [&str; 6] = ["hiring", "fundraising", "product", "culture", "pricing", "remote"];
pub const DIMS: usize = VOCAB.len() + 1;
pub const FAKE_ANSWER: &str = "Founders should hire slowly.";

#[derive(Clone, Default)]
pub struct Recorded {
    pub chat_requests: Arc<Mutex<Vec<Value>>>,
    pub embedding_calls: Arc<Mutex<usize>>,
}

pub struct FakeOpenAI {
    /// Base URL including `/v1`, suitable for `api_base`.
    pub base_url: String,
    pub recorded: Recorded,
}

pub fn keyword_vector(text: &str) -> Vec<f32> {
    let lower = text.to_lowercase();
    let mut v: Vec<f32> = VOCAB
        .iter()
        .map(|w| lower.matches(w).count() as f32)
        .collect();
    v.push(0.1);
    v
}

fn check_key(headers: &HeaderMap) -> Option<Response> {
    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    match auth {
        "Bearer sk-quota" => Some(
            (
                StatusCode::TOO_MANY_REQUESTS,
                Json(json!({"error": {
                    "message": "You exceeded your current quota",
                    "type": "insufficient_quota",
                    "code": "insufficient_quota"
                }})),
            )
                .into_response(),
        ),
        "Bearer sk-bad" => Some(
            (
                StatusCode::UNAUTHORIZED,
                Json(json!({"error": {"message": "Incorrect API key provided"}})),
            )
                .into_response(),
        ),
        _ => None,
    }
}

async fn embeddings(
    State(rec): State<Recorded>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if let Some(resp) = check_key(&headers) {
        return resp;
    }
    *rec.embedding_calls.lock().unwrap() += 1;

    let inputs: Vec<String> = match &body["input"] {
        Value::String(s) => vec![s.clone()],
        Value::Array(items) => items
            .iter()
            .map(|v| v.as_str().unwrap_or_default().to_string())
            .collect(),
        _ => return (StatusCode::BAD_REQUEST, "missing input").into_response(),
    };

    // Reverse order so clients must sort by index.
    let data: Vec<Value> = inputs
        .iter()
        .enumerate()
        .rev()
        .map(|(i, text)| json!({"object": "embedding", "index": i, "embedding": keyword_vector(text)}))
        .collect();

    Json(json!({"object": "list", "data": data, "model": body["model"]})).into_response()
}

async fn chat_completions(
    State(rec): State<Recorded>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if let Some(resp) = check_key(&headers) {
        return resp;
    }
    rec.chat_requests.lock().unwrap().push(body.clone());
    Json(json!({
        "id": "chatcmpl-test",
        "object": "chat.completion",
        "model": body["model"],
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": format!("  {}  ", FAKE_ANSWER)},
            "finish_reason": "stop"
        }]
    }))
    .into_response()
}

fn app(recorded: Recorded) -> Router {
    Router::new()
        .route("/v1/embeddings", post(embeddings))
        .route("/v1/chat/completions", post(chat_completions))
        .with_state(recorded)
}

/// Start the fake on the current tokio runtime.
pub async fn spawn_fake_openai() -> FakeOpenAI {
    let recorded = Recorded::default();
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let router = app(recorded.clone());
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    FakeOpenAI {
        base_url: format!("http://{}/v1", addr),
        recorded,
    }
}

/// Start the fake on a dedicated background thread, for synchronous tests
/// that drive the `rag` binary.
pub fn spawn_fake_openai_blocking() -> FakeOpenAI {
    let (tx, rx) = std::sync::mpsc::channel();
    std::thread::spawn(move || {
        let rt = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async move {
            let fake = spawn_fake_openai().await;
            tx.send(fake).unwrap();
            std::future::pending::<()>().await;
        });
    });
    rx.recv().unwrap()
}

/// Write the sample corpus used across tests.
pub fn write_transcripts(dir: &std::path::Path) {
    std::fs::create_dir_all(dir).unwrap();
    std::fs::write(
        dir.join("alice-on-hiring.txt"),
        "Hiring is the most important thing you do. Hiring slowly beats hiring fast. \
         Culture follows from the first ten hires.",
    )
    .unwrap();
    std::fs::write(
        dir.join("bob-on-fundraising.txt"),
        "Fundraising is a means, not an end. Raise when the product is working. \
         Pricing tells you whether the product is working.",
    )
    .unwrap();
    std::fs::write(dir.join("notes.md"), "Not a transcript: hiring hiring hiring.").unwrap();
}
