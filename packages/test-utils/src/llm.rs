//! Mock model server for chat streaming and title tests
//!
//! Provides a [`MockLlmServer`] that serves OpenAI-compatible
//! `/chat/completions` (SSE when `stream: true`, JSON otherwise) and Ollama
//! `/api/chat` (NDJSON), so tests can script tool-calling rounds.

use serde_json::{json, Value};
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

/// Mock model server
///
/// Streaming rounds are mounted with `up_to_n_times(1)` and are consumed in
/// the order they were mounted, so a test can queue "call a tool" followed by
/// "answer with text".
///
/// # Example
///
/// ```rust,ignore
/// use playhead_test_utils::{openai, MockLlmServer};
///
/// let llm = MockLlmServer::start().await;
/// llm.mock_stream_round(openai::tool_call_chunks(0, "call_1", "play_track", &["{\"index\":", "\"2\"}"])).await;
/// llm.mock_stream_text("Playing B!").await;
/// ```
pub struct MockLlmServer {
    server: MockServer,
}

impl MockLlmServer {
    /// Start a new mock model server
    pub async fn start() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    /// Get the server URL (use as the OpenAI base URL or the Ollama host)
    pub fn url(&self) -> String {
        self.server.uri()
    }

    /// Queue one streamed OpenAI-compatible round made of these chunks
    pub async fn mock_stream_round(&self, chunks: Vec<Value>) {
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(body_partial_json(json!({"stream": true})))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/event-stream")
                    .set_body_string(openai::sse_body(&chunks)),
            )
            .up_to_n_times(1)
            .mount(&self.server)
            .await;
    }

    /// Queue one streamed round that answers with plain text
    pub async fn mock_stream_text(&self, text: &str) {
        let mut chunks = openai::text_chunks(text);
        chunks.push(openai::finish_chunk("stop"));
        self.mock_stream_round(chunks).await;
    }

    /// Make every streamed request fail with this status
    pub async fn mock_stream_failure(&self, status_code: u16) {
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(body_partial_json(json!({"stream": true})))
            .respond_with(ResponseTemplate::new(status_code).set_body_json(json!({
                "error": {"message": "mock failure", "type": "server_error"}
            })))
            .mount(&self.server)
            .await;
    }

    /// Answer non-streamed completions (used for titles) with this text
    pub async fn mock_completion(&self, text: &str) {
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(body_partial_json(json!({"stream": false})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "chatcmpl-mock",
                "object": "chat.completion",
                "choices": [{
                    "index": 0,
                    "message": {"role": "assistant", "content": text},
                    "finish_reason": "stop"
                }]
            })))
            .mount(&self.server)
            .await;
    }

    /// Make non-streamed completions fail with this status
    pub async fn mock_completion_failure(&self, status_code: u16) {
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(body_partial_json(json!({"stream": false})))
            .respond_with(ResponseTemplate::new(status_code).set_body_string("mock failure"))
            .mount(&self.server)
            .await;
    }

    /// Answer the OpenAI-compatible model list (reachability checks)
    pub async fn mock_models(&self) {
        Mock::given(method("GET"))
            .and(path("/models"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "object": "list",
                "data": [{"id": "gpt-4o-mini", "object": "model"}]
            })))
            .mount(&self.server)
            .await;
    }

    /// Queue one streamed Ollama round made of these NDJSON chunks
    pub async fn mock_ollama_round(&self, chunks: Vec<Value>) {
        let body: String = chunks.iter().map(|c| format!("{}\n", c)).collect();

        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .and(body_partial_json(json!({"stream": true})))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "application/x-ndjson")
                    .set_body_string(body),
            )
            .up_to_n_times(1)
            .mount(&self.server)
            .await;
    }

    /// JSON bodies of every request the server has received so far
    pub async fn request_bodies(&self) -> Vec<Value> {
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .filter_map(|r: &Request| serde_json::from_slice(&r.body).ok())
            .collect()
    }

    /// Bodies of streamed chat requests only
    pub async fn stream_request_bodies(&self) -> Vec<Value> {
        self.request_bodies()
            .await
            .into_iter()
            .filter(|b| b["stream"] == json!(true))
            .collect()
    }
}

/// Builders for OpenAI-compatible streaming chunks
pub mod openai {
    use serde_json::{json, Value};

    /// One chunk carrying a text delta
    pub fn text_chunk(text: &str) -> Value {
        json!({
            "id": "chatcmpl-mock",
            "object": "chat.completion.chunk",
            "choices": [{"index": 0, "delta": {"content": text}, "finish_reason": null}]
        })
    }

    /// Split text into word-sized chunks, the way servers stream it
    pub fn text_chunks(text: &str) -> Vec<Value> {
        text.split_inclusive(' ').map(text_chunk).collect()
    }

    /// One chunk carrying reasoning text
    pub fn reasoning_chunk(text: &str) -> Value {
        json!({
            "id": "chatcmpl-mock",
            "object": "chat.completion.chunk",
            "choices": [{"index": 0, "delta": {"reasoning_content": text}, "finish_reason": null}]
        })
    }

    /// Chunks for one tool call whose JSON arguments arrive in fragments.
    ///
    /// Only the first chunk carries the id and name.
    pub fn tool_call_chunks(index: usize, id: &str, name: &str, argument_fragments: &[&str]) -> Vec<Value> {
        let mut chunks = vec![json!({
            "id": "chatcmpl-mock",
            "object": "chat.completion.chunk",
            "choices": [{"index": 0, "delta": {"tool_calls": [{
                "index": index,
                "id": id,
                "type": "function",
                "function": {"name": name, "arguments": ""}
            }]}, "finish_reason": null}]
        })];

        chunks.extend(argument_fragments.iter().map(|fragment| {
            json!({
                "id": "chatcmpl-mock",
                "object": "chat.completion.chunk",
                "choices": [{"index": 0, "delta": {"tool_calls": [{
                    "index": index,
                    "function": {"arguments": fragment}
                }]}, "finish_reason": null}]
            })
        }));

        chunks
    }

    /// Final chunk with an empty delta
    pub fn finish_chunk(reason: &str) -> Value {
        json!({
            "id": "chatcmpl-mock",
            "object": "chat.completion.chunk",
            "choices": [{"index": 0, "delta": {}, "finish_reason": reason}]
        })
    }

    /// Serialize chunks as an SSE body terminated by `[DONE]`
    pub fn sse_body(chunks: &[Value]) -> String {
        let mut body: String = chunks.iter().map(|c| format!("data: {}\n\n", c)).collect();
        body.push_str("data: [DONE]\n\n");
        body
    }
}

/// Builders for Ollama NDJSON chunks
pub mod ollama {
    use serde_json::{json, Value};

    /// A content chunk
    pub fn text_chunk(text: &str) -> Value {
        json!({
            "model": "llama3.1",
            "message": {"role": "assistant", "content": text},
            "done": false
        })
    }

    /// A chunk carrying one complete tool call
    pub fn tool_call_chunk(name: &str, arguments: Value) -> Value {
        json!({
            "model": "llama3.1",
            "message": {
                "role": "assistant",
                "content": "",
                "tool_calls": [{"function": {"name": name, "arguments": arguments}}]
            },
            "done": false
        })
    }

    /// The terminal chunk
    pub fn done_chunk() -> Value {
        json!({
            "model": "llama3.1",
            "message": {"role": "assistant", "content": ""},
            "done": true,
            "done_reason": "stop"
        })
    }
}
