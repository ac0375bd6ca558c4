//! Ollama `/api/chat` wire format and NDJSON decoding

use std::marker::PhantomData;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::error::{LlmError, LlmResult};
use crate::models::{ChatMessage, GenerateOptions, StreamDelta, ToolCallDelta, ToolDefinition};

// ========== Request ==========

#[derive(Debug, Serialize)]
pub(crate) struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    stream: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<WireTool<'a>>,
    options: WireOptions,
}

#[derive(Debug, Serialize)]
struct WireMessage<'a> {
    role: &'static str,
    content: &'a str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tool_calls: Vec<WireToolCall<'a>>,
    /// Ollama matches tool results by tool name rather than call id
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_name: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct WireToolCall<'a> {
    function: WireFunctionCall<'a>,
}

#[derive(Debug, Serialize)]
struct WireFunctionCall<'a> {
    name: &'a str,
    arguments: &'a Value,
}

#[derive(Debug, Serialize)]
struct WireTool<'a> {
    #[serde(rename = "type")]
    tool_type: &'static str,
    function: WireFunction<'a>,
}

#[derive(Debug, Serialize)]
struct WireFunction<'a> {
    name: &'a str,
    description: &'a str,
    parameters: &'a Value,
}

#[derive(Debug, Serialize, Default)]
struct WireOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
}

impl<'a> ChatRequest<'a> {
    pub(crate) fn new(
        model: &'a str,
        messages: &'a [ChatMessage],
        tools: &'a [ToolDefinition],
        options: &GenerateOptions,
        stream: bool,
    ) -> Self {
        let messages = messages
            .iter()
            .map(|m| WireMessage {
                role: m.role.as_str(),
                content: &m.content,
                tool_calls: m
                    .tool_calls
                    .iter()
                    .map(|c| WireToolCall {
                        function: WireFunctionCall {
                            name: &c.name,
                            arguments: &c.arguments,
                        },
                    })
                    .collect(),
                tool_name: m.name.as_deref(),
            })
            .collect();

        let tools = tools
            .iter()
            .map(|t| WireTool {
                tool_type: "function",
                function: WireFunction {
                    name: &t.name,
                    description: &t.description,
                    parameters: &t.parameters,
                },
            })
            .collect();

        Self {
            model,
            messages,
            stream,
            tools,
            options: WireOptions {
                temperature: options.temperature,
                num_predict: options.max_tokens,
                top_p: options.top_p,
            },
        }
    }
}

// ========== Responses ==========

/// One NDJSON line of a streamed chat, also the shape of a non-streamed reply
#[derive(Debug, Deserialize)]
pub(crate) struct ChatChunk {
    #[serde(default)]
    message: Option<ChunkMessage>,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    done_reason: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChunkMessage {
    #[serde(default)]
    content: String,
    #[serde(default)]
    thinking: Option<String>,
    #[serde(default)]
    tool_calls: Vec<ChunkToolCall>,
}

#[derive(Debug, Deserialize)]
struct ChunkToolCall {
    function: ChunkFunction,
}

#[derive(Debug, Deserialize)]
struct ChunkFunction {
    name: String,
    #[serde(default)]
    arguments: Value,
}

impl ChatChunk {
    pub(crate) fn into_text(self) -> LlmResult<String> {
        if let Some(error) = self.error {
            return Err(LlmError::InvalidResponse(error));
        }
        Ok(self.message.map(|m| m.content).unwrap_or_default())
    }

    /// Convert to a delta. Ollama sends no call ids, so calls are only
    /// numbered from `next_index` across the stream; ids are left to the
    /// caller, which sees every round of a turn.
    fn into_delta(self, next_index: &mut usize) -> LlmResult<StreamDelta> {
        if let Some(error) = self.error {
            return Err(LlmError::InvalidResponse(error));
        }

        let mut delta = StreamDelta {
            done: self.done,
            finish_reason: self.done_reason,
            ..StreamDelta::default()
        };

        if let Some(message) = self.message {
            delta.content = Some(message.content).filter(|c| !c.is_empty());
            delta.thinking = message.thinking.filter(|t| !t.is_empty());
            delta.tool_calls = message
                .tool_calls
                .into_iter()
                .map(|call| {
                    let index = *next_index;
                    *next_index += 1;
                    let arguments = match call.function.arguments {
                        Value::Null => String::new(),
                        Value::String(raw) => raw,
                        other => other.to_string(),
                    };
                    ToolCallDelta {
                        index,
                        id: None,
                        name: Some(call.function.name),
                        arguments,
                    }
                })
                .collect();
        }

        Ok(delta)
    }
}

/// Turn a byte stream of NDJSON chat chunks into completion deltas
pub(crate) fn ndjson_delta_stream<S, E>(
    bytes: S,
) -> Pin<Box<dyn Stream<Item = LlmResult<StreamDelta>> + Send>>
where
    S: Stream<Item = Result<Bytes, E>> + Send + Unpin + 'static,
    E: std::error::Error + Send + Sync + 'static,
{
    let mut next_index = 0usize;

    let deltas = NdjsonStream::<_, ChatChunk>::new(bytes)
        .map(move |chunk| chunk.and_then(|c| c.into_delta(&mut next_index)));

    // Guarantee a terminal delta even if the server hung up early
    let tail = futures_util::stream::once(async { Ok(StreamDelta::finished(None)) });
    let mut seen_done = false;
    let stream = deltas.chain(tail).filter(move |item| {
        let keep = match item {
            Ok(d) if d.done => !std::mem::replace(&mut seen_done, true),
            _ => true,
        };
        futures_util::future::ready(keep)
    });

    Box::pin(stream)
}

/// Stream adapter parsing newline-delimited JSON values out of a byte stream
pub(crate) struct NdjsonStream<S, T> {
    inner: S,
    buffer: Vec<u8>,
    exhausted: bool,
    _item: PhantomData<fn() -> T>,
}

impl<S, T> NdjsonStream<S, T> {
    pub(crate) fn new(stream: S) -> Self {
        Self {
            inner: stream,
            buffer: Vec::new(),
            exhausted: false,
            _item: PhantomData,
        }
    }

    /// Pop the next non-empty line, or the unterminated remainder once the
    /// source is exhausted
    fn next_line(&mut self) -> Option<Vec<u8>> {
        loop {
            let line = match self.buffer.iter().position(|b| *b == b'\n') {
                Some(pos) => {
                    let mut line: Vec<u8> = self.buffer.drain(..=pos).collect();
                    line.pop();
                    line
                }
                None if self.exhausted && !self.buffer.is_empty() => std::mem::take(&mut self.buffer),
                None => return None,
            };

            if line.iter().any(|b| !b.is_ascii_whitespace()) {
                return Some(line);
            }
        }
    }
}

impl<S, E, T> Stream for NdjsonStream<S, T>
where
    S: Stream<Item = Result<Bytes, E>> + Unpin,
    E: std::error::Error + Send + Sync + 'static,
    T: DeserializeOwned,
{
    type Item = LlmResult<T>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        loop {
            if let Some(line) = self.next_line() {
                let parsed = match std::str::from_utf8(&line) {
                    Ok(text) => serde_json::from_str::<T>(text.trim()),
                    Err(e) => {
                        warn!(error = %e, byte_count = line.len(), "Invalid UTF-8 in NDJSON line, using lossy conversion");
                        serde_json::from_str::<T>(String::from_utf8_lossy(&line).trim())
                    }
                };
                return Poll::Ready(Some(parsed.map_err(LlmError::from)));
            }

            if self.exhausted {
                return Poll::Ready(None);
            }

            match Pin::new(&mut self.inner).poll_next(cx) {
                Poll::Ready(Some(Ok(bytes))) => self.buffer.extend_from_slice(&bytes),
                Poll::Ready(Some(Err(e))) => {
                    return Poll::Ready(Some(Err(LlmError::InvalidResponse(format!(
                        "stream interrupted: {}",
                        e
                    )))))
                }
                Poll::Ready(None) => self.exhausted = true,
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn bytes_of(parts: &[&str]) -> impl Stream<Item = Result<Bytes, std::io::Error>> + Unpin {
        tokio_stream::iter(
            parts
                .iter()
                .map(|p| Ok(Bytes::copy_from_slice(p.as_bytes())))
                .collect::<Vec<_>>(),
        )
    }

    #[tokio::test]
    async fn test_ndjson_multiple_lines_in_single_chunk() {
        let data = concat!(
            r#"{"message":{"role":"assistant","content":"a"},"done":false}"#,
            "\n",
            r#"{"message":{"role":"assistant","content":"b"},"done":true}"#,
            "\n"
        );
        let mut stream = NdjsonStream::<_, Value>::new(bytes_of(&[data]));

        assert_eq!(stream.next().await.unwrap().unwrap()["message"]["content"], "a");
        assert_eq!(stream.next().await.unwrap().unwrap()["done"], true);
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn test_ndjson_line_split_across_chunks_and_blank_lines() {
        let mut stream = NdjsonStream::<_, Value>::new(bytes_of(&[
            "{\"n\":",
            "1}\n\n\n{\"n\"",
            ":2}",
        ]));

        assert_eq!(stream.next().await.unwrap().unwrap(), json!({"n": 1}));
        // The trailing line has no newline and is flushed at end of input
        assert_eq!(stream.next().await.unwrap().unwrap(), json!({"n": 2}));
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn test_ndjson_invalid_line_does_not_end_stream() {
        let mut stream = NdjsonStream::<_, Value>::new(bytes_of(&["{\"ok\":1}\nnot json\n{\"ok\":2}\n"]));

        assert!(stream.next().await.unwrap().is_ok());
        assert!(matches!(
            stream.next().await.unwrap(),
            Err(LlmError::JsonError(_))
        ));
        assert_eq!(stream.next().await.unwrap().unwrap(), json!({"ok": 2}));
    }

    #[tokio::test]
    async fn test_delta_stream_numbers_tool_calls_across_chunks() {
        let body = concat!(
            r#"{"message":{"role":"assistant","content":"","tool_calls":[{"function":{"name":"get_playlist","arguments":{}}}]},"done":false}"#,
            "\n",
            r#"{"message":{"role":"assistant","content":"","tool_calls":[{"function":{"name":"play_track","arguments":{"index":"2"}}}]},"done":false}"#,
            "\n",
            r#"{"message":{"role":"assistant","content":""},"done":true,"done_reason":"stop"}"#,
            "\n"
        );

        let deltas: Vec<_> = ndjson_delta_stream(bytes_of(&[body])).collect().await;
        assert_eq!(deltas.len(), 3);

        let first = deltas[0].as_ref().unwrap();
        assert_eq!(first.tool_calls[0].index, 0);
        assert!(first.tool_calls[0].id.is_none());
        assert_eq!(first.tool_calls[0].arguments, "{}");

        let second = deltas[1].as_ref().unwrap();
        assert_eq!(second.tool_calls[0].index, 1);
        assert_eq!(second.tool_calls[0].arguments, r#"{"index":"2"}"#);

        assert!(deltas[2].as_ref().unwrap().done);
    }

    #[tokio::test]
    async fn test_delta_stream_appends_done_when_missing() {
        let body = "{\"message\":{\"role\":\"assistant\",\"content\":\"hi\",\"thinking\":\"hmm\"},\"done\":false}\n";
        let deltas: Vec<_> = ndjson_delta_stream(bytes_of(&[body])).collect().await;

        assert_eq!(deltas.len(), 2);
        let first = deltas[0].as_ref().unwrap();
        assert_eq!(first.content.as_deref(), Some("hi"));
        assert_eq!(first.thinking.as_deref(), Some("hmm"));
        assert!(deltas[1].as_ref().unwrap().done);
    }

    #[test]
    fn test_request_uses_tool_name_for_results() {
        let messages = vec![ChatMessage::tool_result("call_0", "get_playlist", "The playlist is empty")];
        let request = ChatRequest::new("llama3.1", &messages, &[], &GenerateOptions::default(), true);
        let body = serde_json::to_value(&request).unwrap();

        assert_eq!(body["messages"][0]["role"], "tool");
        assert_eq!(body["messages"][0]["tool_name"], "get_playlist");
        assert!(body["options"].as_object().unwrap().is_empty());
    }
}
