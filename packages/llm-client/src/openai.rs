//! OpenAI-compatible Chat Completions wire format and SSE decoding

use std::pin::Pin;

use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{LlmError, LlmResult};
use crate::models::{ChatMessage, GenerateOptions, StreamDelta, ToolCallDelta, ToolDefinition};

// ========== Request ==========

#[derive(Debug, Serialize)]
pub(crate) struct CompletionRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    stream: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<WireTool<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
}

#[derive(Debug, Serialize)]
struct WireMessage<'a> {
    role: &'static str,
    content: Option<&'a str>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tool_calls: Vec<WireToolCall<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct WireToolCall<'a> {
    id: &'a str,
    #[serde(rename = "type")]
    call_type: &'static str,
    function: WireFunctionCall<'a>,
}

#[derive(Debug, Serialize)]
struct WireFunctionCall<'a> {
    name: &'a str,
    /// OpenAI expects arguments as a JSON-encoded string
    arguments: String,
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

impl<'a> CompletionRequest<'a> {
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
                // Assistant tool-call turns may legitimately have no text
                content: if m.content.is_empty() && !m.tool_calls.is_empty() {
                    None
                } else {
                    Some(m.content.as_str())
                },
                tool_calls: m
                    .tool_calls
                    .iter()
                    .map(|c| WireToolCall {
                        id: &c.id,
                        call_type: "function",
                        function: WireFunctionCall {
                            name: &c.name,
                            arguments: c.arguments.to_string(),
                        },
                    })
                    .collect(),
                tool_call_id: m.tool_call_id.as_deref(),
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
            temperature: options.temperature,
            max_tokens: options.max_tokens,
            top_p: options.top_p,
        }
    }
}

// ========== Non-streaming response ==========

#[derive(Debug, Deserialize)]
pub(crate) struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Debug, Deserialize)]
struct CompletionMessage {
    #[serde(default)]
    content: Option<String>,
}

impl CompletionResponse {
    pub(crate) fn into_text(self) -> LlmResult<String> {
        self.choices
            .into_iter()
            .next()
            .map(|c| c.message.content.unwrap_or_default())
            .ok_or_else(|| LlmError::InvalidResponse("completion had no choices".to_string()))
    }
}

// ========== Streaming chunks ==========

#[derive(Debug, Deserialize)]
struct ChunkWire {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
}

#[derive(Debug, Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: ChunkDelta,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ChunkDelta {
    #[serde(default)]
    content: Option<String>,
    /// DeepSeek, Kimi and vLLM reasoning models stream their trace here
    #[serde(default, alias = "reasoning")]
    reasoning_content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<ChunkToolCall>,
}

#[derive(Debug, Deserialize)]
struct ChunkToolCall {
    #[serde(default)]
    index: usize,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    function: Option<ChunkFunction>,
}

#[derive(Debug, Deserialize)]
struct ChunkFunction {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    arguments: Option<String>,
}

/// Decode one SSE `data:` payload.
///
/// Returns `Ok(None)` for payloads that carry nothing useful (usage-only
/// chunks, empty choices).
pub(crate) fn parse_sse_data(data: &str) -> LlmResult<Option<StreamDelta>> {
    if data == "[DONE]" {
        return Ok(Some(StreamDelta::finished(None)));
    }

    let chunk: ChunkWire = serde_json::from_str(data)?;
    let Some(choice) = chunk.choices.into_iter().next() else {
        return Ok(None);
    };

    let tool_calls = choice
        .delta
        .tool_calls
        .into_iter()
        .map(|tc| {
            let (name, arguments) = match tc.function {
                Some(f) => (f.name, f.arguments.unwrap_or_default()),
                None => (None, String::new()),
            };
            ToolCallDelta {
                index: tc.index,
                id: tc.id.filter(|id| !id.is_empty()),
                name,
                arguments,
            }
        })
        .collect();

    let delta = StreamDelta {
        content: choice.delta.content.filter(|c| !c.is_empty()),
        thinking: choice.delta.reasoning_content.filter(|c| !c.is_empty()),
        tool_calls,
        done: false,
        finish_reason: choice.finish_reason,
    };

    Ok(Some(delta))
}

/// Pull complete `data:` payloads out of an SSE buffer, leaving any partial
/// event in place for the next read.
pub(crate) fn drain_data_lines(buffer: &mut Vec<u8>) -> Vec<String> {
    let mut data_lines = Vec::new();

    while let Some(pos) = buffer.windows(2).position(|w| w == b"\n\n") {
        let block: Vec<u8> = buffer.drain(..pos + 2).collect();
        let block = String::from_utf8_lossy(&block);

        for line in block.lines() {
            if let Some(data) = line.trim().strip_prefix("data:") {
                let data = data.trim();
                if !data.is_empty() {
                    data_lines.push(data.to_string());
                }
            }
        }
    }

    data_lines
}

/// Turn a byte stream of SSE into completion deltas.
///
/// Bytes are buffered raw so multi-byte characters split across network
/// chunks survive. A terminal delta is always yielded exactly once, even if
/// the server closes without `[DONE]`.
pub(crate) fn sse_delta_stream<S, E>(
    bytes: S,
) -> Pin<Box<dyn Stream<Item = LlmResult<StreamDelta>> + Send>>
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: std::fmt::Display + Send + 'static,
{
    let stream = async_stream::stream! {
        let mut bytes = Box::pin(bytes);
        let mut buffer: Vec<u8> = Vec::new();
        let mut finish_reason: Option<String> = None;

        'read: loop {
            let (payloads, eof) = match bytes.next().await {
                Some(Ok(chunk)) => {
                    buffer.extend(chunk.iter().filter(|b| **b != b'\r'));
                    (drain_data_lines(&mut buffer), false)
                }
                Some(Err(e)) => {
                    yield Err(LlmError::InvalidResponse(format!("stream interrupted: {}", e)));
                    return;
                }
                None => {
                    // Flush a final event the server did not terminate
                    if buffer.iter().any(|b| !b.is_ascii_whitespace()) {
                        buffer.extend_from_slice(b"\n\n");
                    }
                    (drain_data_lines(&mut buffer), true)
                }
            };

            for data in payloads {
                match parse_sse_data(&data) {
                    Ok(Some(delta)) if delta.done => break 'read,
                    Ok(Some(mut delta)) => {
                        if delta.finish_reason.is_some() {
                            finish_reason = delta.finish_reason.take();
                        }
                        if delta.content.is_some() || delta.thinking.is_some() || !delta.tool_calls.is_empty() {
                            yield Ok(delta);
                        }
                    }
                    Ok(None) => {}
                    Err(e) => yield Err(e),
                }
            }

            if eof {
                break;
            }
        }

        yield Ok(StreamDelta::finished(finish_reason));
    };

    Box::pin(stream)
}
