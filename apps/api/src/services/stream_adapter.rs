//! Streaming protocol adapter
//!
//! Turns model deltas into the client event protocol and, at the same time,
//! builds the agent message as ordered segments. Raw transport shapes stop at
//! [`normalize`]; everything after it works on [`Fragment`]s.

use playhead_llm_client::StreamDelta;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::debug;
use uuid::Uuid;

use crate::models::{Action, MessageBody, PlaybackState, Segment, ToolCallStatus};

/// One normalized piece of model output
#[derive(Debug, Clone, PartialEq)]
pub enum Fragment {
    Text(String),
    Thinking(String),
    ToolCallDelta {
        index: usize,
        id: Option<String>,
        name: Option<String>,
        arguments: String,
    },
    ToolResult {
        id: String,
        tool_name: String,
        result: String,
    },
}

/// Split a transport delta into fragments, thinking first
pub fn normalize(delta: StreamDelta) -> Vec<Fragment> {
    let mut fragments = Vec::new();

    if let Some(thinking) = delta.thinking.filter(|t| !t.is_empty()) {
        fragments.push(Fragment::Thinking(thinking));
    }
    if let Some(content) = delta.content.filter(|c| !c.is_empty()) {
        fragments.push(Fragment::Text(content));
    }
    fragments.extend(delta.tool_calls.into_iter().map(|call| Fragment::ToolCallDelta {
        index: call.index,
        id: call.id.filter(|id| !id.is_empty()),
        name: call.name.filter(|name| !name.is_empty()),
        arguments: call.arguments,
    }));

    fragments
}

/// Client-facing stream event
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TurnEvent {
    Text {
        content: String,
    },
    Thinking {
        content: String,
    },
    ToolStart {
        id: String,
        tool_name: String,
        args: Value,
    },
    ToolEnd {
        id: String,
        tool_name: String,
        result: String,
        status: ToolCallStatus,
    },
    Action {
        #[serde(rename = "type")]
        kind: String,
        data: Value,
    },
    Done {
        session_id: Uuid,
        actions: Vec<Action>,
        state: PlaybackState,
        #[serde(skip_serializing_if = "Option::is_none")]
        audio: Option<String>,
    },
}

impl TurnEvent {
    /// SSE event name, identical to the `event` field
    pub fn name(&self) -> &'static str {
        match self {
            TurnEvent::Text { .. } => "text",
            TurnEvent::Thinking { .. } => "thinking",
            TurnEvent::ToolStart { .. } => "tool_start",
            TurnEvent::ToolEnd { .. } => "tool_end",
            TurnEvent::Action { .. } => "action",
            TurnEvent::Done { .. } => "done",
        }
    }

    pub fn action(action: &Action) -> Self {
        TurnEvent::Action {
            kind: action.kind().to_string(),
            data: action.data(),
        }
    }
}

/// A tool call ready to run at the end of a model round
#[derive(Debug, Clone, PartialEq)]
pub struct ReadyCall {
    pub id: String,
    pub name: String,
    pub args: Value,
}

/// Status of a tool result: any mention of "error" counts as a failure
pub fn result_status(result: &str) -> ToolCallStatus {
    if result.to_lowercase().contains("error") {
        ToolCallStatus::Error
    } else {
        ToolCallStatus::Success
    }
}

/// Tool names must look like identifiers; anything else is model noise
fn is_valid_tool_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

/// Arguments buffered for one call in the current round
#[derive(Debug)]
struct PendingCall {
    index: usize,
    id: String,
    name: Option<String>,
    raw_args: String,
    /// Last args sent in a `tool_start`
    emitted_args: Option<Value>,
    /// Position of the call's segment in `parts`
    segment: Option<usize>,
}

impl PendingCall {
    /// Append a fragment, or replace the buffer when a complete object
    /// arrives for a call whose arguments already parsed
    fn absorb(&mut self, fragment: &str) {
        if fragment.is_empty() {
            return;
        }
        let buffered_complete = serde_json::from_str::<Value>(&self.raw_args).is_ok();
        let fragment_complete = serde_json::from_str::<Value>(fragment)
            .map(|v| v.is_object())
            .unwrap_or(false);

        if buffered_complete && fragment_complete {
            self.raw_args = fragment.to_string();
        } else {
            self.raw_args.push_str(fragment);
        }
    }

    fn parsed_args(&self) -> Option<Value> {
        serde_json::from_str::<Value>(&self.raw_args)
            .ok()
            .filter(Value::is_object)
    }

    fn valid_name(&self) -> Option<&str> {
        self.name.as_deref().filter(|n| is_valid_tool_name(n))
    }
}

/// Per-turn accumulator of segments and tool calls
#[derive(Debug, Default)]
pub struct StreamAdapter {
    parts: Vec<Segment>,
    round: Vec<PendingCall>,
    tool_calls_seen: usize,
}

impl StreamAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one fragment, returning the events it produces in order
    pub fn push(&mut self, fragment: Fragment) -> Vec<TurnEvent> {
        match fragment {
            Fragment::Text(content) => {
                if content.is_empty() {
                    return Vec::new();
                }
                self.append_text(content.clone());
                vec![TurnEvent::Text { content }]
            }
            Fragment::Thinking(content) => {
                if content.is_empty() {
                    return Vec::new();
                }
                self.append_thinking(content.clone());
                vec![TurnEvent::Thinking { content }]
            }
            Fragment::ToolCallDelta {
                index,
                id,
                name,
                arguments,
            } => self.push_call_delta(index, id, name, &arguments),
            Fragment::ToolResult {
                id,
                tool_name,
                result,
            } => self.push_result(id, tool_name, result),
        }
    }

    fn append_text(&mut self, content: String) {
        match self.parts.last_mut() {
            Some(Segment::Text { content: open }) => open.push_str(&content),
            _ => self.parts.push(Segment::Text { content }),
        }
    }

    fn append_thinking(&mut self, content: String) {
        match self.parts.last_mut() {
            Some(Segment::Thinking { content: open }) => open.push_str(&content),
            _ => self.parts.push(Segment::Thinking { content }),
        }
    }

    fn push_call_delta(
        &mut self,
        index: usize,
        id: Option<String>,
        name: Option<String>,
        arguments: &str,
    ) -> Vec<TurnEvent> {
        let existing = match &id {
            Some(id) => self.round.iter().position(|c| &c.id == id),
            None => self.round.iter().position(|c| c.index == index),
        };

        let slot = match existing {
            Some(slot) => slot,
            None => {
                self.tool_calls_seen += 1;
                let seen = self.tool_calls_seen;
                self.round.push(PendingCall {
                    index,
                    id: id.unwrap_or_else(|| format!("call_{}", seen)),
                    name: None,
                    raw_args: String::new(),
                    emitted_args: None,
                    segment: None,
                });
                self.round.len() - 1
            }
        };

        let call = &mut self.round[slot];
        if let Some(name) = name {
            call.name = Some(name);
        }
        call.absorb(arguments);

        match call.parsed_args() {
            Some(args) => self.start_call(slot, args).into_iter().collect(),
            None => Vec::new(),
        }
    }

    /// Record the call's segment and emit `tool_start` if its args changed
    fn start_call(&mut self, slot: usize, args: Value) -> Option<TurnEvent> {
        let call = &self.round[slot];
        let Some(name) = call.valid_name().map(str::to_string) else {
            debug!(name = ?call.name, "Dropping tool call with malformed name");
            return None;
        };
        if call.emitted_args.as_ref() == Some(&args) {
            return None;
        }

        let id = call.id.clone();
        let segment = match call.segment {
            Some(pos) => {
                if let Some(Segment::ToolCall { args: stored, .. }) = self.parts.get_mut(pos) {
                    *stored = args.clone();
                }
                pos
            }
            None => {
                self.parts.push(Segment::ToolCall {
                    id: id.clone(),
                    tool_name: name.clone(),
                    args: args.clone(),
                    status: ToolCallStatus::Pending,
                    result: None,
                });
                self.parts.len() - 1
            }
        };

        let call = &mut self.round[slot];
        call.segment = Some(segment);
        call.emitted_args = Some(args.clone());

        Some(TurnEvent::ToolStart {
            id,
            tool_name: name,
            args,
        })
    }

    fn push_result(&mut self, id: String, tool_name: String, result: String) -> Vec<TurnEvent> {
        let status = result_status(&result);

        for part in self.parts.iter_mut().rev() {
            if let Segment::ToolCall {
                id: part_id,
                status: part_status,
                result: part_result,
                ..
            } = part
            {
                if *part_id == id {
                    *part_status = status;
                    *part_result = Some(result.clone());
                    break;
                }
            }
        }

        vec![TurnEvent::ToolEnd {
            id,
            tool_name,
            result,
            status,
        }]
    }

    /// Close the model round: returns the calls to execute and any
    /// `tool_start` events still owed for calls whose args never parsed
    pub fn finish_round(&mut self) -> (Vec<TurnEvent>, Vec<ReadyCall>) {
        let mut events = Vec::new();
        let mut ready = Vec::new();

        for slot in 0..self.round.len() {
            if self.round[slot].valid_name().is_none() {
                continue;
            }

            if self.round[slot].emitted_args.is_none() {
                let args = self.round[slot]
                    .parsed_args()
                    .unwrap_or_else(|| Value::Object(Map::new()));
                events.extend(self.start_call(slot, args));
            }

            let call = &self.round[slot];
            if let (Some(name), Some(args)) = (call.valid_name(), call.emitted_args.clone()) {
                ready.push(ReadyCall {
                    id: call.id.clone(),
                    name: name.to_string(),
                    args,
                });
            }
        }

        self.round.clear();
        (events, ready)
    }

    /// Whether the turn has produced any visible text
    pub fn has_text(&self) -> bool {
        self.parts
            .iter()
            .any(|p| matches!(p, Segment::Text { content } if !content.trim().is_empty()))
    }

    pub fn has_tool_calls(&self) -> bool {
        self.parts
            .iter()
            .any(|p| matches!(p, Segment::ToolCall { .. }))
    }

    /// The agent message; a lone text segment becomes plain content
    pub fn finish(self) -> Option<MessageBody> {
        let mut parts = self.parts;
        match parts.len() {
            0 => None,
            1 if matches!(parts[0], Segment::Text { .. }) => match parts.pop() {
                Some(Segment::Text { content }) => Some(MessageBody::Content(content)),
                _ => None,
            },
            _ => Some(MessageBody::Parts(parts)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use playhead_llm_client::ToolCallDelta;
    use serde_json::json;

    fn call_delta(index: usize, id: Option<&str>, name: Option<&str>, args: &str) -> Fragment {
        Fragment::ToolCallDelta {
            index,
            id: id.map(str::to_string),
            name: name.map(str::to_string),
            arguments: args.to_string(),
        }
    }

    fn feed(adapter: &mut StreamAdapter, fragments: Vec<Fragment>) -> Vec<TurnEvent> {
        fragments
            .into_iter()
            .flat_map(|f| adapter.push(f))
            .collect()
    }

    #[test]
    fn test_normalize_orders_thinking_before_text() {
        let delta = StreamDelta {
            content: Some("Hi".to_string()),
            thinking: Some("hmm".to_string()),
            tool_calls: vec![ToolCallDelta {
                index: 0,
                id: Some(String::new()),
                name: Some("skip_next".to_string()),
                arguments: String::new(),
            }],
            ..Default::default()
        };

        let fragments = normalize(delta);
        assert_eq!(fragments[0], Fragment::Thinking("hmm".to_string()));
        assert_eq!(fragments[1], Fragment::Text("Hi".to_string()));
        assert_eq!(fragments[2], call_delta(0, None, Some("skip_next"), ""));
    }

    #[test]
    fn test_text_coalesces_into_one_segment() {
        let mut adapter = StreamAdapter::new();
        let events = feed(
            &mut adapter,
            vec![Fragment::Text("Hel".into()), Fragment::Text("lo".into())],
        );

        assert_eq!(events.len(), 2);
        assert_eq!(adapter.finish(), Some(MessageBody::Content("Hello".to_string())));
    }

    #[test]
    fn test_fragmented_args_emit_once_parsed() {
        let mut adapter = StreamAdapter::new();
        let events = feed(
            &mut adapter,
            vec![
                call_delta(0, Some("call_1"), Some("play_track"), ""),
                call_delta(0, None, None, "{\"ind"),
                call_delta(0, None, None, "ex\": \"2\"}"),
            ],
        );

        assert_eq!(
            events,
            vec![TurnEvent::ToolStart {
                id: "call_1".to_string(),
                tool_name: "play_track".to_string(),
                args: json!({"index": "2"}),
            }]
        );

        let (owed, ready) = adapter.finish_round();
        assert!(owed.is_empty());
        assert_eq!(ready.len(), 1);
        assert_eq!(ready[0].args, json!({"index": "2"}));
    }

    #[test]
    fn test_repeated_call_id_updates_in_place() {
        let mut adapter = StreamAdapter::new();
        let events = feed(
            &mut adapter,
            vec![
                call_delta(0, Some("call_0"), Some("play_track"), "{\"index\": \"1\"}"),
                call_delta(0, Some("call_0"), Some("play_track"), "{\"index\": \"1\"}"),
                call_delta(0, Some("call_0"), Some("play_track"), "{\"index\": \"3\"}"),
            ],
        );

        // Identical args are not re-announced; corrected args are
        assert_eq!(events.len(), 2);
        assert_matches!(&events[1], TurnEvent::ToolStart { args, .. } if args == &json!({"index": "3"}));

        let (_, ready) = adapter.finish_round();
        assert_eq!(ready.len(), 1);
        let body = adapter.finish();
        assert_matches!(body, Some(MessageBody::Parts(parts)) if parts.len() == 1);
    }

    #[test]
    fn test_idless_calls_are_numbered_across_rounds() {
        let mut adapter = StreamAdapter::new();
        feed(&mut adapter, vec![call_delta(0, None, Some("get_playlist"), "{}")]);
        let (_, first) = adapter.finish_round();

        feed(&mut adapter, vec![call_delta(0, None, Some("get_now_playing"), "{}")]);
        let (_, second) = adapter.finish_round();

        assert_eq!(first[0].id, "call_1");
        assert_eq!(second[0].id, "call_2");
    }

    #[test]
    fn test_malformed_names_are_dropped() {
        let mut adapter = StreamAdapter::new();
        let events = feed(
            &mut adapter,
            vec![
                call_delta(0, Some("a"), Some("play track!"), "{}"),
                call_delta(1, Some("b"), None, "{}"),
            ],
        );
        assert!(events.is_empty());

        let (owed, ready) = adapter.finish_round();
        assert!(owed.is_empty() && ready.is_empty());
        assert_eq!(adapter.finish(), None);
    }

    #[test]
    fn test_tool_call_splits_text_segments() {
        let mut adapter = StreamAdapter::new();
        feed(
            &mut adapter,
            vec![
                Fragment::Text("Let me check. ".into()),
                call_delta(0, Some("c1"), Some("get_playlist"), "{}"),
            ],
        );
        adapter.finish_round();
        feed(
            &mut adapter,
            vec![
                Fragment::ToolResult {
                    id: "c1".into(),
                    tool_name: "get_playlist".into(),
                    result: "The playlist is empty".into(),
                },
                Fragment::Text("Nothing queued.".into()),
            ],
        );

        let Some(MessageBody::Parts(parts)) = adapter.finish() else {
            panic!("expected parts");
        };
        assert_eq!(parts.len(), 3);
        assert_matches!(&parts[0], Segment::Text { content } if content == "Let me check. ");
        assert_matches!(
            &parts[1],
            Segment::ToolCall { status: ToolCallStatus::Success, result: Some(r), .. } if r == "The playlist is empty"
        );
        assert_matches!(&parts[2], Segment::Text { content } if content == "Nothing queued.");
    }

    #[test]
    fn test_unparsed_args_default_to_empty_object() {
        let mut adapter = StreamAdapter::new();
        let events = feed(&mut adapter, vec![call_delta(0, Some("c1"), Some("skip_next"), "")]);
        assert!(events.is_empty());

        let (owed, ready) = adapter.finish_round();
        assert_eq!(owed.len(), 1);
        assert_eq!(ready[0].args, json!({}));
    }

    #[test]
    fn test_error_results_are_flagged() {
        assert_eq!(result_status("Error searching catalog: timeout"), ToolCallStatus::Error);
        assert_eq!(result_status("some ERROR happened"), ToolCallStatus::Error);
        assert_eq!(result_status("Playing B by Band"), ToolCallStatus::Success);
    }

    #[test]
    fn test_event_wire_shape() {
        let event = TurnEvent::action(&Action::PlayIndex { index: 1 });
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            json!({"event": "action", "type": "play_index", "data": {"index": 1}})
        );
        assert_eq!(event.name(), "action");

        let start = TurnEvent::ToolStart {
            id: "call_1".into(),
            tool_name: "play_track".into(),
            args: json!({"index": "2"}),
        };
        assert_eq!(
            serde_json::to_value(&start).unwrap(),
            json!({"event": "tool_start", "id": "call_1", "tool_name": "play_track", "args": {"index": "2"}})
        );
    }
}
