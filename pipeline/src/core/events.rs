//! Decoding of the agent's newline-delimited JSON event stream.
//!
//! Output arrives in arbitrary chunks. [`StreamDecoder`] keeps the trailing
//! incomplete line between chunks, so the decoded events do not depend on
//! where the chunk boundaries fall. Lines that are not well-formed events
//! are dropped.

use serde::Deserialize;
use serde_json::Value;
use tracing::trace;

const MAX_DETAIL_CHARS: usize = 80;

/// A decoded event the pipeline cares about.
#[derive(Debug, Clone, PartialEq)]
pub enum AgentEvent {
    /// Session initialization (`type: system`, `subtype: init`).
    Init {
        session_id: Option<String>,
        model: Option<String>,
    },
    /// A textual response from the agent.
    Text(String),
    /// The agent invoked a tool.
    ToolUse { name: String, input: Value },
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum RawEvent {
    System {
        #[serde(default)]
        subtype: Option<String>,
        #[serde(default)]
        session_id: Option<String>,
        #[serde(default)]
        model: Option<String>,
    },
    Assistant {
        message: RawMessage,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct RawMessage {
    #[serde(default)]
    content: Vec<RawContent>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum RawContent {
    Text {
        text: String,
    },
    ToolUse {
        name: String,
        #[serde(default)]
        input: Value,
    },
    #[serde(other)]
    Other,
}

/// Incremental line splitter and event decoder.
#[derive(Debug, Default)]
pub struct StreamDecoder {
    pending: Vec<u8>,
}

impl StreamDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode every complete line in `pending + chunk`; keep the remainder.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<AgentEvent> {
        self.pending.extend_from_slice(chunk);
        let Some(last_newline) = self.pending.iter().rposition(|b| *b == b'\n') else {
            return Vec::new();
        };
        let rest = self.pending.split_off(last_newline + 1);
        let complete = std::mem::replace(&mut self.pending, rest);
        complete
            .split(|b| *b == b'\n')
            .flat_map(decode_line)
            .collect()
    }

    /// Decode whatever is left once the stream has ended.
    pub fn finish(&mut self) -> Vec<AgentEvent> {
        let rest = std::mem::take(&mut self.pending);
        decode_line(&rest)
    }
}

/// Decode one line. Blank or malformed lines yield no events.
pub fn decode_line(line: &[u8]) -> Vec<AgentEvent> {
    let line = line.trim_ascii();
    if line.is_empty() {
        return Vec::new();
    }
    let raw: RawEvent = match serde_json::from_slice(line) {
        Ok(raw) => raw,
        Err(err) => {
            trace!(err = %err, "discarding malformed stream line");
            return Vec::new();
        }
    };
    match raw {
        RawEvent::System {
            subtype,
            session_id,
            model,
        } if subtype.as_deref() == Some("init") => vec![AgentEvent::Init { session_id, model }],
        RawEvent::Assistant { message } => message
            .content
            .into_iter()
            .filter_map(|item| match item {
                RawContent::Text { text } => Some(AgentEvent::Text(text)),
                RawContent::ToolUse { name, input } => Some(AgentEvent::ToolUse { name, input }),
                RawContent::Other => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}

/// One-line summary of a tool invocation, e.g. `Read src/main.rs`.
pub fn tool_summary(name: &str, input: &Value) -> String {
    let field = |key: &str| input.get(key).and_then(Value::as_str).map(str::trim);
    let detail = match name {
        "Read" | "Write" | "Edit" | "MultiEdit" => field("file_path").map(str::to_string),
        "NotebookEdit" | "NotebookRead" => field("notebook_path").map(str::to_string),
        "Bash" => field("description")
            .filter(|d| !d.is_empty())
            .or_else(|| field("command").and_then(|c| c.lines().next()))
            .map(str::to_string),
        "Grep" | "Glob" => field("pattern").map(|pattern| match field("path") {
            Some(path) if !path.is_empty() => format!("{pattern} in {path}"),
            _ => pattern.to_string(),
        }),
        "LS" => field("path").map(str::to_string),
        "WebFetch" => field("url").map(str::to_string),
        "WebSearch" => field("query").map(str::to_string),
        "Task" => field("description").map(str::to_string),
        "TodoWrite" => input
            .get("todos")
            .and_then(Value::as_array)
            .map(|todos| format!("{} items", todos.len())),
        _ => None,
    };
    match detail.filter(|d| !d.is_empty()) {
        Some(detail) => format!("{name} {}", truncate_chars(&detail, MAX_DETAIL_CHARS)),
        None => name.to_string(),
    }
}

fn truncate_chars(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max.saturating_sub(3)).collect();
    out.push_str("...");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const INIT: &str = r#"{"type":"system","subtype":"init","session_id":"s-1","model":"m-1","tools":["Read"]}"#;
    const TOOL: &str = r#"{"type":"assistant","message":{"content":[{"type":"tool_use","id":"t1","name":"Read","input":{"file_path":"src/main.rs"}}]}}"#;
    const TEXT: &str = r#"{"type":"assistant","message":{"content":[{"type":"text","text":"Done ✓"}]}}"#;

    fn stream() -> String {
        format!("{INIT}\n{TOOL}\n{TEXT}\n")
    }

    #[test]
    fn decodes_event_kinds() {
        let mut decoder = StreamDecoder::new();
        let events = decoder.feed(stream().as_bytes());
        assert_eq!(
            events,
            vec![
                AgentEvent::Init {
                    session_id: Some("s-1".to_string()),
                    model: Some("m-1".to_string()),
                },
                AgentEvent::ToolUse {
                    name: "Read".to_string(),
                    input: json!({"file_path": "src/main.rs"}),
                },
                AgentEvent::Text("Done ✓".to_string()),
            ]
        );
        assert!(decoder.finish().is_empty());
    }

    #[test]
    fn split_at_every_boundary_decodes_identically() {
        let bytes = stream().into_bytes();
        let expected = StreamDecoder::new().feed(&bytes);
        // Includes splits inside the multi-byte check mark.
        for cut in 0..=bytes.len() {
            let mut decoder = StreamDecoder::new();
            let mut events = decoder.feed(&bytes[..cut]);
            events.extend(decoder.feed(&bytes[cut..]));
            events.extend(decoder.finish());
            assert_eq!(events, expected, "split at byte {cut}");
        }
    }

    #[test]
    fn three_way_split_decodes_identically() {
        let bytes = TOOL.as_bytes();
        let mut decoder = StreamDecoder::new();
        assert!(decoder.feed(&bytes[..10]).is_empty());
        assert!(decoder.feed(&bytes[10..40]).is_empty());
        let mut events = decoder.feed(&bytes[40..]);
        assert!(events.is_empty());
        events.extend(decoder.feed(b"\n"));
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn trailing_line_without_newline_is_flushed_on_finish() {
        let mut decoder = StreamDecoder::new();
        assert!(decoder.feed(TEXT.as_bytes()).is_empty());
        assert_eq!(decoder.finish(), vec![AgentEvent::Text("Done ✓".to_string())]);
    }

    #[test]
    fn malformed_lines_are_discarded() {
        let input = format!("not json\n{{\"type\":\"assistant\"\n{TEXT}\n[1,2]\n\n");
        let events = StreamDecoder::new().feed(input.as_bytes());
        assert_eq!(events, vec![AgentEvent::Text("Done ✓".to_string())]);
    }

    #[test]
    fn unknown_event_types_are_ignored() {
        let line = br#"{"type":"result","subtype":"success","result":"ok"}"#;
        assert!(decode_line(line).is_empty());
        let line = br#"{"type":"system","subtype":"compact"}"#;
        assert!(decode_line(line).is_empty());
    }

    #[test]
    fn assistant_event_with_mixed_content_yields_each_item() {
        let line = br#"{"type":"assistant","message":{"content":[{"type":"text","text":"a"},{"type":"thinking","thinking":"x"},{"type":"tool_use","name":"Bash","input":{"command":"ls"}}]}}"#;
        let events = decode_line(line);
        assert_eq!(events.len(), 2);
        assert_eq!(events[0], AgentEvent::Text("a".to_string()));
    }

    #[test]
    fn crlf_lines_are_accepted() {
        let input = format!("{TEXT}\r\n");
        assert_eq!(StreamDecoder::new().feed(input.as_bytes()).len(), 1);
    }

    #[test]
    fn tool_summaries_extract_arguments() {
        assert_eq!(
            tool_summary("Edit", &json!({"file_path": "a.rs", "old_string": "x"})),
            "Edit a.rs"
        );
        assert_eq!(
            tool_summary("Bash", &json!({"command": "cargo fmt\ncargo test", "description": "Format code"})),
            "Bash Format code"
        );
        assert_eq!(
            tool_summary("Bash", &json!({"command": "cargo fmt\ncargo test"})),
            "Bash cargo fmt"
        );
        assert_eq!(
            tool_summary("Grep", &json!({"pattern": "fn main", "path": "src"})),
            "Grep fn main in src"
        );
        assert_eq!(tool_summary("Glob", &json!({"pattern": "**/*.rs"})), "Glob **/*.rs");
        assert_eq!(
            tool_summary("TodoWrite", &json!({"todos": [{}, {}, {}]})),
            "TodoWrite 3 items"
        );
        assert_eq!(tool_summary("Mystery", &json!({"x": 1})), "Mystery");
        assert_eq!(tool_summary("Read", &Value::Null), "Read");
    }

    #[test]
    fn long_details_are_truncated() {
        let long = "x".repeat(200);
        let summary = tool_summary("WebFetch", &json!({"url": long}));
        assert_eq!(summary.chars().count(), "WebFetch ".len() + MAX_DETAIL_CHARS);
        assert!(summary.ends_with("..."));
    }
}
