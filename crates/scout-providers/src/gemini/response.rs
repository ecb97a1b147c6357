//! Reading a Gemini response and re-encoding it for the calling agent loop.

use serde_json::{json, Map, Value};
use sha2::{Digest, Sha256};
use tracing::{debug, error};

use scout_core::react::{render_action, render_final_answer, render_observation, ACTION, OBSERVATION, THOUGHT};
use scout_core::Transcript;

use super::types::{GeminiPart, GeminiResponse};

pub const EMPTY_RESPONSE_APOLOGY: &str =
    "I apologize, but I couldn't generate a response. Please try again.";

/// Argument keys injected by agent orchestration that must not reach a tool.
const INTERNAL_KEYS: &[&str] = &["security_context", "metadata", "agent_id"];

/// Keys that mark a nested object as the real tool arguments.
const ARGUMENT_HINTS: &[&str] = &["url", "query"];

type CleanStrategy = fn(&Map<String, Value>) -> Option<Map<String, Value>>;

/// Tried in order; the first non-empty result wins.
const CLEAN_STRATEGIES: &[CleanStrategy] = &[strip_internal_keys, nested_arguments, raw_arguments];

fn strip_internal_keys(args: &Map<String, Value>) -> Option<Map<String, Value>> {
    Some(
        args.iter()
            .filter(|(key, _)| !INTERNAL_KEYS.contains(&key.as_str()))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect(),
    )
}

fn nested_arguments(args: &Map<String, Value>) -> Option<Map<String, Value>> {
    args.values().find_map(|value| match value {
        Value::Object(inner) if ARGUMENT_HINTS.iter().any(|hint| inner.contains_key(*hint)) => {
            Some(inner.clone())
        }
        _ => None,
    })
}

fn raw_arguments(args: &Map<String, Value>) -> Option<Map<String, Value>> {
    Some(args.clone())
}

fn clean_arguments(args: &Map<String, Value>) -> Map<String, Value> {
    CLEAN_STRATEGIES
        .iter()
        .find_map(|strategy| strategy(args).filter(|cleaned| !cleaned.is_empty()))
        .unwrap_or_default()
}

/// JSON with object keys sorted at every level.
fn canonical_json(value: &Value) -> String {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let fields: Vec<String> = keys
                .into_iter()
                .map(|key| format!("{}:{}", Value::String(key.clone()), canonical_json(&map[key])))
                .collect();
            format!("{{{}}}", fields.join(","))
        }
        Value::Array(items) => {
            let items: Vec<String> = items.iter().map(canonical_json).collect();
            format!("[{}]", items.join(","))
        }
        other => other.to_string(),
    }
}

/// Deterministic call identifier: `call_` plus 8 hex chars of a content hash.
pub fn call_id(name: &str, arguments: &Map<String, Value>) -> String {
    let source = format!("{}_{}", name, canonical_json(&Value::Object(arguments.clone())));
    let digest = Sha256::digest(source.as_bytes());
    format!("call_{}", &hex::encode(digest)[..8])
}

/// A function call requested by the model, with cleaned arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionCallResult {
    pub id: String,
    pub name: String,
    pub arguments: Map<String, Value>,
}

impl FunctionCallResult {
    pub fn new(name: impl Into<String>, raw_args: &Value) -> Self {
        let name = name.into();
        let arguments = match raw_args {
            Value::Object(args) => clean_arguments(args),
            _ => Map::new(),
        };
        Self {
            id: call_id(&name, &arguments),
            name,
            arguments,
        }
    }

    pub fn arguments_json(&self) -> String {
        Value::Object(self.arguments.clone()).to_string()
    }

    /// The tool-call envelope returned to callers outside ReAct mode.
    pub fn to_value(&self) -> Value {
        json!({
            "tool_calls": [{
                "id": self.id,
                "type": "function",
                "function": {
                    "name": self.name,
                    "arguments": self.arguments_json(),
                }
            }]
        })
    }
}

/// What the first candidate of a response carried.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedResponse {
    /// Thought parts, each followed by a newline.
    pub thoughts: String,
    pub text: String,
    /// Last function call among the parts.
    pub function_call: Option<FunctionCallResult>,
}

impl ParsedResponse {
    /// Parse a raw response body. Shape errors are logged and yield an empty result.
    pub(crate) fn from_body(body: &Value) -> Self {
        match serde_json::from_value::<GeminiResponse>(body.clone()) {
            Ok(response) => Self::from_response(&response),
            Err(e) => {
                error!(error = %e, "Error parsing Gemini response");
                debug!(body = %body, "Raw response");
                Self::default()
            }
        }
    }

    pub(crate) fn from_response(response: &GeminiResponse) -> Self {
        if let Some(usage) = &response.usage_metadata {
            debug!(
                prompt_tokens = ?usage.prompt_token_count,
                output_tokens = ?usage.candidates_token_count,
                thought_tokens = ?usage.thoughts_token_count,
                "Gemini usage"
            );
        }

        let Some(candidate) = response.candidates.as_ref().and_then(|c| c.first()) else {
            error!("Error parsing Gemini response: no candidates");
            return Self::default();
        };
        let Some(content) = &candidate.content else {
            error!(finish_reason = ?candidate.finish_reason, "Error parsing Gemini response: candidate has no content");
            return Self::default();
        };

        let mut parsed = Self::default();
        for part in &content.parts {
            match part {
                GeminiPart::Text { text, thought: true } => {
                    parsed.thoughts.push_str(text);
                    parsed.thoughts.push('\n');
                }
                GeminiPart::FunctionCall { function_call } => {
                    parsed.function_call =
                        Some(FunctionCallResult::new(&function_call.name, &function_call.args));
                }
                GeminiPart::Text { text, thought: false } => parsed.text.push_str(text),
                GeminiPart::FunctionResponse { .. } | GeminiPart::Other(_) => {}
            }
        }
        parsed
    }

    /// Encode the response as the text the agent loop expects.
    pub fn render(&self, transcript: &Transcript) -> String {
        if is_react_mode(transcript) {
            if let Some(result) = pending_tool_result(transcript) {
                return render_observation(&result);
            }
            if let Some(call) = &self.function_call {
                return render_action(&self.thoughts, &call.name, &call.arguments_json());
            }
            if !self.text.trim().is_empty() {
                return render_final_answer(&self.thoughts, &self.text);
            }
        }

        match &self.function_call {
            Some(call) => call.to_value().to_string(),
            None => self.text.clone(),
        }
    }
}

/// Whether the system turn instructs the model to use the ReAct grammar.
pub fn is_react_mode(transcript: &Transcript) -> bool {
    let system = transcript.system_text();
    [ACTION, OBSERVATION, THOUGHT]
        .iter()
        .any(|marker| system.contains(marker))
}

/// A tool result sitting in the transcript that the loop has not consumed.
///
/// Turns are scanned newest first; the first turn that looks like a result
/// decides, and an empty result counts as none.
pub fn pending_tool_result(transcript: &Transcript) -> Option<String> {
    for turn in transcript.turns().iter().rev() {
        let content = &turn.content;
        let lowered = content.to_lowercase();
        if lowered.contains("tool_result:") || lowered.contains("function_call_result:") {
            let value = content.split_once(':').map(|(_, rest)| rest.trim()).unwrap_or("");
            return (!value.is_empty()).then(|| value.to_string());
        }
        if content.starts_with('{') && content.ends_with('}') {
            match serde_json::from_str::<Value>(content) {
                Ok(Value::Object(map)) => {
                    return (!map.is_empty()).then(|| Value::Object(map).to_string());
                }
                _ => continue,
            }
        }
    }
    None
}
