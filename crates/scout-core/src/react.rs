//! The ReAct transcript grammar.
//!
//! Agent loops speak a line-oriented protocol layered over free text:
//!
//! ```text
//! Thought: <reasoning>
//! Action: <tool name>
//! Action Input: <json object>
//! Observation: <json object>
//! Final Answer: <text>
//! ```
//!
//! [`parse_turn`] reads one transcript turn with a small state machine
//! ([`GrammarState`]). Each anchor is located independently in the text, so
//! the states fix the order in which anchors are *required*, not the order in
//! which they must appear. The `render_*` functions produce the exact lines an
//! agent loop expects back.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::{json, Map, Value};

pub const THOUGHT: &str = "Thought:";
pub const ACTION: &str = "Action:";
pub const ACTION_INPUT: &str = "Action Input:";
pub const OBSERVATION: &str = "Observation:";
pub const FINAL_ANSWER: &str = "Final Answer:";

/// Thought line used when the model called a tool without visible reasoning.
pub const DEFAULT_TOOL_THOUGHT: &str = "I need to use a tool.";
/// Thought line used when the model answered without visible reasoning.
pub const DEFAULT_ANSWER_THOUGHT: &str = "I can answer this directly.";

static ACTION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Action:\s*(\w+)").expect("valid action pattern"));
static OBSERVATION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)Observation:\s*(\{.*\})").expect("valid observation pattern")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrammarState {
    ExpectThought,
    ExpectAction,
    ExpectInput,
    ExpectObservation,
    Complete,
}

/// A tool invocation recovered from free text.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActionBlock {
    /// Reasoning before the `Action:` marker with the `Thought:` label removed.
    pub thought: Option<String>,
    pub tool: String,
    /// Raw object literal following `Action Input:`.
    pub input: String,
    /// Raw object literal following `Observation:`, if the turn carries one.
    pub observation: Option<String>,
}

impl ActionBlock {
    /// The action input as an argument map; empty when it is not a JSON object.
    pub fn arguments(&self) -> Map<String, Value> {
        match serde_json::from_str::<Value>(&self.input) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        }
    }

    /// The observation as JSON, wrapped as `{"text": raw}` when it does not parse.
    pub fn observation_value(&self) -> Option<Value> {
        self.observation.as_ref().map(|raw| {
            serde_json::from_str::<Value>(raw).unwrap_or_else(|_| json!({ "text": raw }))
        })
    }
}

/// Result of reading one transcript turn.
#[derive(Debug, Clone, PartialEq)]
pub enum ReactTurn {
    /// No complete action/input pair; the turn is carried verbatim.
    Text(String),
    Action(ActionBlock),
}

/// Parse one transcript turn into an action block or literal text.
///
/// An `Action:` without a usable `Action Input:` object stays literal text.
pub fn parse_turn(text: &str) -> ReactTurn {
    let mut state = GrammarState::ExpectThought;
    let mut block = ActionBlock::default();

    loop {
        state = match state {
            GrammarState::ExpectThought => {
                block.thought = thought_context(text);
                GrammarState::ExpectAction
            }
            GrammarState::ExpectAction => match ACTION_RE.captures(text) {
                Some(caps) => {
                    block.tool = caps[1].to_string();
                    GrammarState::ExpectInput
                }
                None => return ReactTurn::Text(text.to_string()),
            },
            GrammarState::ExpectInput => match find_action_input(text) {
                Some(input) => {
                    block.input = input.to_string();
                    GrammarState::ExpectObservation
                }
                None => return ReactTurn::Text(text.to_string()),
            },
            GrammarState::ExpectObservation => {
                block.observation = OBSERVATION_RE
                    .captures(text)
                    .map(|caps| caps[1].trim().to_string());
                GrammarState::Complete
            }
            GrammarState::Complete => return ReactTurn::Action(block),
        };
    }
}

fn thought_context(text: &str) -> Option<String> {
    let before = text.split(ACTION).next().unwrap_or("").trim();
    if !before.contains(THOUGHT) {
        return None;
    }
    let thought = before.replace(THOUGHT, "").trim().to_string();
    (!thought.is_empty()).then_some(thought)
}

/// First object literal after an `Action Input:` marker, matched by brace depth.
fn find_action_input(text: &str) -> Option<&str> {
    text.match_indices(ACTION_INPUT).find_map(|(idx, marker)| {
        let rest = text[idx + marker.len()..].trim_start();
        if rest.starts_with('{') {
            balanced_object(rest)
        } else {
            None
        }
    })
}

fn balanced_object(text: &str) -> Option<&str> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in text.char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(&text[..=i]);
                }
            }
            _ => {}
        }
    }
    None
}

/// What an agent loop should do with a model reply.
#[derive(Debug, Clone, PartialEq)]
pub enum AgentReply {
    FinalAnswer(String),
    Action(ActionBlock),
    /// The model surfaced a pending tool result instead of acting.
    Observation(String),
    Text(String),
}

pub fn parse_reply(text: &str) -> AgentReply {
    if let Some((_, answer)) = text.split_once(FINAL_ANSWER) {
        return AgentReply::FinalAnswer(answer.trim().to_string());
    }
    match parse_turn(text) {
        ReactTurn::Action(block) => AgentReply::Action(block),
        ReactTurn::Text(text) => match text.trim_start().strip_prefix(OBSERVATION) {
            Some(rest) => AgentReply::Observation(rest.trim().to_string()),
            None => AgentReply::Text(text),
        },
    }
}

fn thought_line(thought: &str, default: &str) -> String {
    let thought = thought.trim();
    if thought.is_empty() {
        format!("{} {}", THOUGHT, default)
    } else if thought.starts_with(THOUGHT) {
        thought.to_string()
    } else {
        format!("{} {}", THOUGHT, thought)
    }
}

pub fn render_action(thought: &str, tool: &str, input: &str) -> String {
    format!(
        "{}\n{} {}\n{} {}",
        thought_line(thought, DEFAULT_TOOL_THOUGHT),
        ACTION,
        tool,
        ACTION_INPUT,
        input
    )
}

pub fn render_final_answer(thought: &str, answer: &str) -> String {
    format!(
        "{}\n{} {}",
        thought_line(thought, DEFAULT_ANSWER_THOUGHT),
        FINAL_ANSWER,
        answer.trim()
    )
}

pub fn render_observation(result: &str) -> String {
    format!("{} {}", OBSERVATION, result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_thought_action_input() {
        let text = "Thought: I should search.\nAction: Search\nAction Input: {\"query\": \"OpenAI\"}";
        let ReactTurn::Action(block) = parse_turn(text) else {
            panic!("Expected action block");
        };
        assert_eq!(block.thought.as_deref(), Some("I should search."));
        assert_eq!(block.tool, "Search");
        assert_eq!(block.arguments()["query"], "OpenAI");
        assert!(block.observation.is_none());
    }

    #[test]
    fn test_parse_with_observation() {
        let text = "Thought: I should search.\nAction: Search\nAction Input: {\"query\": \"OpenAI\"}\nObservation: {\"result\": \"found\"}";
        let ReactTurn::Action(block) = parse_turn(text) else {
            panic!("Expected action block");
        };
        assert_eq!(block.observation_value(), Some(json!({"result": "found"})));
    }

    #[test]
    fn test_action_without_input_is_text() {
        let text = "Thought: hmm\nAction: Search\nAction Input: not json";
        assert_eq!(parse_turn(text), ReactTurn::Text(text.to_string()));
    }

    #[test]
    fn test_plain_text_is_text() {
        assert_eq!(
            parse_turn("Tell me about OpenAI"),
            ReactTurn::Text("Tell me about OpenAI".to_string())
        );
    }

    #[test]
    fn test_nested_action_input() {
        let text = "Action: crawl\nAction Input: {\"opts\": {\"url\": \"https://a.com/}\"}} trailing";
        let ReactTurn::Action(block) = parse_turn(text) else {
            panic!("Expected action block");
        };
        assert_eq!(block.input, "{\"opts\": {\"url\": \"https://a.com/}\"}}");
        assert_eq!(block.arguments()["opts"]["url"], "https://a.com/}");
        assert!(block.thought.is_none());
    }

    #[test]
    fn test_invalid_input_json_yields_empty_arguments() {
        let text = "Action: Search\nAction Input: {'query': 'x'}";
        let ReactTurn::Action(block) = parse_turn(text) else {
            panic!("Expected action block");
        };
        assert!(block.arguments().is_empty());
    }

    #[test]
    fn test_unparseable_observation_is_wrapped() {
        let text = "Action: Search\nAction Input: {}\nObservation: {not json}";
        let ReactTurn::Action(block) = parse_turn(text) else {
            panic!("Expected action block");
        };
        assert_eq!(block.observation_value(), Some(json!({"text": "{not json}"})));
    }

    #[test]
    fn test_parse_reply_variants() {
        assert_eq!(
            parse_reply("Thought: done\nFinal Answer: Paris"),
            AgentReply::FinalAnswer("Paris".to_string())
        );
        assert!(matches!(
            parse_reply("Thought: x\nAction: Search\nAction Input: {\"query\": \"a\"}"),
            AgentReply::Action(_)
        ));
        assert_eq!(
            parse_reply("Observation: {\"a\": 1}"),
            AgentReply::Observation("{\"a\": 1}".to_string())
        );
        assert_eq!(parse_reply("hello"), AgentReply::Text("hello".to_string()));
    }

    #[test]
    fn test_render_final_answer_default_thought() {
        assert_eq!(
            render_final_answer("", "Paris is the capital of France."),
            "Thought: I can answer this directly.\nFinal Answer: Paris is the capital of France."
        );
    }

    #[test]
    fn test_render_action_keeps_existing_label() {
        assert_eq!(
            render_action("Thought: look it up\n", "Search", "{\"query\":\"x\"}"),
            "Thought: look it up\nAction: Search\nAction Input: {\"query\":\"x\"}"
        );
        assert_eq!(
            render_action("", "Search", "{}"),
            "Thought: I need to use a tool.\nAction: Search\nAction Input: {}"
        );
    }
}
