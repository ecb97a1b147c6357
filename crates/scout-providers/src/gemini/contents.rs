//! Translating a transcript into Gemini `contents`.

use serde_json::Value;

use scout_core::react::{parse_turn, ReactTurn};
use scout_core::{Role, Transcript};

use super::tools::strip_tool_blocks;
use super::types::{GeminiContent, GeminiFunctionCall, GeminiFunctionResponse, GeminiPart};

fn gemini_role(role: Role) -> &'static str {
    match role {
        Role::Assistant => "model",
        Role::System | Role::User => "user",
    }
}

/// Build the request contents and the system instruction for a transcript.
///
/// The first system turn becomes the instruction with its tool blocks
/// stripped; an instruction that is empty after stripping is omitted. Other
/// system turns are dropped.
pub(crate) fn to_contents(transcript: &Transcript) -> (Vec<GeminiContent>, Option<String>) {
    let turns = match transcript {
        Transcript::Prompt(prompt) => {
            return (
                vec![GeminiContent::new("user", vec![GeminiPart::text(prompt.clone())])],
                None,
            );
        }
        Transcript::Turns(turns) => turns,
    };

    let instruction = strip_tool_blocks(transcript.system_text());
    let instruction = (!instruction.is_empty()).then_some(instruction);

    let mut contents = Vec::with_capacity(turns.len());
    for turn in turns.iter().filter(|t| t.role != Role::System) {
        let role = gemini_role(turn.role);
        match parse_turn(&turn.content) {
            ReactTurn::Action(block) => {
                let mut parts = Vec::with_capacity(2);
                if let Some(thought) = &block.thought {
                    parts.push(GeminiPart::thought(thought.clone()));
                }
                parts.push(GeminiPart::FunctionCall {
                    function_call: GeminiFunctionCall {
                        name: block.tool.clone(),
                        args: Value::Object(block.arguments()),
                    },
                });
                contents.push(GeminiContent::new("model", parts));

                if let Some(response) = block.observation_value() {
                    contents.push(GeminiContent::new(
                        "user",
                        vec![GeminiPart::FunctionResponse {
                            function_response: GeminiFunctionResponse {
                                name: block.tool,
                                response,
                            },
                        }],
                    ));
                }
            }
            ReactTurn::Text(text) => {
                contents.push(GeminiContent::new(role, vec![GeminiPart::text(text)]));
            }
        }
    }

    (contents, instruction)
}
