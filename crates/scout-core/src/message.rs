use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    /// Parse a role name. Anything unrecognised is treated as `user`.
    pub fn parse(name: &str) -> Self {
        match name {
            "system" => Role::System,
            "assistant" => Role::Assistant,
            _ => Role::User,
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::System => write!(f, "system"),
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
        }
    }
}

/// One role-tagged entry of a transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawTurn")]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

impl Turn {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// Wire shape accepted from agent frameworks: `content` may be any JSON value.
#[derive(Deserialize)]
struct RawTurn {
    #[serde(default)]
    role: String,
    #[serde(default)]
    content: Value,
}

impl From<RawTurn> for Turn {
    fn from(raw: RawTurn) -> Self {
        let content = match raw.content {
            Value::String(s) => s,
            Value::Null => String::new(),
            other => other.to_string(),
        };
        Turn::new(Role::parse(&raw.role), content)
    }
}

/// Conversation history handed to a model: a bare prompt or an ordered list of turns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Transcript {
    Prompt(String),
    Turns(Vec<Turn>),
}

impl Transcript {
    pub fn turns(&self) -> &[Turn] {
        match self {
            Transcript::Prompt(_) => &[],
            Transcript::Turns(turns) => turns,
        }
    }

    /// Text of the first system turn, or `""` when there is none.
    pub fn system_text(&self) -> &str {
        self.turns()
            .iter()
            .find(|t| t.role == Role::System)
            .map(|t| t.content.as_str())
            .unwrap_or("")
    }

    pub fn len(&self) -> usize {
        match self {
            Transcript::Prompt(_) => 1,
            Transcript::Turns(turns) => turns.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl From<String> for Transcript {
    fn from(s: String) -> Self {
        Transcript::Prompt(s)
    }
}

impl From<&str> for Transcript {
    fn from(s: &str) -> Self {
        Transcript::Prompt(s.to_string())
    }
}

impl From<Vec<Turn>> for Transcript {
    fn from(turns: Vec<Turn>) -> Self {
        Transcript::Turns(turns)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_display() {
        assert_eq!(Role::User.to_string(), "user");
        assert_eq!(Role::Assistant.to_string(), "assistant");
    }

    #[test]
    fn test_unknown_role_maps_to_user() {
        assert_eq!(Role::parse("tool"), Role::User);
        assert_eq!(Role::parse("system"), Role::System);
    }

    #[test]
    fn test_turn_coerces_non_string_content() {
        let turns: Vec<Turn> = serde_json::from_str(
            r#"[{"role": "user", "content": {"result": "found"}}, {"role": "assistant"}]"#,
        )
        .unwrap();
        assert_eq!(turns[0].content, r#"{"result":"found"}"#);
        assert_eq!(turns[1].content, "");
    }

    #[test]
    fn test_system_text_first_wins() {
        let transcript = Transcript::from(vec![
            Turn::user("hi"),
            Turn::system("first"),
            Turn::system("second"),
        ]);
        assert_eq!(transcript.system_text(), "first");
        assert_eq!(Transcript::from("prompt").system_text(), "");
    }

    #[test]
    fn test_transcript_deserializes_both_shapes() {
        let prompt: Transcript = serde_json::from_str(r#""Summarize OpenAI""#).unwrap();
        assert_eq!(prompt, Transcript::Prompt("Summarize OpenAI".to_string()));

        let turns: Transcript =
            serde_json::from_str(r#"[{"role": "system", "content": "Be brief."}]"#).unwrap();
        assert_eq!(turns.turns().len(), 1);
        assert_eq!(turns.system_text(), "Be brief.");
    }
}
