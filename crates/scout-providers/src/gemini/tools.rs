//! Tool declarations: recovering them from the system turn and merging them
//! with explicit declarations and executable tools.
//!
//! Agent frameworks describe tools inside the system prompt as blocks of
//!
//! ```text
//! Tool Name: <name>
//! Tool Arguments: <dict>
//! Tool Description: <text>
//! ```
//!
//! A block ends at the next `\nTool Name:` or at the end of the text.

use std::collections::HashSet;
use std::sync::{Arc, LazyLock};

use regex::Regex;
use serde_json::{json, Map, Value};
use tracing::{debug, error};

use scout_core::{empty_object_schema, FunctionDeclaration, Tool, ToolRegistry, ToolSpec, Transcript};

use super::schema::{normalize_parameters, normalize_properties};

const TOOL_NAME: &str = "Tool Name:";
const NEXT_TOOL_NAME: &str = "\nTool Name:";

static TOOL_BLOCK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)\ATool Name:\s*(.+?)\nTool Arguments:\s*(\{.*?\})\nTool Description:\s*(.+)")
        .expect("valid tool block pattern")
});

/// Byte ranges of every tool block in `text`.
fn tool_block_spans(text: &str) -> Vec<(usize, usize)> {
    let mut spans = Vec::new();
    let mut cursor = 0;
    while let Some(offset) = text[cursor..].find(TOOL_NAME) {
        let start = cursor + offset;
        let body = start + TOOL_NAME.len();
        let end = text[body..]
            .find(NEXT_TOOL_NAME)
            .map(|idx| body + idx)
            .unwrap_or(text.len());
        spans.push((start, end));
        cursor = end;
    }
    spans
}

/// The system text with all tool blocks removed, trimmed.
pub(crate) fn strip_tool_blocks(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut cursor = 0;
    for (start, end) in tool_block_spans(text) {
        out.push_str(&text[cursor..start]);
        cursor = end;
    }
    out.push_str(&text[cursor..]);
    out.trim().to_string()
}

/// Declarations parsed from the system turn, plus the known tools they name.
pub(crate) struct ExtractedTools {
    pub declarations: Vec<FunctionDeclaration>,
    pub bindings: ToolRegistry,
}

/// Parse tool blocks from the transcript's system turn.
///
/// Returns `None` when there is no system text. Blocks that do not match the
/// expected layout are skipped.
pub(crate) fn extract_tools(transcript: &Transcript, known: &ToolRegistry) -> Option<ExtractedTools> {
    let system = transcript.system_text();
    if system.is_empty() {
        return None;
    }

    let mut declarations = Vec::new();
    for (start, end) in tool_block_spans(system) {
        let Some(caps) = TOOL_BLOCK_RE.captures(&system[start..end]) else {
            debug!(block = %&system[start..end], "Skipping malformed tool block");
            continue;
        };
        let name = caps[1].trim().to_string();
        let properties = parse_arguments(caps[2].trim());
        let required: Vec<Value> = properties.keys().cloned().map(Value::String).collect();

        declarations.push(FunctionDeclaration::new(
            name,
            caps[3].trim(),
            json!({
                "type": "object",
                "properties": properties,
                "required": required,
            }),
        ));
    }

    let names: Vec<&str> = declarations.iter().map(|d| d.name.as_str()).collect();
    let bindings = known.subset(&names);
    debug!(
        declared = declarations.len(),
        bound = bindings.len(),
        "Extracted tools from system turn"
    );

    Some(ExtractedTools {
        declarations,
        bindings,
    })
}

/// Parse a `Tool Arguments` blob. JSON is read as is; otherwise dict-literal
/// quotes are normalized and parsing is retried. Anything that still is not a
/// JSON object yields no properties.
fn parse_arguments(raw: &str) -> Map<String, Value> {
    let parsed = serde_json::from_str::<Value>(raw)
        .or_else(|_| serde_json::from_str::<Value>(&raw.replace('\'', "\"")));
    match parsed {
        Ok(Value::Object(map)) => map
            .into_iter()
            .map(|(name, value)| (name, property_schema(value)))
            .collect(),
        Ok(_) => Map::new(),
        Err(e) => {
            error!(error = %e, arguments = %raw, "Error extracting tool arguments");
            Map::new()
        }
    }
}

fn is_type_name(name: &str) -> bool {
    matches!(
        name,
        "string" | "str" | "integer" | "int" | "number" | "float" | "boolean" | "bool" | "array" | "object"
    )
}

/// Schemas are kept as given; anything else becomes a string property.
fn property_schema(value: Value) -> Value {
    match value {
        Value::Object(mut map) => {
            map.entry("type").or_insert_with(|| json!("string"));
            Value::Object(map)
        }
        Value::String(name) if is_type_name(&name) => json!({ "type": name }),
        Value::String(description) => json!({ "type": "string", "description": description }),
        _ => json!({ "type": "string" }),
    }
}

/// Declaration for an executable tool, from its introspected argument schema.
fn declaration_for_tool(tool: &dyn Tool) -> FunctionDeclaration {
    let parameters = match tool.args_schema() {
        Ok(schema) => {
            let properties = schema
                .get("properties")
                .and_then(Value::as_object)
                .map(normalize_properties)
                .unwrap_or_default();
            let required = schema.get("required").cloned().unwrap_or_else(|| json!([]));
            json!({
                "type": "object",
                "properties": properties,
                "required": required,
            })
        }
        Err(e) => {
            debug!(tool = tool.name(), error = %e, "Tool schema unavailable, declaring without arguments");
            empty_object_schema()
        }
    };
    FunctionDeclaration::new(tool.name(), tool.description(), parameters)
}

/// Merge explicit declarations with declarations for executable tools.
///
/// Names are deduplicated by first occurrence; explicit declarations win over
/// executable tools of the same name.
pub(crate) fn build_declarations(
    tools: &[ToolSpec],
    functions: Option<&Arc<ToolRegistry>>,
) -> Vec<FunctionDeclaration> {
    let mut seen = HashSet::new();
    let mut declarations = Vec::new();

    for mut decl in tools.iter().cloned().flat_map(ToolSpec::into_declarations) {
        if !seen.insert(decl.name.clone()) {
            continue;
        }
        decl.parameters = normalize_parameters(&decl.parameters);
        declarations.push(decl);
    }

    for tool in functions.into_iter().flat_map(|registry| registry.iter()) {
        if seen.insert(tool.name().to_string()) {
            declarations.push(declaration_for_tool(tool.as_ref()));
        }
    }

    declarations
}

#[cfg(test)]
mod tests {
    use super::*;
    use scout_core::testing::MockTool;
    use scout_core::{Error, ToolDefinition, ToolOutput, Turn};

    fn system(text: &str) -> Transcript {
        Transcript::from(vec![Turn::system(text), Turn::user("go")])
    }

    #[test]
    fn test_extract_single_tool() {
        let transcript = system(
            "Tool Name: Search\nTool Arguments: {\"query\": \"string\"}\nTool Description: searches the web",
        );
        let extracted = extract_tools(&transcript, &ToolRegistry::new()).unwrap();

        assert_eq!(extracted.declarations.len(), 1);
        let decl = &extracted.declarations[0];
        assert_eq!(decl.name, "Search");
        assert_eq!(decl.description, "searches the web");
        assert_eq!(decl.parameters["properties"]["query"], json!({"type": "string"}));
        assert_eq!(decl.parameters["required"], json!(["query"]));
        assert!(extracted.bindings.is_empty());
    }

    #[test]
    fn test_extract_multiple_tools_with_quoted_dicts() {
        let transcript = system(concat!(
            "You are a crawler.\n\n",
            "Tool Name: fast_web_crawler\n",
            "Tool Arguments: {'url': {'description': 'Site URL', 'type': 'str'}}\n",
            "Tool Description: Extracts text\nfrom product pages.\n",
            "Tool Name: FlexibleSerperDevTool\n",
            "Tool Arguments: {\"search_query\": {\"type\": \"str\"}}\n",
            "Tool Description: Web search"
        ));
        let known = ToolRegistry::new().with_tool(Arc::new(MockTool::new(
            "fast_web_crawler",
            "crawl",
            "text",
        )));
        let extracted = extract_tools(&transcript, &known).unwrap();

        let names: Vec<_> = extracted.declarations.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["fast_web_crawler", "FlexibleSerperDevTool"]);
        assert_eq!(
            extracted.declarations[0].description,
            "Extracts text\nfrom product pages."
        );
        assert_eq!(
            extracted.declarations[0].parameters["properties"]["url"]["description"],
            "Site URL"
        );
        assert_eq!(extracted.bindings.names(), vec!["fast_web_crawler"]);
    }

    #[test]
    fn test_extract_json_arguments_with_apostrophe() {
        let transcript = system(
            "Tool Name: fast_web_crawler\nTool Arguments: {\"url\":{\"description\":\"The competitor's website\",\"type\":\"string\"}}\nTool Description: crawl",
        );
        let extracted = extract_tools(&transcript, &ToolRegistry::new()).unwrap();
        let params = &extracted.declarations[0].parameters;
        assert_eq!(params["properties"]["url"]["description"], "The competitor's website");
        assert_eq!(params["required"], json!(["url"]));
    }

    #[test]
    fn test_extract_unparseable_arguments() {
        let transcript = system("Tool Name: Broken\nTool Arguments: {not json}\nTool Description: x");
        let extracted = extract_tools(&transcript, &ToolRegistry::new()).unwrap();
        assert_eq!(extracted.declarations[0].parameters["properties"], json!({}));
        assert_eq!(extracted.declarations[0].parameters["required"], json!([]));
    }

    #[test]
    fn test_extract_without_system_turn() {
        assert!(extract_tools(&Transcript::from("hello"), &ToolRegistry::new()).is_none());
        assert!(extract_tools(&Transcript::from(vec![Turn::user("hi")]), &ToolRegistry::new()).is_none());
    }

    #[test]
    fn test_strip_tool_blocks() {
        let text = "Be helpful.\nTool Name: A\nTool Arguments: {}\nTool Description: a\nTool Name: B\nTool Arguments: {}\nTool Description: b";
        assert_eq!(strip_tool_blocks(text), "Be helpful.");
        assert_eq!(strip_tool_blocks("No tools here."), "No tools here.");
        assert_eq!(strip_tool_blocks("Tool Name: A\nTool Arguments: {}\nTool Description: a"), "");
    }

    #[test]
    fn test_build_declarations_dedupes_first_wins() {
        let specs = vec![
            ToolSpec::Function(FunctionDeclaration::new(
                "Search",
                "first",
                json!({"type": "object", "properties": {"q": {"type": "str"}}}),
            )),
            ToolSpec::Group {
                function_declarations: vec![
                    FunctionDeclaration::new("Search", "second", empty_object_schema()),
                    FunctionDeclaration::new("Fetch", "fetch", empty_object_schema()),
                ],
            },
        ];
        let registry = Arc::new(
            ToolRegistry::new()
                .with_tool(Arc::new(MockTool::new("Fetch", "from registry", "")))
                .with_tool(Arc::new(MockTool::new("crawl", "crawl a site", ""))),
        );

        let decls = build_declarations(&specs, Some(&registry));
        let names: Vec<_> = decls.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["Search", "Fetch", "crawl"]);
        assert_eq!(decls[0].description, "first");
        assert_eq!(decls[0].parameters["properties"]["q"]["type"], "string");
        assert_eq!(decls[1].description, "fetch");
        assert_eq!(decls[2].parameters["properties"]["input"]["type"], "string");
        assert_eq!(decls[2].parameters["required"], json!(["input"]));
    }

    struct OpaqueTool;

    #[async_trait::async_trait]
    impl Tool for OpaqueTool {
        fn name(&self) -> &str {
            "opaque"
        }

        fn description(&self) -> &str {
            "No introspectable schema"
        }

        fn definition(&self) -> ToolDefinition {
            ToolDefinition::new(self.name(), self.description())
        }

        fn args_schema(&self) -> Result<Value, Error> {
            Err(Error::Unknown("no schema".to_string()))
        }

        async fn execute(&self, _arguments: Value) -> Result<ToolOutput, Error> {
            Ok(ToolOutput::success(""))
        }
    }

    #[test]
    fn test_schema_introspection_failure_falls_back() {
        let registry = Arc::new(ToolRegistry::new().with_tool(Arc::new(OpaqueTool)));
        let decls = build_declarations(&[], Some(&registry));
        assert_eq!(decls[0].parameters, empty_object_schema());
        assert_eq!(decls[0].description, "No introspectable schema");
    }
}
