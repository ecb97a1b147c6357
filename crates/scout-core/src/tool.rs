use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::Error;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: ToolParameters,
}

impl ToolDefinition {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters: ToolParameters::default(),
        }
    }

    pub fn with_parameters(mut self, parameters: ToolParameters) -> Self {
        self.parameters = parameters;
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolParameters {
    #[serde(rename = "type")]
    pub schema_type: String,
    #[serde(default)]
    pub properties: BTreeMap<String, PropertySchema>,
    #[serde(default)]
    pub required: Vec<String>,
}

impl Default for ToolParameters {
    fn default() -> Self {
        Self {
            schema_type: "object".to_string(),
            properties: BTreeMap::new(),
            required: Vec::new(),
        }
    }
}

impl ToolParameters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_property(
        mut self,
        name: impl Into<String>,
        schema: PropertySchema,
        required: bool,
    ) -> Self {
        let name = name.into();
        self.properties.insert(name.clone(), schema);
        if required {
            self.required.push(name);
        }
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PropertySchema {
    #[serde(rename = "type")]
    pub schema_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl PropertySchema {
    pub fn string(description: impl Into<String>) -> Self {
        Self {
            schema_type: "string".to_string(),
            description: Some(description.into()),
        }
    }
}

pub fn empty_object_schema() -> Value {
    json!({ "type": "object", "properties": {} })
}

/// A function declaration as offered to a model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDeclaration {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "empty_object_schema")]
    pub parameters: Value,
}

impl FunctionDeclaration {
    pub fn new(name: impl Into<String>, description: impl Into<String>, parameters: Value) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
        }
    }
}

/// Tool declarations as callers hand them over: one flat record or a group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ToolSpec {
    Group {
        function_declarations: Vec<FunctionDeclaration>,
    },
    Function(FunctionDeclaration),
}

impl ToolSpec {
    pub fn into_declarations(self) -> Vec<FunctionDeclaration> {
        match self {
            ToolSpec::Group {
                function_declarations,
            } => function_declarations,
            ToolSpec::Function(decl) => vec![decl],
        }
    }
}

impl From<FunctionDeclaration> for ToolSpec {
    fn from(decl: FunctionDeclaration) -> Self {
        ToolSpec::Function(decl)
    }
}

#[derive(Debug, Clone)]
pub struct ToolOutput {
    pub content: String,
    pub is_error: bool,
}

impl ToolOutput {
    pub fn success(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            is_error: false,
        }
    }

    pub fn error(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            is_error: true,
        }
    }
}

#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    fn definition(&self) -> ToolDefinition;

    /// JSON schema of the tool's arguments, used to declare it to a model.
    fn args_schema(&self) -> Result<Value, Error> {
        Ok(serde_json::to_value(self.definition().parameters)?)
    }

    async fn execute(&self, arguments: Value) -> Result<ToolOutput, Error>;
}

/// Executable tools keyed by name.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, Arc<dyn Tool>>,
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.names())
            .finish()
    }
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    pub fn with_tool(mut self, tool: Arc<dyn Tool>) -> Self {
        self.register(tool);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Tool>> {
        self.tools.values()
    }

    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.values().map(|t| t.definition()).collect()
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(|s| s.as_str()).collect()
    }

    /// A registry holding only the named tools that exist here.
    pub fn subset(&self, names: &[&str]) -> ToolRegistry {
        let mut registry = ToolRegistry::new();
        for name in names {
            if let Some(tool) = self.get(name) {
                registry.register(Arc::clone(tool));
            }
        }
        registry
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }

        fn description(&self) -> &str {
            "Echo the input back"
        }

        fn definition(&self) -> ToolDefinition {
            ToolDefinition::new(self.name(), self.description()).with_parameters(
                ToolParameters::new().add_property("text", PropertySchema::string("Text"), true),
            )
        }

        async fn execute(&self, arguments: Value) -> Result<ToolOutput, Error> {
            Ok(ToolOutput::success(arguments["text"].as_str().unwrap_or("")))
        }
    }

    #[test]
    fn test_tool_definition() {
        let def = ToolDefinition::new("fast_web_crawler", "Crawl a site").with_parameters(
            ToolParameters::new().add_property("url", PropertySchema::string("Site URL"), true),
        );

        assert_eq!(def.name, "fast_web_crawler");
        assert!(def.parameters.required.contains(&"url".to_string()));
    }

    #[test]
    fn test_default_args_schema() {
        let schema = EchoTool.args_schema().unwrap();
        assert_eq!(schema["type"], "object");
        assert_eq!(schema["properties"]["text"]["type"], "string");
        assert_eq!(schema["required"], json!(["text"]));
    }

    #[test]
    fn test_tool_spec_shapes() {
        let flat: ToolSpec =
            serde_json::from_value(json!({"name": "Search", "description": "web"})).unwrap();
        assert_eq!(flat.clone().into_declarations().len(), 1);
        assert_eq!(
            flat.into_declarations()[0].parameters,
            empty_object_schema()
        );

        let group: ToolSpec = serde_json::from_value(json!({
            "function_declarations": [
                {"name": "a", "description": "", "parameters": {"type": "object"}},
                {"name": "b"}
            ]
        }))
        .unwrap();
        let names: Vec<_> = group.into_declarations().into_iter().map(|d| d.name).collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_registry() {
        let registry = ToolRegistry::new().with_tool(Arc::new(EchoTool));
        assert_eq!(registry.len(), 1);
        assert!(registry.contains("echo"));

        let output = registry
            .get("echo")
            .unwrap()
            .execute(json!({"text": "hi"}))
            .await
            .unwrap();
        assert_eq!(output.content, "hi");

        assert_eq!(registry.subset(&["echo", "missing"]).names(), vec!["echo"]);
        assert!(registry.subset(&["missing"]).is_empty());
    }
}
