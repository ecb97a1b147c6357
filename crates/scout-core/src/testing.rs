//! Test utilities shared across the workspace.
//! Only compiled when running tests or with the `testing` feature.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Mutex;

use crate::error::Error;
use crate::provider::{CallRequest, LanguageModel};
use crate::tool::{PropertySchema, Tool, ToolDefinition, ToolOutput, ToolParameters};

/// A mock model that returns pre-configured replies.
pub struct MockModel {
    responses: Mutex<Vec<Result<String, Error>>>,
    /// Captured requests (for assertion).
    pub captured_requests: Mutex<Vec<CallRequest>>,
}

impl MockModel {
    pub fn new() -> Self {
        Self {
            responses: Mutex::new(Vec::new()),
            captured_requests: Mutex::new(Vec::new()),
        }
    }

    /// Queue a reply to be returned by the next call().
    /// Replies are returned in FIFO order (first queued = first returned).
    pub fn queue_response(&self, content: &str) {
        self.responses
            .lock()
            .unwrap()
            .insert(0, Ok(content.to_string()));
    }

    /// Queue an error for the next call().
    pub fn queue_error(&self, error: Error) {
        self.responses.lock().unwrap().insert(0, Err(error));
    }

    /// Get the number of captured requests.
    pub fn request_count(&self) -> usize {
        self.captured_requests.lock().unwrap().len()
    }

    /// Get the last captured request.
    pub fn last_request(&self) -> Option<CallRequest> {
        self.captured_requests.lock().unwrap().last().cloned()
    }
}

impl Default for MockModel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LanguageModel for MockModel {
    fn name(&self) -> &str {
        "mock"
    }

    fn model(&self) -> &str {
        "mock-model"
    }

    async fn call(&self, request: CallRequest) -> Result<String, Error> {
        self.captured_requests.lock().unwrap().push(request);
        self.responses
            .lock()
            .unwrap()
            .pop()
            .unwrap_or_else(|| Err(Error::Unknown("No mock response queued".to_string())))
    }

    fn context_window_size(&self) -> u32 {
        8_192
    }
}

/// A tool with one required string argument `input` that returns fixed output.
pub struct MockTool {
    name: String,
    description: String,
    output: String,
    /// Arguments of every execute() call.
    pub calls: Mutex<Vec<Value>>,
}

impl MockTool {
    pub fn new(name: &str, description: &str, output: &str) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            output: output.to_string(),
            calls: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl Tool for MockTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(&self.name, &self.description).with_parameters(
            ToolParameters::new().add_property("input", PropertySchema::string("Input"), true),
        )
    }

    async fn execute(&self, arguments: Value) -> Result<ToolOutput, Error> {
        self.calls.lock().unwrap().push(arguments);
        Ok(ToolOutput::success(&self.output))
    }
}
