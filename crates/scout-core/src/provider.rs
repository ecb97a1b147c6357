use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Error;
use crate::message::Transcript;
use crate::tool::{ToolRegistry, ToolSpec};

/// One model invocation as issued by an agent loop.
#[derive(Debug, Clone)]
pub struct CallRequest {
    pub transcript: Transcript,
    /// Explicit declarations. When absent they are recovered from the system turn.
    pub tools: Option<Vec<ToolSpec>>,
    /// Executable tools by name. Also declared to the model unless already named.
    pub available_functions: Option<Arc<ToolRegistry>>,
}

impl CallRequest {
    pub fn new(transcript: impl Into<Transcript>) -> Self {
        Self {
            transcript: transcript.into(),
            tools: None,
            available_functions: None,
        }
    }

    pub fn with_tools(mut self, tools: Vec<ToolSpec>) -> Self {
        self.tools = Some(tools);
        self
    }

    pub fn with_functions(mut self, functions: Arc<ToolRegistry>) -> Self {
        self.available_functions = Some(functions);
        self
    }
}

/// A text-in, text-out model as seen by a ReAct agent loop.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    fn name(&self) -> &str;

    fn model(&self) -> &str;

    /// Run one request and return text in free form or ReAct grammar.
    async fn call(&self, request: CallRequest) -> Result<String, Error>;

    fn supports_function_calling(&self) -> bool {
        false
    }

    fn context_window_size(&self) -> u32;
}
