//! Gemini `generateContent` adapter speaking the ReAct text grammar.

mod contents;
mod response;
mod schema;
mod tools;
mod types;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, error, trace, warn};

use scout_core::{CallRequest, Error, LanguageModel, RetryPolicy, ToolRegistry, ToolSpec, Transcript};

use crate::context_windows::known_context_window;

pub use response::{
    call_id, is_react_mode, pending_tool_result, FunctionCallResult, ParsedResponse,
    EMPTY_RESPONSE_APOLOGY,
};
pub use schema::{normalize_parameters, normalize_properties};

use contents::to_contents;
use tools::{build_declarations, extract_tools};
use types::{
    GeminiContent, GeminiGenerationConfig, GeminiPart, GeminiRequest, GeminiThinkingConfig,
    GeminiToolsEntry,
};

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_THINKING_BUDGET: u32 = 1000;
const DEFAULT_CONTEXT_WINDOW: u32 = 1_000_000;

pub struct GeminiProvider {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    temperature: Option<f32>,
    thinking_budget: u32,
    retry: RetryPolicy,
    known_tools: Arc<ToolRegistry>,
}

impl GeminiProvider {
    pub fn new(api_key: impl Into<String>) -> Self {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            client,
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            temperature: None,
            thinking_budget: DEFAULT_THINKING_BUDGET,
            retry: RetryPolicy::default(),
            known_tools: Arc::new(ToolRegistry::new()),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Tools that declarations recovered from a system turn may bind to.
    pub fn with_known_tools(mut self, known_tools: Arc<ToolRegistry>) -> Self {
        self.known_tools = known_tools;
        self
    }

    /// Fill in whichever of declarations and bindings the caller left out
    /// from the tool blocks of the system turn.
    fn resolve_tools(
        &self,
        transcript: &Transcript,
        tools: Option<Vec<ToolSpec>>,
        functions: Option<Arc<ToolRegistry>>,
    ) -> (Vec<ToolSpec>, Option<Arc<ToolRegistry>>) {
        let tools = tools.filter(|t| !t.is_empty());
        let functions = functions.filter(|f| !f.is_empty());
        if tools.is_some() && functions.is_some() {
            return (tools.unwrap_or_default(), functions);
        }

        match extract_tools(transcript, &self.known_tools) {
            Some(extracted) => {
                let tools = tools.unwrap_or_else(|| {
                    extracted.declarations.into_iter().map(ToolSpec::from).collect()
                });
                let functions = functions.or_else(|| {
                    (!extracted.bindings.is_empty()).then(|| Arc::new(extracted.bindings))
                });
                (tools, functions)
            }
            None => (tools.unwrap_or_default(), functions),
        }
    }

    fn build_request(
        &self,
        transcript: &Transcript,
        tools: &[ToolSpec],
        functions: Option<&Arc<ToolRegistry>>,
    ) -> GeminiRequest {
        let (contents, instruction) = to_contents(transcript);
        let declarations = build_declarations(tools, functions);

        GeminiRequest {
            contents,
            system_instruction: instruction.map(|text| GeminiContent {
                role: None,
                parts: vec![GeminiPart::text(text)],
            }),
            tools: (!declarations.is_empty()).then(|| {
                vec![GeminiToolsEntry {
                    function_declarations: declarations,
                }]
            }),
            generation_config: GeminiGenerationConfig {
                temperature: self.temperature,
                thinking_config: GeminiThinkingConfig {
                    thinking_budget: self.thinking_budget,
                    include_thoughts: true,
                },
            },
        }
    }

    fn parse_error(&self, status: u16, body: &str) -> Error {
        #[derive(Deserialize)]
        struct ErrorResponse {
            error: ErrorDetail,
        }

        #[derive(Deserialize)]
        struct ErrorDetail {
            message: String,
        }

        if let Ok(err) = serde_json::from_str::<ErrorResponse>(body) {
            match status {
                401 | 403 => Error::auth(err.error.message),
                429 => Error::rate_limit(err.error.message),
                400 => Error::invalid_request(err.error.message),
                _ => Error::api(status, err.error.message),
            }
        } else {
            Error::api(status, body.to_string())
        }
    }

    /// One round trip. Returns the decoded response body.
    async fn send(&self, api_request: &GeminiRequest) -> Result<Value, Error> {
        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.base_url, self.model, self.api_key
        );

        let response = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .json(api_request)
            .send()
            .await
            .map_err(|e| Error::network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            error!(status = status.as_u16(), body = %error_text, "Gemini request failed");
            return Err(self.parse_error(status.as_u16(), &error_text));
        }

        let response_text = response
            .text()
            .await
            .map_err(|e| Error::network(e.to_string()))?;

        trace!(response = %response_text, "Gemini response payload");

        serde_json::from_str(&response_text).map_err(|e| Error::serialization(e.to_string()))
    }
}

fn has_candidates(body: &Value) -> bool {
    body.get("candidates")
        .and_then(Value::as_array)
        .is_some_and(|candidates| !candidates.is_empty())
}

#[async_trait]
impl LanguageModel for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn call(&self, request: CallRequest) -> Result<String, Error> {
        let CallRequest {
            transcript,
            tools,
            available_functions,
        } = request;

        let (tools, functions) = self.resolve_tools(&transcript, tools, available_functions);
        let api_request = self.build_request(&transcript, &tools, functions.as_ref());

        debug!(
            model = %self.model,
            content_count = api_request.contents.len(),
            declarations = api_request
                .tools
                .as_ref()
                .map_or(0, |t| t.iter().map(|e| e.function_declarations.len()).sum::<usize>()),
            has_system_instruction = api_request.system_instruction.is_some(),
            "Gemini request"
        );
        trace!(request = %serde_json::to_string(&api_request).unwrap_or_default(), "Gemini request payload");

        let api_request = &api_request;
        let body = self
            .retry
            .run("gemini", move |attempt| async move {
                debug!(attempt, "Calling Gemini");
                self.send(api_request).await
            })
            .await?;

        if !has_candidates(&body) {
            warn!(model = %self.model, "Gemini returned no candidates");
            return Ok(EMPTY_RESPONSE_APOLOGY.to_string());
        }

        let parsed = ParsedResponse::from_body(&body);
        debug!(
            thoughts_len = parsed.thoughts.len(),
            text_len = parsed.text.len(),
            function_call = parsed.function_call.as_ref().map(|c| c.name.as_str()),
            "Gemini response"
        );

        Ok(parsed.render(&transcript))
    }

    fn supports_function_calling(&self) -> bool {
        true
    }

    fn context_window_size(&self) -> u32 {
        known_context_window(&self.model).unwrap_or(DEFAULT_CONTEXT_WINDOW)
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────
