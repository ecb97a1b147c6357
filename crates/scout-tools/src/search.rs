//! Web search through the Serper Google Search API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use scout_core::{Error, PropertySchema, Tool, ToolDefinition, ToolOutput, ToolParameters};

pub const SEARCH_TOOL_NAME: &str = "FlexibleSerperDevTool";
pub const DEFAULT_SERPER_URL: &str = "https://google.serper.dev/search";

#[derive(Clone, Debug)]
pub struct SerperConfig {
    pub api_key: Option<String>,
    pub endpoint: String,
    /// Results requested per query.
    pub num_results: u32,
}

impl Default for SerperConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            endpoint: DEFAULT_SERPER_URL.to_string(),
            num_results: 10,
        }
    }
}

impl SerperConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: Some(api_key.into()),
            ..Self::default()
        }
    }
}

pub struct SerperSearchTool {
    client: Client,
    config: SerperConfig,
}

impl SerperSearchTool {
    pub fn new(config: SerperConfig) -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(60))
                .build()
                .unwrap_or_default(),
            config,
        }
    }
}

#[derive(Deserialize)]
struct SearchArgs {
    search_query: String,
}

#[derive(Serialize)]
struct SerperRequest<'a> {
    q: &'a str,
    num: u32,
}

#[async_trait]
impl Tool for SerperSearchTool {
    fn name(&self) -> &str {
        SEARCH_TOOL_NAME
    }

    fn description(&self) -> &str {
        "Use Serper DevTool to fetch real-time, up-to-date information from the web like news, facts, or recent data. Invoke it only when current or external information is needed."
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(self.name(), self.description()).with_parameters(
            ToolParameters::new().add_property(
                "search_query",
                PropertySchema::string("The search query to search for information on the web"),
                true,
            ),
        )
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolOutput, Error> {
        let args: SearchArgs = serde_json::from_value(arguments)
            .map_err(|e| Error::tool(SEARCH_TOOL_NAME, format!("Invalid arguments: {}", e)))?;

        let api_key = self
            .config
            .api_key
            .as_deref()
            .filter(|key| !key.is_empty())
            .ok_or_else(|| Error::tool(SEARCH_TOOL_NAME, "Serper API key is not configured"))?;

        debug!(query = %args.search_query, num = self.config.num_results, "Serper search");

        let response = self
            .client
            .post(&self.config.endpoint)
            .header("X-API-KEY", api_key)
            .json(&SerperRequest {
                q: &args.search_query,
                num: self.config.num_results,
            })
            .send()
            .await
            .map_err(|e| Error::tool(SEARCH_TOOL_NAME, format!("Search request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!(status = status.as_u16(), body = %body, "Serper search failed");
            return Err(Error::tool(
                SEARCH_TOOL_NAME,
                format!("Search API error {}: {}", status, body),
            ));
        }

        let result: serde_json::Value = response.json().await.map_err(|e| {
            Error::tool(SEARCH_TOOL_NAME, format!("Failed to parse search response: {}", e))
        })?;

        Ok(ToolOutput::success(result.to_string()))
    }
}
