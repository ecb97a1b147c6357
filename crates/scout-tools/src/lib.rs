//! scout-tools: tools available to scout agents
//!
//! - Web: crawl a company site and extract readable text (`fast_web_crawler`)
//! - Search: real-time web search through Serper (`FlexibleSerperDevTool`)

pub mod search;
pub mod web;

use std::sync::Arc;

use scout_core::ToolRegistry;

pub use search::{SerperConfig, SerperSearchTool, DEFAULT_SERPER_URL, SEARCH_TOOL_NAME};
pub use web::{CrawlWebsiteTool, CrawlerConfig, CRAWLER_TOOL_NAME};

/// Settings for every known tool.
#[derive(Clone, Debug, Default)]
pub struct ToolsConfig {
    pub crawler: CrawlerConfig,
    pub serper: SerperConfig,
}

/// The fixed set of executable tools agents may name.
pub fn known_tools(config: &ToolsConfig) -> ToolRegistry {
    ToolRegistry::new()
        .with_tool(Arc::new(CrawlWebsiteTool::new(config.crawler.clone())))
        .with_tool(Arc::new(SerperSearchTool::new(config.serper.clone())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_tools() {
        let registry = known_tools(&ToolsConfig::default());
        assert_eq!(registry.len(), 2);
        assert!(registry.contains(CRAWLER_TOOL_NAME));
        assert!(registry.contains(SEARCH_TOOL_NAME));
    }

    #[test]
    fn test_known_tools_subset() {
        let registry = known_tools(&ToolsConfig::default());
        let subset = registry.subset(&[SEARCH_TOOL_NAME, "unknown"]);
        assert_eq!(subset.names(), vec![SEARCH_TOOL_NAME]);
    }
}
