//! Website crawling: fetch a page, follow same-site links, extract readable text.

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use serde::Deserialize;
use tracing::{debug, info};
use url::{Host, Url};

use scout_core::{Error, PropertySchema, RetryPolicy, Tool, ToolDefinition, ToolOutput, ToolParameters};

pub const CRAWLER_TOOL_NAME: &str = "fast_web_crawler";

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/116.0.0.0 Safari/537.36";

/// Elements whose text never counts as page content.
const SKIPPED_TAGS: &[&str] = &[
    "script", "style", "noscript", "nav", "footer", "header", "aside", "template", "svg",
];

/// Second-level labels under which registrations happen one level deeper (`example.co.uk`).
const SECOND_LEVEL_LABELS: &[&str] = &["co", "com", "org", "net", "ac", "gov", "edu"];

#[derive(Clone, Debug)]
pub struct CrawlerConfig {
    /// Linked pages fetched after the start page.
    pub max_pages: usize,
    /// Pages with less extracted text than this are dropped.
    pub min_text_length: usize,
    pub timeout: Duration,
    /// Attempts per page. A failed fetch and too little text both count.
    pub max_retries: usize,
    pub retry_backoff: Duration,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            max_pages: 5,
            min_text_length: 100,
            timeout: Duration::from_secs(30),
            max_retries: 3,
            retry_backoff: Duration::from_millis(500),
        }
    }
}

pub struct CrawlWebsiteTool {
    client: Client,
    config: CrawlerConfig,
}

impl Default for CrawlWebsiteTool {
    fn default() -> Self {
        Self::new(CrawlerConfig::default())
    }
}

impl CrawlWebsiteTool {
    pub fn new(config: CrawlerConfig) -> Self {
        Self {
            client: Client::builder()
                .user_agent(USER_AGENT)
                .timeout(config.timeout)
                .build()
                .unwrap_or_default(),
            config,
        }
    }

    async fn fetch(&self, url: &Url) -> Result<String, Error> {
        let response = self
            .client
            .get(url.as_str())
            .send()
            .await
            .map_err(|e| Error::tool(CRAWLER_TOOL_NAME, format!("Failed to fetch '{}': {}", url, e)))?;

        if !response.status().is_success() {
            return Err(Error::tool(
                CRAWLER_TOOL_NAME,
                format!("HTTP error {}: {}", response.status(), url),
            ));
        }

        response
            .text()
            .await
            .map_err(|e| Error::tool(CRAWLER_TOOL_NAME, format!("Failed to read response: {}", e)))
    }

    /// Fetch a page and return its text and same-site links, retrying while
    /// the fetch fails or the text is shorter than `min_text_length`.
    async fn scrape(&self, url: &Url, min_text_length: usize) -> Result<(String, Vec<Url>), Error> {
        let retry = RetryPolicy::fixed(self.config.max_retries, self.config.retry_backoff);
        retry
            .run(CRAWLER_TOOL_NAME, |_| async move {
                let html = self.fetch(url).await?;
                let document = Html::parse_document(&html);
                let text = page_text(&document);
                if text.len() < min_text_length {
                    return Err(Error::tool(
                        CRAWLER_TOOL_NAME,
                        format!("Too little text ({} chars): {}", text.len(), url),
                    ));
                }
                Ok((text, same_site_links(&document, url)))
            })
            .await
    }
}

#[derive(Deserialize)]
struct CrawlArgs {
    url: String,
}

#[async_trait]
impl Tool for CrawlWebsiteTool {
    fn name(&self) -> &str {
        CRAWLER_TOOL_NAME
    }

    fn description(&self) -> &str {
        "Extracts useful text content from a competitor's Product and Services pages."
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(self.name(), self.description()).with_parameters(
            ToolParameters::new().add_property(
                "url",
                PropertySchema::string(
                    "The full URL of the competitor's website Product or Services page to crawl, like https://example.com.",
                ),
                true,
            ),
        )
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolOutput, Error> {
        let args: CrawlArgs = serde_json::from_value(arguments)
            .map_err(|e| Error::tool(CRAWLER_TOOL_NAME, format!("Invalid arguments: {}", e)))?;
        let start = Url::parse(args.url.trim())
            .map_err(|e| Error::tool(CRAWLER_TOOL_NAME, format!("Invalid URL '{}': {}", args.url, e)))?;

        let (start_text, links) = self.scrape(&start, 0).await?;

        let mut sections = Vec::new();
        if start_text.len() >= self.config.min_text_length {
            sections.push(section(&start, &start_text));
        }

        for link in links.iter().take(self.config.max_pages) {
            match self.scrape(link, self.config.min_text_length).await {
                Ok((text, _)) => sections.push(section(link, &text)),
                Err(e) => debug!(url = %link, error = %e, "Skipping linked page"),
            }
        }

        info!(url = %start, pages = sections.len(), links = links.len(), "Crawled website");

        if sections.is_empty() {
            Ok(ToolOutput::success("(No text content found on site)"))
        } else {
            Ok(ToolOutput::success(sections.join("\n\n")))
        }
    }
}

fn section(url: &Url, text: &str) -> String {
    format!("--- Content from {} ---\n{}", url, text)
}

/// Readable text of a document: `main`/`article` when present, else `body`.
fn page_text(document: &Html) -> String {
    let selectors = ["main, article", "body"];
    for selector in selectors {
        let Ok(selector) = Selector::parse(selector) else {
            continue;
        };
        let chunks: Vec<String> = document
            .select(&selector)
            .map(|el| {
                let mut text = String::new();
                collect_text(el, &mut text);
                text
            })
            .filter(|t| !t.trim().is_empty())
            .collect();
        if !chunks.is_empty() {
            return clean_text(&chunks.join("\n\n"));
        }
    }
    let mut text = String::new();
    collect_text(document.root_element(), &mut text);
    clean_text(&text)
}

/// Append the text under `element`, skipping non-content subtrees.
fn collect_text(element: ElementRef<'_>, out: &mut String) {
    if SKIPPED_TAGS.contains(&element.value().name()) {
        return;
    }
    for child in element.children() {
        if let Some(child) = ElementRef::wrap(child) {
            collect_text(child, out);
        } else if let Some(text) = child.value().as_text() {
            let trimmed = text.trim();
            if !trimmed.is_empty() {
                if !out.is_empty() && !out.ends_with(' ') && !out.ends_with('\n') {
                    out.push(' ');
                }
                out.push_str(trimmed);
            }
        }
    }
}

/// Collapse runs of spaces and keep at most one blank line.
fn clean_text(text: &str) -> String {
    let mut result = String::new();
    let mut prev_was_whitespace = false;
    let mut newline_count = 0;

    for ch in text.chars() {
        if ch == '\n' {
            newline_count += 1;
            if newline_count <= 2 {
                result.push('\n');
            }
            prev_was_whitespace = true;
        } else if ch.is_whitespace() {
            if !prev_was_whitespace {
                result.push(' ');
                prev_was_whitespace = true;
            }
            newline_count = 0;
        } else {
            result.push(ch);
            prev_was_whitespace = false;
            newline_count = 0;
        }
    }

    result.trim().to_string()
}

/// The registrable name of a host: `openai` for `platform.openai.com`.
/// IP hosts compare in full.
///
/// Public suffixes are approximated by `SECOND_LEVEL_LABELS` under two-letter TLDs.
/// Multi-tenant suffixes are not recognized: `foo.github.io` and `bar.github.io` both
/// map to `github` and count as one site.
fn site_name(url: &Url) -> Option<String> {
    match url.host()? {
        Host::Domain(domain) => {
            let labels: Vec<&str> = domain.trim_end_matches('.').split('.').collect();
            let name = match labels.as_slice() {
                [.., name, second, tld]
                    if tld.len() == 2 && SECOND_LEVEL_LABELS.contains(second) =>
                {
                    name
                }
                [.., name, _tld] => name,
                [name] => name,
                [] => return None,
            };
            Some(name.to_lowercase())
        }
        Host::Ipv4(ip) => Some(ip.to_string()),
        Host::Ipv6(ip) => Some(ip.to_string()),
    }
}

/// Absolute `http(s)` links on the same site as `base`, in document order,
/// without fragments or duplicates, excluding `base` itself.
fn same_site_links(document: &Html, base: &Url) -> Vec<Url> {
    let Ok(anchors) = Selector::parse("a[href]") else {
        return Vec::new();
    };
    let target = site_name(base);

    let mut seen = HashSet::new();
    seen.insert(base.as_str().trim_end_matches('/').to_string());

    let mut links = Vec::new();
    for href in document.select(&anchors).filter_map(|a| a.value().attr("href")) {
        let Ok(mut link) = base.join(href.trim()) else {
            continue;
        };
        if !matches!(link.scheme(), "http" | "https") || site_name(&link) != target {
            continue;
        }
        link.set_fragment(None);
        if seen.insert(link.as_str().trim_end_matches('/').to_string()) {
            links.push(link);
        }
    }
    links
}
