//! The competitor research crew: crawl, news, summary.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

use scout_core::{AgentConfig, LanguageModel, ReactAgent, ToolRegistry};
use scout_tools::{CRAWLER_TOOL_NAME, SEARCH_TOOL_NAME};

/// Output of one crew run.
#[derive(Debug)]
pub struct CrewReport {
    pub company: String,
    pub path: PathBuf,
    pub report: String,
}

pub struct ResearchCrew {
    model: Arc<dyn LanguageModel>,
    tools: ToolRegistry,
    output_dir: PathBuf,
    max_iterations: usize,
}

impl ResearchCrew {
    pub fn new(model: Arc<dyn LanguageModel>, tools: ToolRegistry, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            model,
            tools,
            output_dir: output_dir.into(),
            max_iterations: 15,
        }
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    fn agent(&self, config: AgentConfig, tools: &[&str]) -> ReactAgent {
        ReactAgent::new(
            config.with_max_iterations(self.max_iterations),
            Arc::new(self.tools.subset(tools)),
        )
    }

    fn crawler_agent(&self, company: &str) -> ReactAgent {
        self.agent(
            AgentConfig::new("crawler")
                .with_role(format!("{company} Website Researcher"))
                .with_goal(format!(
                    "Find the official website of {company} and extract accurate information about its products and services"
                ))
                .with_backstory(
                    "You are a meticulous web researcher who locates official company sites \
                     and reads their product and service pages to capture what a company actually sells.",
                ),
            &[CRAWLER_TOOL_NAME, SEARCH_TOOL_NAME],
        )
    }

    fn news_agent(&self, company: &str) -> ReactAgent {
        self.agent(
            AgentConfig::new("news")
                .with_role(format!("{company} News Analyst"))
                .with_goal(format!("Gather the most recent and relevant news about {company}"))
                .with_backstory(
                    "You follow industry news closely and can tell announcements, launches \
                     and partnerships apart from noise.",
                ),
            &[SEARCH_TOOL_NAME],
        )
    }

    fn summarizer_agent(&self, company: &str) -> ReactAgent {
        self.agent(
            AgentConfig::new("summarizer")
                .with_role("Competitive Intelligence Writer")
                .with_goal(format!(
                    "Write a clear, well structured competitor analysis report on {company}"
                ))
                .with_backstory(
                    "You turn raw research notes into concise Markdown reports for a product strategy team.",
                ),
            &[],
        )
    }

    /// Run the three stages for one company and write the report.
    pub async fn run(&self, company: &str) -> Result<CrewReport> {
        info!(%company, "Starting research crew");

        let crawl = self
            .crawler_agent(company)
            .run(self.model.as_ref(), &crawl_task(company))
            .await
            .with_context(|| format!("Crawl stage failed for {company}"))?;
        info!(%company, chars = crawl.len(), "Crawl stage complete");

        let news = self
            .news_agent(company)
            .run(self.model.as_ref(), &news_task(company))
            .await
            .with_context(|| format!("News stage failed for {company}"))?;
        info!(%company, chars = news.len(), "News stage complete");

        let report = self
            .summarizer_agent(company)
            .run(self.model.as_ref(), &summary_task(company, &crawl, &news))
            .await
            .with_context(|| format!("Summary stage failed for {company}"))?;

        let path = write_report(&self.output_dir, company, &report).await?;
        info!(%company, path = %path.display(), "Report written");

        Ok(CrewReport {
            company: company.to_string(),
            path,
            report,
        })
    }
}

fn task_prompt(description: &str, expected_output: &str, context: Option<&str>) -> String {
    let mut prompt = format!(
        "Current Task: {description}\n\n\
         This is the expected criteria for your final answer: {expected_output}\n\
         you MUST return the actual complete content as the final answer, not a summary."
    );
    if let Some(context) = context {
        prompt.push_str("\n\nThis is the context you're working with:\n");
        prompt.push_str(context);
    }
    prompt.push_str("\n\nBegin! This is VERY important to you, use the tools available and give your best Final Answer, your job depends on it!\n\nThought:");
    prompt
}

fn crawl_task(company: &str) -> String {
    task_prompt(
        &format!(
            "Search the web for the official website of {company}. Then crawl its product and \
             services pages and extract what {company} offers: products, features, pricing and target customers."
        ),
        &format!("A structured list of {company}'s products and services with short descriptions."),
        None,
    )
}

fn news_task(company: &str) -> String {
    task_prompt(
        &format!(
            "Search for the latest news about {company}: launches, partnerships, funding, \
             leadership changes and market moves."
        ),
        &format!("A list of recent {company} news items, each with a one line summary and its source."),
        None,
    )
}

fn summary_task(company: &str, crawl: &str, news: &str) -> String {
    let context = format!("{crawl}\n\n----------\n\n{news}");
    task_prompt(
        &format!(
            "Using the product research and the news gathered, write a competitor analysis of {company}."
        ),
        "A Markdown report with sections for Overview, Products and Services, Recent News, \
         and Strategic Takeaways.",
        Some(&context),
    )
}

/// A filename-safe form of a company name.
pub fn slugify(company: &str) -> String {
    let mut slug = String::with_capacity(company.len());
    for ch in company.trim().chars() {
        if ch.is_alphanumeric() || ch == '-' || ch == '_' {
            slug.push(ch);
        } else if !slug.ends_with('_') {
            slug.push('_');
        }
    }
    let slug = slug.trim_matches('_');
    if slug.is_empty() {
        "company".to_string()
    } else {
        slug.to_string()
    }
}

async fn write_report(output_dir: &Path, company: &str, report: &str) -> Result<PathBuf> {
    tokio::fs::create_dir_all(output_dir)
        .await
        .with_context(|| format!("Failed to create output directory: {:?}", output_dir))?;

    let path = output_dir.join(format!("{}_analysis.md", slugify(company)));
    let content = format!(
        "<!-- {} competitor analysis, generated {} -->\n\n{}\n",
        company,
        chrono::Local::now().format("%Y-%m-%d %H:%M"),
        report.trim()
    );
    tokio::fs::write(&path, content)
        .await
        .with_context(|| format!("Failed to write report: {:?}", path))?;
    Ok(path)
}
