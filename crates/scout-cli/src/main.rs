use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use scout_core::{CallRequest, LanguageModel, ToolRegistry, Transcript, Turn};
use scout_providers::GeminiProvider;

mod config;
mod crew;

use config::Config;
use crew::ResearchCrew;

/// Log level for tracing output
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    /// Most verbose: request and response payloads
    Trace,
    /// Verbose: model calls, parsed replies, tool execution details
    Debug,
    /// Standard: agent stages and tool calls
    Info,
    /// Quiet: only warnings and errors
    Warn,
    /// Minimal: only errors
    Error,
}

impl LogLevel {
    fn as_filter(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

#[derive(Parser)]
#[command(name = "scout")]
#[command(author, version, about = "Scout: competitor research with Gemini-backed agents", long_about = None)]
pub struct Cli {
    /// Config file (defaults to ~/.config/scout/config.toml)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Model to use (overrides config)
    #[arg(short, long)]
    pub model: Option<String>,

    /// Base URL for the Gemini API (overrides config)
    #[arg(long)]
    pub base_url: Option<String>,

    /// Temperature (0.0-2.0)
    #[arg(short, long)]
    pub temperature: Option<f32>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, value_enum, default_value = "warn")]
    pub log_level: LogLevel,

    /// Enable debug logging (shorthand for --log-level debug)
    #[arg(short, long)]
    pub debug: bool,

    /// Write logs to file (JSON-lines format)
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Research one or more companies and write a report for each
    Research {
        /// Company names
        #[arg(default_value = "OpenAI")]
        companies: Vec<String>,

        /// Directory for reports (overrides config)
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
    },
    /// Send a single prompt to the model and print the reply
    Ask {
        prompt: String,

        /// System prompt
        #[arg(short, long)]
        system: Option<String>,
    },
    /// Show current configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // --debug overrides --log-level
    let log_level = if cli.debug {
        LogLevel::Debug
    } else {
        cli.log_level
    };

    let filter = EnvFilter::new(log_level.as_filter());

    if let Some(log_path) = &cli.log_file {
        let file = std::fs::File::create(log_path)
            .with_context(|| format!("Failed to create log file: {:?}", log_path))?;
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::sync::Mutex::new(file)))
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }

    let mut config = Config::load(cli.config.as_deref())?;
    apply_overrides(&cli, &mut config);

    match &cli.command {
        Commands::Research {
            companies,
            output_dir,
        } => {
            if let Some(dir) = output_dir {
                config.output_dir = dir.display().to_string();
            }
            research_mode(&config, companies).await
        }
        Commands::Ask { prompt, system } => ask_mode(&config, prompt, system.as_deref()).await,
        Commands::Config => show_config(&config),
    }
}

fn apply_overrides(cli: &Cli, config: &mut Config) {
    if let Some(model) = &cli.model {
        config.model = model.clone();
    }
    if let Some(base_url) = &cli.base_url {
        config.base_url = Some(base_url.clone());
    }
    if let Some(temperature) = cli.temperature {
        config.temperature = Some(temperature);
    }
}

fn create_provider(config: &Config, known_tools: Arc<ToolRegistry>) -> Result<GeminiProvider> {
    let mut provider = GeminiProvider::new(config.api_key()?)
        .with_model(&config.model)
        .with_known_tools(known_tools);
    if let Some(base_url) = &config.base_url {
        provider = provider.with_base_url(base_url);
    }
    if let Some(temperature) = config.temperature {
        provider = provider.with_temperature(temperature);
    }
    Ok(provider)
}

async fn research_mode(config: &Config, companies: &[String]) -> Result<()> {
    let tools = scout_tools::known_tools(&config.tools_config());
    if config.serper_api_key.is_none() {
        tracing::warn!("No Serper API key configured; web search will fail");
    }

    let provider = create_provider(config, Arc::new(tools.clone()))?;
    let model: Arc<dyn LanguageModel> = Arc::new(provider);
    let crew = ResearchCrew::new(model, tools, config.output_dir())
        .with_max_iterations(config.max_iterations);

    for company in companies {
        println!("Researching {}...", company);
        let result = crew.run(company).await?;
        println!("Report for {} written to {}", result.company, result.path.display());
    }
    Ok(())
}

async fn ask_mode(config: &Config, prompt: &str, system: Option<&str>) -> Result<()> {
    let tools = Arc::new(scout_tools::known_tools(&config.tools_config()));
    let provider = create_provider(config, tools)?;

    let transcript = match system {
        Some(system) => Transcript::from(vec![Turn::system(system), Turn::user(prompt)]),
        None => Transcript::from(prompt),
    };

    let reply = provider
        .call(CallRequest::new(transcript))
        .await
        .context("Model call failed")?;
    println!("{}", reply);
    Ok(())
}

fn show_config(config: &Config) -> Result<()> {
    if let Ok(path) = Config::config_path() {
        println!("# Config file: {}", path.display());
    }
    println!(
        "{}",
        toml::to_string_pretty(&config.redacted()).context("Failed to render configuration")?
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_research_defaults() {
        let cli = Cli::try_parse_from(["scout", "research"]).unwrap();
        match cli.command {
            Commands::Research {
                companies,
                output_dir,
            } => {
                assert_eq!(companies, vec!["OpenAI".to_string()]);
                assert!(output_dir.is_none());
            }
            _ => panic!("Expected research command"),
        }
        assert_eq!(cli.log_level, LogLevel::Warn);
    }

    #[test]
    fn test_cli_research_companies() {
        let cli = Cli::try_parse_from(["scout", "-d", "research", "Anthropic", "Mistral AI", "-o", "reports"])
            .unwrap();
        assert!(cli.debug);
        match cli.command {
            Commands::Research {
                companies,
                output_dir,
            } => {
                assert_eq!(companies, vec!["Anthropic".to_string(), "Mistral AI".to_string()]);
                assert_eq!(output_dir, Some(PathBuf::from("reports")));
            }
            _ => panic!("Expected research command"),
        }
    }

    #[test]
    fn test_apply_overrides() {
        let cli = Cli::try_parse_from([
            "scout",
            "--model",
            "gemini-2.5-pro",
            "--temperature",
            "0.2",
            "ask",
            "hi",
        ])
        .unwrap();
        let mut config = Config::default();
        apply_overrides(&cli, &mut config);
        assert_eq!(config.model, "gemini-2.5-pro");
        assert_eq!(config.temperature, Some(0.2));
        assert!(config.base_url.is_none());
    }

    #[test]
    fn test_create_provider_requires_api_key() {
        let config = Config::default();
        assert!(create_provider(&config, Arc::new(ToolRegistry::new())).is_err());

        let config = Config {
            api_key: Some("key".to_string()),
            model: "gemini-1.5-pro".to_string(),
            ..Config::default()
        };
        let provider = create_provider(&config, Arc::new(ToolRegistry::new())).unwrap();
        assert_eq!(provider.model(), "gemini-1.5-pro");
        assert_eq!(provider.context_window_size(), 2_000_000);
    }
}
