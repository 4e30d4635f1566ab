use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;
use std::str::FromStr;
use std::time::Instant;

use anyhow::Context;
use clap::Parser;
use marginalia_core::scroll::ScrollSample;
use marginalia_core::{
    Augmented, FetchConfig, MarginaliaConfig, MarginaliaConfigBuilder, MetadataClient, Page, PageSource, ToggleEvent,
    ToggleState, fetch_file, fetch_stdin, fetch_url,
};
use owo_colors::OwoColorize;

mod echo;
mod logging;

const VERSION: &str = env!("CARGO_PKG_VERSION");
const STEPS: usize = 5;

/// Output format for the augmented page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputFormat {
    Html,
    Json,
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "html" => Ok(Self::Html),
            "json" => Ok(Self::Json),
            _ => Err(format!("Invalid format: {}. Valid options: html, json", s)),
        }
    }
}

/// Add a table of contents, reading time, and live repository metadata to a rendered page
#[derive(Parser, Debug)]
#[command(name = "marginalia")]
#[command(version = VERSION)]
#[command(about = "Augment rendered static-site pages", long_about = None)]
struct Args {
    /// URL to fetch, local HTML file, or "-" for stdin
    #[arg(value_name = "INPUT")]
    input: String,

    /// Output file (default: stdout)
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Output format (html, json)
    #[arg(short, long, default_value = "html", value_name = "FORMAT")]
    format: OutputFormat,

    /// Configuration file (default: the user config directory's marginalia/config.toml)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Selector for the content container
    #[arg(long, value_name = "SELECTOR")]
    container: Option<String>,

    /// Reading speed in words per minute
    #[arg(long, value_name = "NUM")]
    wpm: Option<u32>,

    /// Leave metadata targets untouched
    #[arg(long)]
    no_metadata: bool,

    /// Metadata API root
    #[arg(long, value_name = "URL")]
    api_base: Option<String>,

    /// HTTP timeout in seconds, for the page and for each metadata request
    #[arg(long, value_name = "SECS")]
    timeout: Option<u64>,

    /// Text shown when a metadata lookup fails
    #[arg(long, value_name = "TEXT")]
    placeholder: Option<String>,

    /// API token (default: $GITHUB_TOKEN)
    #[arg(long, value_name = "TOKEN")]
    token: Option<String>,

    /// Custom User-Agent for fetching the page
    #[arg(long, value_name = "UA")]
    user_agent: Option<String>,

    /// Render scroll-threshold classes as if scrolled to this offset
    #[arg(long, value_name = "PX")]
    scroll_offset: Option<i64>,

    /// Open the toggle controlling this element id (repeatable)
    #[arg(long = "open", value_name = "ID")]
    open: Vec<String>,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn config(&self) -> anyhow::Result<MarginaliaConfig> {
        let base = match &self.config {
            Some(path) => MarginaliaConfig::load(path)
                .with_context(|| format!("Failed to load config: {}", path.display()))?,
            None => MarginaliaConfig::load_default().context("Failed to load default config")?,
        };

        let mut builder = MarginaliaConfigBuilder::from_config(base);
        if let Some(container) = &self.container {
            builder = builder.container(container);
        }
        if let Some(wpm) = self.wpm {
            builder = builder.words_per_minute(wpm);
        }
        if self.no_metadata {
            builder = builder.metadata_enabled(false);
        }
        if let Some(api_base) = &self.api_base {
            builder = builder.api_base(api_base);
        }
        if let Some(secs) = self.timeout {
            builder = builder.timeout_ms(secs.saturating_mul(1000));
        }
        if let Some(placeholder) = &self.placeholder {
            builder = builder.placeholder(placeholder);
        }
        let token = self.token.clone().or_else(|| std::env::var("GITHUB_TOKEN").ok().filter(|t| !t.is_empty()));
        if token.is_some() {
            builder = builder.token(token);
        }

        let config = builder.build();
        config.validate().context("Invalid configuration")?;
        tracing::debug!(
            container = %config.index.container,
            metadata = config.metadata.enabled,
            api_base = %config.metadata.api_base,
            "configuration resolved"
        );
        Ok(config)
    }

    fn fetch_config(&self) -> FetchConfig {
        let defaults = FetchConfig::default();
        FetchConfig {
            timeout: self.timeout.unwrap_or(defaults.timeout),
            user_agent: self.user_agent.clone().unwrap_or(defaults.user_agent),
        }
    }
}

async fn read_input(args: &Args) -> anyhow::Result<String> {
    match PageSource::parse(&args.input) {
        PageSource::Stdin => {
            if args.verbose {
                echo::print_step(1, STEPS, "Reading from stdin");
            }
            fetch_stdin().context("Failed to read from stdin")
        }
        PageSource::Url(url) => {
            if args.verbose {
                echo::print_step(1, STEPS, &format!("Fetching from {}", url.bright_white().underline()));
            }
            fetch_url(&url, &args.fetch_config()).await.context("Failed to fetch URL")
        }
        PageSource::File(path) => {
            if args.verbose {
                echo::print_step(1, STEPS, &format!("Reading from file {}", path.display().bright_white()));
            }
            fetch_file(&path.to_string_lossy()).with_context(|| format!("Failed to read file: {}", path.display()))
        }
    }
}

async fn run(args: &Args) -> anyhow::Result<()> {
    let config = args.config()?;
    let html = read_input(args).await?;

    if args.verbose {
        echo::print_detail("Size", &echo::format_size(html.len()));
        eprintln!();
        echo::print_step(2, STEPS, "Building index and reading time");
    }

    let mut page = Page::ready(&html, config).context("Failed to prepare page")?;

    if args.verbose {
        if let Some(title) = page.title() {
            echo::print_detail("Title", title);
        }
        echo::print_detail("Headings", &page.toc().len().to_string());
        if let Some(stats) = page.reading() {
            echo::print_detail("Words", &stats.word_count.to_string());
        }
        eprintln!();
        echo::print_step(3, STEPS, "Resolving repository metadata");
    }

    if !page.targets().is_empty() {
        let client = MetadataClient::github(page.config().metadata.clone()).context("Failed to build API client")?;
        let resolutions = page.resolve_metadata(&client).await.context("Failed to write metadata")?;
        let failed = resolutions.iter().filter(|r| r.failed).count();
        if failed > 0 {
            echo::print_warning(&format!("{} of {} metadata targets fell back", failed, resolutions.len()));
        }
    } else if args.verbose {
        echo::print_info("No metadata targets");
    }

    if args.verbose {
        echo::print_step(4, STEPS, "Applying scroll and toggle state");
    }

    if let Some(offset) = args.scroll_offset {
        page.scroll(ScrollSample::at(offset), Instant::now());
        page.settle_scroll();
    }
    for id in &args.open {
        match page.toggle_state(id) {
            Some(ToggleState::Closed) => {
                page.toggle(id, ToggleEvent::Activate);
            }
            Some(ToggleState::Open) => {}
            None => echo::print_warning(&format!("No toggle controls #{}", id)),
        }
    }

    let augmented = Augmented::from_page(&page).context("Failed to render page")?;

    if args.verbose {
        echo::print_summary(&augmented);
        echo::print_step(5, STEPS, "Writing output");
        echo::print_detail("Format", &format!("{:?}", args.format));
        eprintln!();
    }

    let output = match args.format {
        OutputFormat::Html => augmented.html,
        OutputFormat::Json => {
            let report = augmented.report_json().context("Failed to build report")?;
            serde_json::to_string_pretty(&report).context("Failed to serialize report")? + "\n"
        }
    };

    match &args.output {
        Some(path) => {
            fs::write(path, output).with_context(|| format!("Failed to write to file: {}", path.display()))?;
            echo::print_success(&format!("Output written to {}", path.display().bright_white()));
        }
        None => print!("{}", output),
    }

    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    if let Err(err) = logging::init(args.verbose) {
        echo::print_error(&format!("{:#}", err));
        return ExitCode::FAILURE;
    }

    if args.verbose {
        echo::print_banner();
        echo::print_info("Debug logging enabled");
        eprintln!();
    }

    match run(&args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            echo::print_error(&format!("{:#}", err));
            ExitCode::FAILURE
        }
    }
}
