use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::Parser;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use pmc_retrieval::{BatchRetriever, ClientConfig, DateRange, EntrezClient, SearchConfig};

#[derive(Parser)]
#[command(
    name = "pmc-retrieval",
    about = "Retrieve PMC articles matching device and indicator terms",
    long_about = "Searches PubMed Central for articles mentioning any device term together with any \
                  indicator term, batching long queries, and writes the PMC/PubMed id pairs as JSON"
)]
struct Cli {
    /// File with device terms (JSON array or one term per line)
    #[arg(long)]
    devices: PathBuf,

    /// File with indicator terms (JSON array or one term per line)
    #[arg(long)]
    indicators: PathBuf,

    /// First publication year to include
    #[arg(long)]
    start_year: Option<u32>,

    /// Last publication year to include
    #[arg(long)]
    end_year: Option<u32>,

    /// Output JSON file
    #[arg(short, long, default_value = "retrieved_ids.json")]
    output: PathBuf,

    /// Keep only articles linked to a PubMed record
    #[arg(long)]
    linked_only: bool,

    /// Concurrent batch workers
    #[arg(long, default_value_t = 2)]
    workers: usize,

    /// Byte budget for the encoded terms of one batch
    #[arg(long, default_value_t = 1000)]
    batch_budget: usize,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// API key for NCBI E-utilities (increases rate limit)
    #[arg(long, env = "NCBI_API_KEY")]
    api_key: Option<String>,

    /// Email for NCBI requests (recommended)
    #[arg(long, env = "NCBI_EMAIL")]
    email: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .with(tracing_subscriber::EnvFilter::new(filter))
        .init();

    let devices = read_terms(&cli.devices)?;
    let indicators = read_terms(&cli.indicators)?;
    if devices.is_empty() || indicators.is_empty() {
        bail!("both term files must contain at least one term");
    }

    let mut config = ClientConfig::new();
    if let Some(key) = &cli.api_key {
        config = config.with_api_key(key);
    }
    if let Some(email) = &cli.email {
        config = config.with_email(email);
    }

    let search_config = SearchConfig::new()
        .with_max_workers(cli.workers)
        .with_batch_budget(cli.batch_budget)
        .with_require_secondary_id(cli.linked_only);

    let client = EntrezClient::with_config(config).context("failed to build HTTP client")?;
    let retriever = BatchRetriever::with_config(client, search_config);
    let date_range = DateRange::new(cli.start_year, cli.end_year);

    info!(
        devices = devices.len(),
        indicators = indicators.len(),
        date_filter = ?date_range.map(|range| range.to_filter()),
        "Starting retrieval"
    );

    let outcome = retriever
        .search_with_report(&devices, &indicators, date_range)
        .await?;

    let json = serde_json::to_string_pretty(&outcome.results)?;
    fs::write(&cli.output, json)
        .with_context(|| format!("failed to write {}", cli.output.display()))?;

    info!(
        articles = outcome.results.len(),
        linked = outcome.results.iter().filter(|r| r.has_pmid()).count(),
        batches = outcome.batch_count,
        failed_batches = outcome.failed_batches,
        retrieved = outcome.retrieved_records,
        expected = outcome.expected_records,
        output = %cli.output.display(),
        "Saved results"
    );

    Ok(())
}

/// Load terms from a JSON array or newline-delimited text
///
/// Blank lines and lines starting with `#` are skipped in text files.
fn read_terms(path: &Path) -> Result<Vec<String>> {
    let content =
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    parse_terms(&content).with_context(|| format!("invalid term file {}", path.display()))
}

fn parse_terms(content: &str) -> Result<Vec<String>> {
    let trimmed = content.trim_start();
    if trimmed.starts_with('[') {
        let terms: Vec<String> = serde_json::from_str(trimmed)?;
        return Ok(terms
            .into_iter()
            .map(|term| term.trim().to_string())
            .filter(|term| !term.is_empty())
            .collect());
    }

    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect())
}
