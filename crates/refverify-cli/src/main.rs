use std::io::Write;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use clap::Parser;
use tokio_util::sync::CancellationToken;

use refverify_core::adjudicate::{Adjudicator, GeminiAdjudicator};
use refverify_core::lookup::DblpLookup;
use refverify_core::{Collaborators, Config, FallbackExtractor, config_file, verify_document};
use refverify_grobid::{DEFAULT_GROBID_URL, GrobidExtractor, RegexFallback};

mod output;

use output::ColorMode;

/// Verify that the references in a paper correspond to real publications
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to the PDF to check
    file_path: PathBuf,

    /// GROBID server URL
    #[arg(long)]
    grobid_url: Option<String>,

    /// Skip the fallback title re-extraction stage
    #[arg(long)]
    skip_reextract: bool,

    /// Skip the AI adjudication stage
    #[arg(long)]
    skip_adjudication: bool,

    /// Disable colored output
    #[arg(long)]
    no_color: bool,

    /// Path to output report file
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Emit the full report as JSON
    #[arg(long)]
    json: bool,

    /// Concurrent reference workers
    #[arg(long)]
    workers: Option<usize>,

    /// References per adjudication batch
    #[arg(long)]
    batch_size: Option<usize>,

    /// Per-call lookup timeout in seconds
    #[arg(long)]
    timeout_secs: Option<u64>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if !cli.file_path.exists() {
        anyhow::bail!("File not found: {}", cli.file_path.display());
    }

    // Resolve configuration: CLI flags > env vars > config file > defaults
    let file_config = config_file::load_config();
    let mut config = Config::default();
    file_config.apply_to(&mut config);

    if let Some(workers) = cli.workers {
        config.num_workers = workers.max(1);
    }
    if let Some(size) = cli.batch_size {
        config.adjudication_batch_size = size.max(1);
    }
    if let Some(secs) = cli.timeout_secs {
        config.lookup_timeout = Duration::from_secs(secs);
    }

    let grobid_url = cli
        .grobid_url
        .or_else(|| std::env::var("GROBID_URL").ok())
        .or_else(|| {
            file_config
                .services
                .as_ref()
                .and_then(|s| s.grobid_url.clone())
        })
        .unwrap_or_else(|| DEFAULT_GROBID_URL.to_string());

    // Determine color mode and output writer
    let use_color = !cli.no_color && cli.output.is_none();
    let color = ColorMode(use_color);

    let mut writer: Box<dyn Write> = if let Some(ref output_path) = cli.output {
        Box::new(std::fs::File::create(output_path)?)
    } else {
        Box::new(std::io::stdout())
    };

    // Build collaborators, honoring the skip flags
    let fallback = if cli.skip_reextract {
        None
    } else {
        Some(Arc::new(RegexFallback) as Arc<dyn FallbackExtractor>)
    };
    let adjudicator = if cli.skip_adjudication {
        None
    } else {
        GeminiAdjudicator::from_env()
            .or_else(|| {
                file_config
                    .services
                    .as_ref()
                    .and_then(|s| s.gemini_api_key.clone())
                    .map(GeminiAdjudicator::new)
            })
            .map(|a| Arc::new(a) as Arc<dyn Adjudicator>)
    };
    let collaborators = Collaborators {
        lookup: Arc::new(DblpLookup::new()),
        fallback,
        adjudicator,
    };

    // Progress goes to stderr when the report is written to a file
    let progress_writer: Arc<Mutex<Box<dyn Write + Send>>> = if cli.output.is_some() {
        Arc::new(Mutex::new(Box::new(std::io::stderr())))
    } else {
        Arc::new(Mutex::new(Box::new(std::io::stdout())))
    };
    let progress_color = color;
    let progress_cb = {
        let pw = Arc::clone(&progress_writer);
        move |event: refverify_core::ProgressEvent| {
            if let Ok(mut w) = pw.lock() {
                let _ = output::print_progress(&mut *w, &event, progress_color);
                let _ = w.flush();
            }
        }
    };

    let cancel = CancellationToken::new();
    let cancel_clone = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel_clone.cancel();
        }
    });

    let extractor = GrobidExtractor::new(grobid_url);
    let reports = verify_document(
        &cli.file_path,
        &extractor,
        collaborators,
        config,
        progress_cb,
        cancel,
    )
    .await
    .map_err(|e| anyhow::anyhow!("Extraction failed: {}", e))?;

    if cli.json {
        let stats = refverify_core::VerdictStats::from_reports(&reports);
        let doc = serde_json::json!({
            "stats": stats,
            "references": reports,
        });
        serde_json::to_writer_pretty(&mut writer, &doc)?;
        writeln!(writer)?;
        return Ok(());
    }

    output::print_report(&mut writer, &reports, color)?;
    output::print_summary(&mut writer, &reports, color)?;

    Ok(())
}
