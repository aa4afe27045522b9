use std::io;
use std::path::PathBuf;

use clap::Parser;

use mbox_stats::config::RunConfig;
use mbox_stats::error::StatsResult;
use mbox_stats::ingest::{InputFormat, MessageSource};
use mbox_stats::pipeline::Pipeline;
use mbox_stats::stats::{Classifier, CsvReport};

#[derive(Parser, Debug)]
#[command(
    name = "mbox-stats",
    about = "Monthly IPv4/IPv6, TLS and sending-provider counts for an archived mailbox"
)]
struct Args {
    /// Mailbox to read: an mbox file or a gzipped tar of `.mbox`/`.txt` messages.
    #[arg(short, long, default_value = "inbox.mbox")]
    input: PathBuf,

    /// Input format (`auto`, `mbox` or `archive`).
    #[arg(long, default_value_t = InputFormat::Auto)]
    format: InputFormat,

    /// JSON rules file for exclusions, providers and relay markers.
    /// Overrides `MBOX_STATS_RULES`.
    #[arg(long)]
    rules: Option<PathBuf>,

    /// Per-message capture ceiling in bytes. Overrides `MBOX_STATS_MAX_MESSAGE_BYTES`.
    #[arg(long)]
    max_message_bytes: Option<usize>,

    /// Print one `.` per message to stderr.
    #[arg(long)]
    progress: bool,
}

async fn run(args: Args) -> StatsResult<()> {
    let mut run_config = RunConfig::from_env();
    if let Some(rules) = args.rules {
        run_config.rules_path = Some(rules);
    }
    if let Some(max) = args.max_message_bytes.filter(|max| *max > 0) {
        run_config.max_message_bytes = max;
    }

    let rules = run_config.load_rules()?;
    let source = MessageSource::open(&args.input, args.format)?;
    log::info!(
        "reading {} as {} (ceiling {} bytes per message)",
        args.input.display(),
        source.format(),
        run_config.max_message_bytes
    );

    let report = CsvReport::new(&rules);
    let pipeline = Pipeline::new(Classifier::new(rules), run_config.max_message_bytes)
        .with_progress(args.progress);
    let outcome = pipeline.run(source).await?;

    log::info!("{}", outcome.summary);
    report.write(&outcome.stats, io::stdout().lock())?;
    Ok(())
}

#[tokio::main]
async fn main() {
    mbox_stats::init_logger();

    let args = Args::parse();
    if let Err(e) = run(args).await {
        log::error!("{}", e);
        std::process::exit(1);
    }
}
