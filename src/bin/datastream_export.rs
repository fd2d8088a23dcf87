use clap::Parser;
use datastream_export::domains::datasource::SqliteStreamRepository;
use datastream_export::domains::publish::HttpChunkTransport;
use datastream_export::{ExportConfig, ExportService, ExportTargets};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(
    name = "datastream-export",
    about = "Export sensor record streams to files or an upload server"
)]
struct Cli {
    /// Study database file
    #[arg(long, env = "DATASTREAM_EXPORT_DATABASE")]
    database: PathBuf,

    /// Write one CSV file per stream
    #[arg(long)]
    csv: bool,

    /// Write one JSON file per stream
    #[arg(long)]
    json: bool,

    /// Write one gzip-compressed JSON file per stream
    #[arg(long)]
    gzip: bool,

    /// Upload every stream in chunks to this URL
    #[arg(long, value_name = "URL")]
    publish: Option<String>,

    /// Directory for exported files
    #[arg(long)]
    output_dir: Option<PathBuf>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info");
    }
    let _ = env_logger::try_init();

    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        log::error!("Export aborted: {}", e);
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = ExportConfig::from_env()?;
    if let Some(dir) = cli.output_dir {
        config.output_dir = dir;
    }

    let targets = ExportTargets {
        publish: cli.publish.is_some(),
        csv: cli.csv,
        json: cli.json,
        gzip_json: cli.gzip,
    };
    if targets.is_empty() {
        return Err("nothing to do: pass --csv, --json, --gzip or --publish".into());
    }

    let transport = match &cli.publish {
        Some(url) => Some(HttpChunkTransport::new(
            url,
            config.request_timeout(),
            config.connect_timeout(),
            config.require_success_status,
        )?),
        None => None,
    };

    let repo = Arc::new(SqliteStreamRepository::connect(&cli.database, config.query_timeout()).await?);
    let service = ExportService::new(repo, config, transport);
    let summary = service.run(targets).await?;

    log::info!(
        "{} streams: {} exports succeeded, {} failed",
        summary.streams,
        summary.succeeded,
        summary.failed
    );
    if summary.failed > 0 {
        return Err(format!("{} exports failed", summary.failed).into());
    }
    Ok(())
}
