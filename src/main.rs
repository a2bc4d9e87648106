use anyhow::Context;
use clap::Parser;
use futures::future::try_join_all;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use roads_client::aggregate::EntryOutcome;
use roads_client::{BatchSession, Config, MediaItem, ParameterField, UploadProcessOrchestrator};

#[derive(Parser)]
#[command(name = "roads-client", version, about = "Upload four intersection videos and fetch their traffic scores")]
struct Cli {
    /// Video files (the first four videos are used)
    #[arg(required = true)]
    videos: Vec<PathBuf>,

    /// Number of lanes
    #[arg(long)]
    lanes: String,

    /// Platoon weight
    #[arg(long)]
    platoon_weight: String,

    /// Incoming distance in metres
    #[arg(long)]
    incoming_distance: String,

    /// Average speed in km/h
    #[arg(long)]
    average_speed: String,

    /// Service base URL (overrides API_BASE and config.toml)
    #[arg(long)]
    api_base: Option<String>,

    /// Reject parameters that are not numbers
    #[arg(long)]
    strict: bool,

    /// Print the raw batch result as JSON
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = Config::from_env();
    if let Some(api_base) = &cli.api_base {
        config.api_base = api_base.trim_end_matches('/').to_string();
    }
    if cli.strict {
        config.strict_parameters = true;
    }

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("roads_client={}", config.log_level)));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("🚀 Using analysis service at {}", config.api_base);

    let items = try_join_all(cli.videos.iter().map(|path| load_media(path))).await?;

    let mut session = BatchSession::new(UploadProcessOrchestrator::new(&config));
    let outcome = session.add_files(items)?;
    if outcome.dropped > 0 {
        warn!("Only the first {} videos are used", roads_client::BATCH_SIZE);
    }

    session.set_parameter(ParameterField::NoOfLanes, cli.lanes);
    session.set_parameter(ParameterField::PlatoonWeight, cli.platoon_weight);
    session.set_parameter(ParameterField::IncomingDistance, cli.incoming_distance);
    session.set_parameter(ParameterField::AverageSpeed, cli.average_speed);

    let result = session.submit().await?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(result)?);
        return Ok(());
    }

    print_summary(&session);
    Ok(())
}

async fn load_media(path: &Path) -> anyhow::Result<MediaItem> {
    let payload = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;

    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    let mime_type = mime_guess::from_path(path)
        .first()
        .map(|mime| mime.essence_str().to_string())
        .unwrap_or_default();

    Ok(MediaItem::new(name, mime_type, payload))
}

fn print_summary(session: &BatchSession) {
    let Some(summary) = session.summary() else {
        return;
    };

    println!("{}", "=".repeat(60));
    println!("✅ Intersection {}", summary.intersection);
    println!("   Processed: {}", summary.videos_processed.join(", "));
    println!("   Batch CPS: {}", summary.formatted_batch_score());
    println!(
        "   Files: {} done, {} failed, {} missing",
        summary.success_count(),
        summary.error_count(),
        summary.missing_count()
    );
    println!("{}", "=".repeat(60));

    for entry in session.correlated() {
        println!("📹 {} → {}", entry.original_name, entry.uploaded_name);
        match entry.outcome {
            EntryOutcome::Success(metrics) => {
                println!("   Clear Time:       {}", show(metrics.t_clear));
                println!("   Traffic Score:    {}", show(metrics.traffic_score));
                println!("   Safety Penalty:   {}", metrics.safety_penalty);
                println!("   Green Wave Bonus: {}", show(metrics.green_wave_bonus));
                println!("   CPS:              {}", show(metrics.cps));
            }
            EntryOutcome::Error(message) => println!("   ❌ {}", message),
            EntryOutcome::Missing => println!("   ⚠️  No result returned"),
        }
    }
}

fn show(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_else(|| "-".to_string())
}
