//! Javelin clip analysis worker binary.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use javelin_models::{AnalysisResult, ClipParams, Handedness, ScaleMethod, ViewType};
use tracing::{error, info};

use javelin_worker::logging::{init_tracing, json_requested};
use javelin_worker::{metrics, ClipExecutor, ClipJob, ClipSource, WorkerConfig};

#[derive(Debug, Parser)]
#[command(name = "javelin-worker", version, about = "Analyze javelin throw clips")]
struct Cli {
    /// Video files or observation documents (.json)
    #[arg(required_unless_present = "schema")]
    inputs: Vec<PathBuf>,

    /// Camera view: side or rear
    #[arg(long, default_value = "side")]
    view: ViewType,

    /// Throwing arm: right or left
    #[arg(long, default_value = "right")]
    handedness: Handedness,

    /// Scale calibration: marker or auto
    #[arg(long, default_value = "marker")]
    scale_method: ScaleMethod,

    /// Athlete standing height in meters
    #[arg(long)]
    athlete_height: Option<f64>,

    /// TOML file overriding the analysis defaults
    #[arg(long, env = "JAVELIN_CONFIG")]
    config: Option<PathBuf>,

    /// Write one result document per clip into this directory
    #[arg(long, env = "WORKER_OUTPUT_DIR")]
    output_dir: Option<PathBuf>,

    /// Maximum clips analyzed concurrently
    #[arg(long)]
    max_clips: Option<usize>,

    /// Per-clip time limit in seconds
    #[arg(long)]
    timeout: Option<u64>,

    /// Print the JSON schema of the result document and exit
    #[arg(long)]
    schema: bool,
}

impl Cli {
    fn params(&self) -> ClipParams {
        let params = ClipParams::new(self.view, self.handedness, self.scale_method);
        match self.athlete_height {
            Some(h) => params.with_athlete_height(h),
            None => params,
        }
    }

    fn worker_config(&self) -> WorkerConfig {
        let mut config = WorkerConfig::from_env();
        if let Some(path) = &self.config {
            config.analysis_config_path = Some(path.clone());
        }
        if let Some(dir) = &self.output_dir {
            config.output_dir = Some(dir.clone());
        }
        if let Some(n) = self.max_clips.filter(|n| *n > 0) {
            config.max_concurrent_clips = n;
        }
        if let Some(secs) = self.timeout {
            config.clip_timeout = Duration::from_secs(secs);
        }
        config
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    if cli.schema {
        let schema = schemars::schema_for!(AnalysisResult);
        println!("{}", serde_json::to_string_pretty(&schema)?);
        return Ok(());
    }

    init_tracing(json_requested());
    info!("Starting javelin-worker");

    let config = cli.worker_config();
    info!("Worker config: {:?}", config);

    if let Some(port) = config.metrics_port {
        metrics::init_metrics(port).context("Failed to start metrics exporter")?;
    }

    let executor = ClipExecutor::new(config).context("Failed to create clip executor")?;

    #[cfg(feature = "video")]
    let executor = {
        let backends = javelin_worker::VideoBackends::load(executor.analyzer().config())
            .context("Failed to load video detectors")?;
        executor.with_video_backends(backends)
    };

    let params = cli.params();
    let jobs: Vec<ClipJob> = cli
        .inputs
        .iter()
        .map(|path| ClipJob::new(ClipSource::from_path(path), params))
        .collect();

    let reports = executor.run_all(jobs).await;

    let mut failed = 0usize;
    for report in &reports {
        match (&report.result, &report.output) {
            (Ok(result), Some(path)) => info!(
                clip = %report.source.display(),
                status = %result.status(),
                output = %path.display(),
                "Result written"
            ),
            (Ok(result), None) => println!("{}", serde_json::to_string_pretty(result)?),
            (Err(e), _) => {
                failed += 1;
                error!(clip = %report.source.display(), "Analysis failed: {}", e);
            }
        }
    }

    info!(clips = reports.len(), failed, "Worker finished");
    if failed > 0 {
        anyhow::bail!("{failed} of {} clips failed", reports.len());
    }
    Ok(())
}
