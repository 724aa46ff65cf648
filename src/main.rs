use clap::Parser;
use pose_pipeline::utils::error::{EtlError, ErrorSeverity};
use pose_pipeline::utils::{logger, validation::Validate};
use pose_pipeline::{
    CliConfig, EtlEngine, FfmpegDecoder, KeypointDatabase, LocalStorage, PipelineConfig,
    PosePipeline, ProcessPoseEstimator,
};

fn exit_code(e: &EtlError) -> i32 {
    match e.severity() {
        ErrorSeverity::Low => 0,
        ErrorSeverity::Medium => 2,
        ErrorSeverity::High => 1,
        ErrorSeverity::Critical => 3,
    }
}

fn report_failure(context: &str, e: &EtlError) -> ! {
    tracing::error!(
        "❌ {}: {} (Category: {:?}, Severity: {:?})",
        context,
        e,
        e.category(),
        e.severity()
    );
    tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());
    eprintln!("❌ {}", e.user_friendly_message());
    eprintln!("💡 {}", e.recovery_suggestion());
    std::process::exit(exit_code(e).max(1));
}

async fn run(config: &PipelineConfig) -> pose_pipeline::Result<pose_pipeline::core::RunSummary> {
    let storage = LocalStorage::new(config.keypoints_dir());
    let decoder = FfmpegDecoder::new(&config.decoder);
    let estimator = ProcessPoseEstimator::new(&config.estimator);
    let database = KeypointDatabase::connect(config.database_path()).await?;

    let pipeline = PosePipeline::new(storage, decoder, estimator, database);
    let engine = EtlEngine::new_with_monitoring(
        pipeline,
        config.input_dir(),
        config.paths.pattern.clone(),
        config.monitoring_enabled(),
    );

    let summary = engine.run().await?;
    engine.pipeline().sink().close().await;
    Ok(summary)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = CliConfig::parse();

    let config = match cli.resolve() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ Failed to load configuration: {}", e);
            eprintln!("💡 {}", e.recovery_suggestion());
            std::process::exit(1);
        }
    };

    if config.monitoring.json_logs {
        logger::init_json_logger(cli.verbose);
    } else {
        logger::init_cli_logger(cli.verbose);
    }

    tracing::info!("Starting pose-pipeline");
    tracing::debug!("Resolved config: {:?}", config);

    if let Err(e) = config.validate() {
        report_failure("Configuration validation failed", &e);
    }

    if config.monitoring_enabled() {
        tracing::info!("🔍 System monitoring enabled");
    }

    match run(&config).await {
        Ok(summary) => {
            tracing::info!(
                "✅ Processed {} videos: {} loaded, {} without pose, {} failed",
                summary.videos_found(),
                summary.loaded(),
                summary.videos_found() - summary.loaded() - summary.failed(),
                summary.failed()
            );
            tracing::info!("📁 Keypoints JSON in: {}", config.keypoints_dir().display());
            tracing::info!("🗄️ Database: {}", config.database_path().display());
        }
        Err(e) => report_failure("Pipeline failed", &e),
    }

    Ok(())
}
