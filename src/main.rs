use clap::Parser;
use ocr_etl::core::report::render_flat_row;
use ocr_etl::core::{ConfigProvider, FileHandle};
use ocr_etl::utils::error::{ErrorSeverity, EtlError};
use ocr_etl::utils::{logger, validation::Validate};
use ocr_etl::{
    BatchPipeline, CliConfig, EtlEngine, HttpExtractionClient, LocalStorage, SignatureResolver,
    TomlConfig,
};

struct RunOptions {
    files: Vec<FileHandle>,
    show: bool,
    monitor: bool,
}

#[tokio::main]
async fn main() {
    let config = CliConfig::parse();

    let toml_config = match config.config.as_ref().map(TomlConfig::from_file).transpose() {
        Ok(toml_config) => toml_config,
        Err(e) => {
            logger::init_logger(config.verbose, None, config.log_format);
            exit_with(e);
        }
    };

    let log_level = toml_config.as_ref().and_then(TomlConfig::log_level);
    logger::init_logger(config.verbose, log_level, config.log_format);

    tracing::info!("Starting ocr-etl");
    if config.verbose {
        tracing::debug!("CLI config: {:?}", config);
    }

    let options = RunOptions {
        files: config.files.iter().map(FileHandle::from_path).collect(),
        show: config.show,
        monitor: config.monitor,
    };

    let outcome = match toml_config {
        Some(toml_config) => {
            if let Some(path) = &config.config {
                tracing::info!("📁 Loaded configuration from: {}", path.display());
            }
            let options = RunOptions {
                monitor: options.monitor || toml_config.monitoring_enabled(),
                ..options
            };
            run(toml_config, options).await
        }
        None => run(config, options).await,
    };

    if let Err(e) = outcome {
        exit_with(e);
    }
}

fn exit_with(e: EtlError) -> ! {
    tracing::error!(
        "❌ Run failed: {} (Category: {:?}, Severity: {:?})",
        e,
        e.category(),
        e.severity()
    );
    tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

    eprintln!("❌ {}", e.user_friendly_message());
    eprintln!("💡 {}", e.recovery_suggestion());

    let exit_code = match e.severity() {
        ErrorSeverity::Low => 0,
        ErrorSeverity::Medium => 2,
        ErrorSeverity::High => 1,
        ErrorSeverity::Critical => 3,
    };
    std::process::exit(exit_code)
}

async fn run<C>(config: C, options: RunOptions) -> Result<(), EtlError>
where
    C: ConfigProvider + Validate + 'static,
{
    config.validate()?;

    let resolver = if options.show {
        SignatureResolver::new(config.service_endpoint()).ok()
    } else {
        None
    };

    let storage = LocalStorage::new(config.output_path());
    let client = HttpExtractionClient::from_config(&config);
    tracing::debug!("Extraction endpoint: {}", client.url());

    let pipeline = BatchPipeline::new(storage, config, client);
    pipeline.select_files(options.files)?;

    if options.monitor {
        tracing::info!("🔍 System monitoring enabled");
    }
    let engine = EtlEngine::new_with_monitoring(pipeline, options.monitor);
    let report = engine.run().await?;

    if options.show {
        for (file_name, row) in report.result.file_names.iter().zip(&report.result.flat_rows) {
            println!("{}", render_flat_row(file_name, row, resolver.as_ref()));
        }
    }

    println!("✅ Extracted {} file(s)", report.result.flat_rows.len());
    println!("📁 Output saved to: {}", report.output_path);
    Ok(())
}
