use clap::Parser;
use log::{error, info, warn};
use std::env;
use std::process;
use std::sync::Arc;
use std::time::Duration;

use fileflow::fileflow::config::AppConfig;
use fileflow::fileflow::ingest::{
    run_scan_pass, ClaimedSet, FileProcessor, RowValidator, ShutdownFlag,
};
use fileflow::fileflow::kafka::{BrokerPublisher, KafkaRecordSink};
use fileflow::fileflow::logging;

#[derive(Parser)]
#[command(name = "fileflow")]
#[command(about = "Watches a directory for CSV drops and streams validated rows to Kafka")]
#[command(version)]
struct Cli {
    /// Path to the ini configuration file (APP_CONFIG_PATH overrides this)
    #[arg(long, default_value = "config.ini")]
    config: String,

    /// Keep scanning on an interval instead of exiting after one pass
    #[arg(long)]
    watch: bool,

    /// Seconds between scan passes in watch mode (overrides config)
    #[arg(long)]
    interval: Option<u64>,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config_path = env::var("APP_CONFIG_PATH").unwrap_or_else(|_| cli.config.clone());
    let cfg = match AppConfig::load(&config_path) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("failed to load configuration from '{}': {}", config_path, e);
            process::exit(2);
        }
    };

    // Keep the handle alive; dropping it shuts the logger down
    let _logger = match logging::init(&cfg) {
        Ok(handle) => handle,
        Err(e) => {
            eprintln!("failed to initialize logging: {}", e);
            process::exit(2);
        }
    };

    // Env-override warnings are collected during load and emitted here,
    // once the logger is up.
    for warning in &cfg.load_warnings {
        warn!("{}", warning);
    }

    info!(
        "paths: input={} archive={} error={}",
        cfg.watch_dir.display(),
        cfg.archive_dir.display(),
        cfg.error_dir.display()
    );

    if !cfg.watch_dir.is_dir() {
        error!(
            "watch directory '{}' is missing or not a directory; exiting",
            cfg.watch_dir.display()
        );
        process::exit(3);
    }

    if cfg.broker_address.is_empty() || cfg.topic_name.is_empty() {
        error!(
            "broker address or topic not configured; set KAFKA_BROKER and KAFKA_TOPIC \
             or the [kafka] section"
        );
        process::exit(4);
    }

    let sink = match KafkaRecordSink::new(&cfg.broker_address, &cfg.topic_name, &cfg.client_id) {
        Ok(sink) => sink,
        Err(e) => {
            error!("could not initialize Kafka producer: {}", e);
            process::exit(5);
        }
    };

    let publisher = BrokerPublisher::new(sink, cfg.retry_policy());
    let validator = RowValidator::new(cfg.columns.clone(), cfg.key_column.clone());
    let processor = Arc::new(FileProcessor::new(
        publisher,
        validator,
        cfg.archive_dir.clone(),
        cfg.error_dir.clone(),
    ));
    let claimed = ClaimedSet::new();

    // One listener for the whole process lifetime. An interrupt trips the
    // flag; the scan pass drains the in-flight file and we exit 130.
    let shutdown = ShutdownFlag::new();
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("interrupt received; draining the in-flight file");
                shutdown.trigger();
            }
        });
    }

    if cli.watch {
        let interval = Duration::from_secs(cli.interval.unwrap_or(cfg.scan_interval_secs));
        info!("watch mode: scanning every {:?}", interval);
        loop {
            match run_scan_pass(
                Arc::clone(&processor),
                &cfg.watch_dir,
                &claimed,
                cfg.max_concurrent_files,
                &shutdown,
            )
            .await
            {
                Ok(n) if n > 0 => info!("scan pass complete; {} file(s) processed", n),
                Ok(_) => {}
                Err(e) => {
                    error!("scan pass failed: {}", e);
                    process::exit(e.exit_code());
                }
            }
            if shutdown.is_triggered() {
                info!("interrupted; exiting");
                process::exit(130);
            }

            tokio::select! {
                _ = shutdown.triggered() => {
                    info!("interrupted; exiting");
                    process::exit(130);
                }
                _ = tokio::time::sleep(interval) => {}
            }
        }
    }

    match run_scan_pass(
        Arc::clone(&processor),
        &cfg.watch_dir,
        &claimed,
        cfg.max_concurrent_files,
        &shutdown,
    )
    .await
    {
        Ok(n) => info!("scan pass complete; {} file(s) processed", n),
        Err(e) => {
            error!("scan pass failed: {}", e);
            process::exit(e.exit_code());
        }
    }
    if shutdown.is_triggered() {
        info!("interrupted; exiting");
        process::exit(130);
    }
}
