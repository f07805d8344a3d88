mod cli;

use anyhow::Context;
use defsync_client::HttpTransport;
use defsync_client::ReqwestTransport;
use defsync_core::Config;
use defsync_core::DryRunRow;
use defsync_core::HttpBlobStore;
use defsync_core::HttpRecomputeService;
use defsync_core::Orchestrator;
use defsync_core::RecomputeService;
use defsync_core::dry_run;
use defsync_mongo::MongoDocumentStore;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

pub use cli::Cli;
pub use cli::RepairModeArg;

const DEFAULT_LOG_LEVEL: &str = "info";

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(DEFAULT_LOG_LEVEL))
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_LEVEL));
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_filter(env_filter);
    let _ = tracing_subscriber::registry().with(fmt_layer).try_init();
}

pub async fn run_main(cli: Cli) -> anyhow::Result<()> {
    init_tracing();

    let config = Config::from_settings(cli.into_settings()).context("invalid configuration")?;
    let store = MongoDocumentStore::connect(
        &config.connection_string,
        &config.database,
        &config.collection,
        config.db_timeout,
    )
    .await
    .context("failed to open the definitions database")?;

    if config.dry_run {
        let rows = dry_run(&config, &store).await?;
        println!("{}", DryRunRow::CSV_HEADER);
        for row in rows {
            println!("{}", row.to_csv_line());
        }
        return Ok(());
    }

    let transport: Arc<dyn HttpTransport> =
        Arc::new(ReqwestTransport::new(reqwest::Client::new()));
    let blob_base_url = config
        .blob_base_url
        .as_deref()
        .context("BASE_AZURE_BLOB_URL is required")?;
    let blobs = HttpBlobStore::new(
        Arc::clone(&transport),
        blob_base_url,
        &config.container,
        config.http_timeout,
        config.retry,
    );
    let recompute = config.service_url.as_deref().map(|service_url| {
        HttpRecomputeService::new(
            Arc::clone(&transport),
            service_url,
            config.http_timeout,
            config.retry,
        )
    });

    let report = Orchestrator::new(
        &config,
        &store,
        &blobs,
        recompute.as_ref().map(|service| service as &dyn RecomputeService),
    )
    .run()
    .await
    .with_context(|| {
        format!(
            "run aborted; results so far are in {}",
            config.output_file.display()
        )
    })?;

    for range in &report.ranges {
        info!(
            range = %range.label,
            sampled = range.stats.sample_total,
            invalid = range.stats.sample_invalid,
            estimated_invalid = range.stats.total_estimated_invalid,
            "{} drifted",
            range.stats.percent_invalid
        );
    }
    info!(
        repaired = report.repaired,
        recomputed = report.recomputed,
        output = %config.output_file.display(),
        "finished data synchronization analysis"
    );
    Ok(())
}
