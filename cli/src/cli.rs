use clap::ArgAction;
use clap::Parser;
use clap::ValueEnum;
use clap::builder::BoolishValueParser;
use defsync_core::RawSettings;
use defsync_core::RepairMode;
use std::path::PathBuf;

/// Audit (and optionally repair) drift between the definitions database and
/// the blob store.
///
/// Every option can also be set through the environment variable shown in
/// its help, including from a `.env` file in the working directory.
#[derive(Parser, Debug)]
#[command(name = "defsync", version)]
pub struct Cli {
    /// MongoDB connection string.
    #[arg(long, env = "MONGO_CONNECTION_STRING", hide_env_values = true)]
    pub mongo_connection_string: Option<String>,

    /// Base URL of the blob store holding canonical definitions.
    #[arg(long = "blob-url", env = "BASE_AZURE_BLOB_URL")]
    pub blob_base_url: Option<String>,

    /// Base URL of the service that recomputes definitions.
    #[arg(long = "service-url", env = "SERVICE_API_URL")]
    pub service_url: Option<String>,

    /// Blob container name. Defaults to `develop-definition`.
    #[arg(long = "container", env = "AZURE_CONTAINER_NAME")]
    pub container: Option<String>,

    /// Results file. Derived from the range and skip offset when omitted.
    #[arg(long, short = 'o', env = "OUTPUT_FILE", value_name = "FILE")]
    pub output_file: Option<PathBuf>,

    /// Rewrite drifted records and request recomputation (date ranges only).
    #[arg(long, env = "REPAIR", action = ArgAction::SetTrue, value_parser = BoolishValueParser::new())]
    pub repair: bool,

    /// How recomputation is requested when repairing.
    #[arg(long, env = "REPAIR_MODE", value_enum, default_value_t = RepairModeArg::Batch)]
    pub repair_mode: RepairModeArg,

    /// Only count documents and print the estimate for each range.
    #[arg(long, env = "DRY_RUN", action = ArgAction::SetTrue, value_parser = BoolishValueParser::new())]
    pub dry_run: bool,

    /// Record both sides of every drifted document in the results file.
    #[arg(long, short = 'v', env = "VERBOSE", action = ArgAction::SetTrue, value_parser = BoolishValueParser::new())]
    pub verbose: bool,

    /// Records per page, at most 500.
    #[arg(long, env = "PAGE_SIZE")]
    pub page_size: Option<u64>,

    /// Records to skip in a date range, to resume an interrupted run.
    #[arg(long, env = "INITIAL_SKIP", default_value_t = 0)]
    pub initial_skip: u64,

    /// First day of an explicit range (YYYY-MM-DD). Takes precedence over months.
    #[arg(long, env = "START_DATE", value_name = "YYYY-MM-DD")]
    pub start_date: Option<String>,

    /// Last day of an explicit range, inclusive.
    #[arg(long, env = "END_DATE", value_name = "YYYY-MM-DD")]
    pub end_date: Option<String>,

    /// First month to sample. Defaults to 2024-01.
    #[arg(long, env = "START_MONTH", value_name = "YYYY-MM")]
    pub start_month: Option<String>,

    /// Last month to sample, inclusive. Defaults to 2024-06.
    #[arg(long, env = "END_MONTH", value_name = "YYYY-MM")]
    pub end_month: Option<String>,

    #[arg(long = "db-name", env = "DB_NAME")]
    pub database: Option<String>,

    #[arg(long = "collection-name", env = "COLLECTION_NAME")]
    pub collection: Option<String>,

    /// Timeout for each blob fetch and recompute request.
    #[arg(long, env = "HTTP_TIMEOUT_SECS")]
    pub http_timeout_secs: Option<u64>,

    /// Server-side time limit for each count and page query.
    #[arg(long, env = "DB_TIMEOUT_SECS")]
    pub db_timeout_secs: Option<u64>,

    /// Attempts per HTTP request; 1 disables retries.
    #[arg(long, env = "MAX_ATTEMPTS")]
    pub max_attempts: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum RepairModeArg {
    /// One POST per page listing every drifted coordinate.
    Batch,
    /// One forced GET per drifted record.
    PerRecord,
}

impl From<RepairModeArg> for RepairMode {
    fn from(value: RepairModeArg) -> Self {
        match value {
            RepairModeArg::Batch => RepairMode::Batch,
            RepairModeArg::PerRecord => RepairMode::PerRecord,
        }
    }
}

impl Cli {
    pub fn into_settings(self) -> RawSettings {
        RawSettings {
            connection_string: self.mongo_connection_string,
            blob_base_url: self.blob_base_url,
            service_url: self.service_url,
            container: self.container,
            output_file: self.output_file,
            repair: self.repair,
            repair_mode: self.repair_mode.into(),
            dry_run: self.dry_run,
            verbose: self.verbose,
            page_size: self.page_size,
            initial_skip: self.initial_skip,
            start_date: self.start_date,
            end_date: self.end_date,
            start_month: self.start_month,
            end_month: self.end_month,
            database: self.database,
            collection: self.collection,
            http_timeout_secs: self.http_timeout_secs,
            db_timeout_secs: self.db_timeout_secs,
            max_attempts: self.max_attempts,
        }
    }
}
