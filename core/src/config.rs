//! The immutable run configuration, validated once at startup.

use crate::DefsyncErr;
use crate::Result;
use crate::pager::DEFAULT_PAGE_SIZE;
use crate::pager::MAX_PAGE_SIZE;
use crate::range::DateRange;
use crate::range::MonthRange;
use crate::range::RunWindow;
use crate::range::default_output_file;
use crate::repair::RepairMode;
use defsync_client::RetryPolicy;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_DB_NAME: &str = "clearlydefined";
pub const DEFAULT_COLLECTION_NAME: &str = "definitions-trimmed";
pub const DEFAULT_CONTAINER_NAME: &str = "develop-definition";
pub const DEFAULT_START_MONTH: &str = "2024-01";
pub const DEFAULT_END_MONTH: &str = "2024-06";
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 300;
pub const DEFAULT_DB_TIMEOUT_SECS: u64 = 10_000;

const RETRY_BASE_DELAY: Duration = Duration::from_millis(500);

/// Settings as provided by the operator, before defaults and validation.
/// Empty strings count as unset.
#[derive(Debug, Clone, Default)]
pub struct RawSettings {
    pub connection_string: Option<String>,
    pub blob_base_url: Option<String>,
    pub service_url: Option<String>,
    pub container: Option<String>,
    pub output_file: Option<PathBuf>,
    pub repair: bool,
    pub repair_mode: RepairMode,
    pub dry_run: bool,
    pub verbose: bool,
    pub page_size: Option<u64>,
    pub initial_skip: u64,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub start_month: Option<String>,
    pub end_month: Option<String>,
    pub database: Option<String>,
    pub collection: Option<String>,
    pub http_timeout_secs: Option<u64>,
    pub db_timeout_secs: Option<u64>,
    pub max_attempts: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub connection_string: String,
    pub database: String,
    pub collection: String,
    /// Unset only for dry runs, which never fetch blobs.
    pub blob_base_url: Option<String>,
    pub container: String,
    /// Required only when a date-range run repairs.
    pub service_url: Option<String>,
    pub output_file: PathBuf,
    pub repair: bool,
    pub repair_mode: RepairMode,
    pub dry_run: bool,
    pub verbose: bool,
    pub page_size: u64,
    pub initial_skip: u64,
    pub window: RunWindow,
    pub http_timeout: Duration,
    pub db_timeout: Duration,
    pub retry: RetryPolicy,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl Config {
    pub fn from_settings(raw: RawSettings) -> Result<Self> {
        let connection_string = non_empty(raw.connection_string)
            .ok_or(DefsyncErr::MissingSetting("MONGO_CONNECTION_STRING"))?;

        let start_date = non_empty(raw.start_date);
        let end_date = non_empty(raw.end_date);
        let (window, initial_skip) = match (start_date, end_date) {
            (Some(start), Some(end)) => (
                RunWindow::Dates(DateRange::parse(&start, &end)?),
                raw.initial_skip,
            ),
            _ => {
                let start = non_empty(raw.start_month)
                    .unwrap_or_else(|| DEFAULT_START_MONTH.to_string());
                let end =
                    non_empty(raw.end_month).unwrap_or_else(|| DEFAULT_END_MONTH.to_string());
                if raw.initial_skip > 0 {
                    tracing::warn!(
                        initial_skip = raw.initial_skip,
                        "initial skip is ignored for month runs"
                    );
                }
                (RunWindow::Months(MonthRange::parse(&start, &end)?), 0)
            }
        };
        let is_date_range = matches!(window, RunWindow::Dates(_));

        let blob_base_url = non_empty(raw.blob_base_url);
        if blob_base_url.is_none() && !raw.dry_run {
            return Err(DefsyncErr::MissingSetting("BASE_AZURE_BLOB_URL"));
        }
        let service_url = non_empty(raw.service_url);
        if service_url.is_none() && raw.repair && is_date_range && !raw.dry_run {
            return Err(DefsyncErr::MissingSetting("SERVICE_API_URL"));
        }
        if raw.repair && !is_date_range {
            tracing::warn!("repair only applies to date-range runs; months are sampled read-only");
        }

        let page_size = match raw.page_size {
            None | Some(0) => DEFAULT_PAGE_SIZE,
            Some(size) if size > MAX_PAGE_SIZE => {
                tracing::warn!(
                    requested = size,
                    max = MAX_PAGE_SIZE,
                    "page size exceeds the repair batch limit"
                );
                MAX_PAGE_SIZE
            }
            Some(size) => size,
        };

        let output_file = raw
            .output_file
            .filter(|path| !path.as_os_str().is_empty())
            .unwrap_or_else(|| PathBuf::from(default_output_file(&window, initial_skip)));

        let retry = match raw.max_attempts {
            Some(attempts) if attempts > 1 => RetryPolicy::transient(attempts, RETRY_BASE_DELAY),
            _ => RetryPolicy::no_retry(),
        };

        Ok(Self {
            connection_string,
            database: non_empty(raw.database).unwrap_or_else(|| DEFAULT_DB_NAME.to_string()),
            collection: non_empty(raw.collection)
                .unwrap_or_else(|| DEFAULT_COLLECTION_NAME.to_string()),
            blob_base_url,
            container: non_empty(raw.container)
                .unwrap_or_else(|| DEFAULT_CONTAINER_NAME.to_string()),
            service_url,
            output_file,
            repair: raw.repair,
            repair_mode: raw.repair_mode,
            dry_run: raw.dry_run,
            verbose: raw.verbose,
            page_size,
            initial_skip,
            window,
            http_timeout: Duration::from_secs(
                raw.http_timeout_secs.unwrap_or(DEFAULT_HTTP_TIMEOUT_SECS),
            ),
            db_timeout: Duration::from_secs(raw.db_timeout_secs.unwrap_or(DEFAULT_DB_TIMEOUT_SECS)),
            retry,
        })
    }

    pub fn is_date_range(&self) -> bool {
        matches!(self.window, RunWindow::Dates(_))
    }

    /// Repair runs only against explicit date ranges.
    pub fn repairs(&self) -> bool {
        self.repair && !self.dry_run && self.is_date_range()
    }
}
