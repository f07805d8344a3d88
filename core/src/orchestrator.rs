//! Sequences planning, paging, comparison, statistics and repair across every
//! range of a run.

use crate::Result;
use crate::blob::BlobStore;
use crate::comparator::Comparator;
use crate::config::Config;
use crate::pager;
use crate::pager::CompletionEstimate;
use crate::pager::PageCursor;
use crate::range::Range;
use crate::range::plan_ranges;
use crate::recompute::RecomputeService;
use crate::repair::RepairCoordinator;
use crate::results::InvalidEntry;
use crate::results::ResultsFile;
use crate::results::SideSnapshot;
use crate::stats::CHECKPOINT_INTERVAL;
use crate::stats::StatsAggregator;
use crate::stats::StatsBucket;
use crate::store::DocumentStore;

/// Lifecycle of a run. `Planned` once, then per range
/// `Paging -> (Comparing -> Repairing? -> Checkpointed)* -> RangeDone`, and
/// finally `AllRangesDone`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Planned,
    Paging,
    Comparing,
    Repairing,
    Checkpointed,
    RangeDone,
    AllRangesDone,
}

impl RunState {
    pub const fn as_str(self) -> &'static str {
        match self {
            RunState::Planned => "planned",
            RunState::Paging => "paging",
            RunState::Comparing => "comparing",
            RunState::Repairing => "repairing",
            RunState::Checkpointed => "checkpointed",
            RunState::RangeDone => "range_done",
            RunState::AllRangesDone => "all_ranges_done",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeReport {
    pub label: String,
    pub stats: StatsBucket,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    pub ranges: Vec<RangeReport>,
    /// Records whose declared value was rewritten in the database.
    pub repaired: u64,
    /// Coordinates the recompute service accepted.
    pub recomputed: u64,
}

pub struct Orchestrator<'a> {
    config: &'a Config,
    store: &'a dyn DocumentStore,
    blobs: &'a dyn BlobStore,
    recompute: Option<&'a dyn RecomputeService>,
    state: RunState,
    history: Vec<RunState>,
}

impl<'a> Orchestrator<'a> {
    pub fn new(
        config: &'a Config,
        store: &'a dyn DocumentStore,
        blobs: &'a dyn BlobStore,
        recompute: Option<&'a dyn RecomputeService>,
    ) -> Self {
        Self {
            config,
            store,
            blobs,
            recompute,
            state: RunState::Planned,
            history: Vec::new(),
        }
    }

    /// Every state entered so far, in order.
    pub fn history(&self) -> &[RunState] {
        &self.history
    }

    fn transition(&mut self, next: RunState) {
        tracing::debug!(from = self.state.as_str(), to = next.as_str(), "run state");
        self.state = next;
        self.history.push(next);
    }

    /// Processes every range in order. Each range's results are on disk
    /// before the next one starts.
    pub async fn run(&mut self) -> Result<RunReport> {
        self.transition(RunState::Planned);
        check_target(self.config, self.store).await;

        let ranges = plan_ranges(&self.config.window, self.config.initial_skip);
        tracing::info!(
            ranges = ranges.len(),
            page_size = self.config.page_size,
            initial_skip = self.config.initial_skip,
            repair = self.config.repairs(),
            output = %self.config.output_file.display(),
            "starting data synchronization analysis"
        );

        let mut stats = StatsAggregator::new(
            ResultsFile::new(&self.config.output_file),
            self.config.repairs(),
            self.config.initial_skip,
        );
        let mut report = RunReport::default();
        for range in &ranges {
            self.run_range(range, &mut stats, &mut report).await?;
            if let Some(bucket) = stats.bucket(&range.label) {
                report.ranges.push(RangeReport {
                    label: range.label.clone(),
                    stats: bucket.clone(),
                });
            }
        }

        self.transition(RunState::AllRangesDone);
        stats.flush()?;
        Ok(report)
    }

    async fn run_range(
        &mut self,
        range: &Range,
        stats: &mut StatsAggregator,
        report: &mut RunReport,
    ) -> Result<()> {
        tracing::info!(range = %range.label, "processing range");
        self.transition(RunState::Paging);
        let plan = pager::plan(
            self.store,
            range,
            self.config.page_size,
            self.config.initial_skip,
        )
        .await?;
        stats.init(&range.label, plan.missing_documents);

        if plan.pages == 0 {
            stats.flush()?;
            self.transition(RunState::RangeDone);
            return Ok(());
        }

        let repairing = self.config.repairs() && !range.is_sample();
        let comparator = Comparator::new(self.blobs);
        let mut repair = RepairCoordinator::new(self.config.repair_mode);
        let mut cursor = PageCursor::new(
            range.filter_missing(),
            self.config.page_size,
            self.config.initial_skip,
        );
        if range.is_sample() {
            cursor = cursor.single_pass();
        }
        if repairing && plan.pages > 1 {
            tracing::warn!(
                range = %range.label,
                pages = plan.pages,
                "repaired records leave the missing-declared set while paging; \
                 later pages skip past unexamined records, rerun to cover them"
            );
        }

        let mut invalid = 0;
        let mut sampled = 0;
        while let Some(page) = cursor.next_page(self.store).await? {
            tracing::info!(
                range = %range.label,
                skip = page.skip,
                "processing page {} of {}",
                page.number + 1,
                plan.pages
            );
            self.transition(RunState::Comparing);
            let mut in_page: u64 = 0;
            for record in &page.records {
                let comparison = comparator.compare(record).await;
                sampled += 1;
                in_page += 1;
                if comparison.is_drift {
                    invalid += 1;
                    if self.config.verbose {
                        stats.record_invalid(
                            &range.label,
                            &record.id,
                            InvalidEntry {
                                db: SideSnapshot {
                                    licensed: record.declared.clone(),
                                    meta: record.meta.clone(),
                                },
                                blob: SideSnapshot {
                                    licensed: comparison.blob_value.clone(),
                                    meta: comparison.blob_meta.clone(),
                                },
                            },
                        );
                    }
                    if repairing {
                        repair.collect(record, &comparison);
                    }
                }
                if in_page % CHECKPOINT_INTERVAL == 0 {
                    stats.update(&range.label, invalid, sampled, true)?;
                }
            }

            if !repair.is_empty() {
                self.transition(RunState::Repairing);
                let outcome = repair.flush(self.store, self.recompute).await;
                report.repaired += outcome.db_updated;
                report.recomputed += outcome.upstream_ok;
            }

            stats.update(&range.label, invalid, sampled, false)?;
            self.transition(RunState::Checkpointed);
        }

        stats.flush()?;
        self.transition(RunState::RangeDone);
        Ok(())
    }
}

/// Logs whether the configured database and collection exist. Never fails
/// the run.
pub async fn check_target(config: &Config, store: &dyn DocumentStore) {
    match store.database_names().await {
        Ok(names) if names.contains(&config.database) => {
            tracing::info!(database = %config.database, "using database");
        }
        Ok(_) => tracing::warn!(database = %config.database, "database not found"),
        Err(err) => tracing::warn!("failed to list databases: {err}"),
    }
    match store.collection_names().await {
        Ok(names) if names.contains(&config.collection) => {
            tracing::info!(collection = %config.collection, "using collection");
        }
        Ok(_) => tracing::warn!(collection = %config.collection, "collection not found"),
        Err(err) => tracing::warn!("failed to list collections: {err}"),
    }
    tracing::info!(container = %config.container, "using blob container");
}

/// Planning numbers for one range, as printed by a dry run.
#[derive(Debug, Clone, PartialEq)]
pub struct DryRunRow {
    pub label: String,
    pub total_documents: u64,
    pub missing_documents: u64,
    pub missing_percent: f64,
    pub estimate: CompletionEstimate,
}

impl DryRunRow {
    pub const CSV_HEADER: &'static str = "range,total,missing,missing_percent,est_hours,est_days";

    /// `label,total,missing,missing_percent,est_hours,est_days`
    pub fn to_csv_line(&self) -> String {
        format!(
            "{},{},{},{:.2},{:.2},{:.2}",
            self.label,
            self.total_documents,
            self.missing_documents,
            self.missing_percent,
            self.estimate.hours,
            self.estimate.days
        )
    }
}

/// Counts every range without reading records or touching any file.
pub async fn dry_run(config: &Config, store: &dyn DocumentStore) -> Result<Vec<DryRunRow>> {
    check_target(config, store).await;
    let mut rows = Vec::new();
    for range in plan_ranges(&config.window, config.initial_skip) {
        let plan = pager::plan(store, &range, config.page_size, config.initial_skip).await?;
        rows.push(DryRunRow {
            missing_percent: plan.missing_percent(),
            label: range.label,
            total_documents: plan.total_documents,
            missing_documents: plan.missing_documents,
            estimate: plan.estimate,
        });
    }
    Ok(rows)
}
