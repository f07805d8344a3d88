use crate::comparator::Comparison;
use crate::record::Record;
use crate::recompute::RecomputeService;
use crate::store::DeclaredUpdate;
use crate::store::DocumentStore;
use serde_json::Value;

/// How drifted records are pushed to the recompute service.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RepairMode {
    /// One newline-joined POST per page.
    #[default]
    Batch,
    /// One GET per drifted record.
    PerRecord,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PendingRepair {
    pub id: String,
    pub repair_coordinate: String,
    /// The blob's declared value, written back to the database.
    pub declared: Option<Value>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RepairOutcome {
    /// Records the database reported as modified.
    pub db_updated: u64,
    /// Coordinates sent upstream.
    pub requested: u64,
    /// Coordinates the upstream service accepted.
    pub upstream_ok: u64,
}

/// Collects drifted records for one page and repairs them at page end.
#[derive(Debug, Default)]
pub struct RepairCoordinator {
    mode: RepairMode,
    pending: Vec<PendingRepair>,
}

impl RepairCoordinator {
    pub fn new(mode: RepairMode) -> Self {
        Self {
            mode,
            pending: Vec::new(),
        }
    }

    pub fn collect(&mut self, record: &Record, comparison: &Comparison) {
        self.pending.push(PendingRepair {
            id: record.id.clone(),
            repair_coordinate: record.coordinates.repair_coordinate(),
            declared: comparison.blob_value.clone(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Updates the database, then asks the recompute service to regenerate
    /// the same records. Failures in either step are logged and swallowed;
    /// the pending list is always drained.
    pub async fn flush(
        &mut self,
        store: &dyn DocumentStore,
        recompute: Option<&dyn RecomputeService>,
    ) -> RepairOutcome {
        let pending = std::mem::take(&mut self.pending);
        if pending.is_empty() {
            return RepairOutcome::default();
        }

        let updates: Vec<DeclaredUpdate> = pending
            .iter()
            .map(|repair| DeclaredUpdate {
                id: repair.id.clone(),
                declared: repair.declared.clone(),
            })
            .collect();
        let db_updated = match store.set_declared(&updates).await {
            Ok(modified) => {
                tracing::info!(modified, requested = updates.len(), "updated declared values");
                modified
            }
            Err(err) => {
                tracing::warn!("failed to update declared values: {err}");
                0
            }
        };

        let coordinates: Vec<String> = pending
            .into_iter()
            .map(|repair| repair.repair_coordinate)
            .collect();
        let requested = coordinates.len() as u64;
        let upstream_ok = match recompute {
            Some(service) => self.request_recompute(service, &coordinates).await,
            None => {
                tracing::warn!(requested, "no recompute service configured");
                0
            }
        };

        RepairOutcome {
            db_updated,
            requested,
            upstream_ok,
        }
    }

    async fn request_recompute(&self, service: &dyn RecomputeService, coordinates: &[String]) -> u64 {
        match self.mode {
            RepairMode::Batch => match service.recompute_batch(coordinates).await {
                Ok(()) => {
                    tracing::info!(count = coordinates.len(), "requested batch recompute");
                    coordinates.len() as u64
                }
                Err(err) => {
                    tracing::warn!(count = coordinates.len(), "batch recompute failed: {err}");
                    0
                }
            },
            RepairMode::PerRecord => {
                let mut ok = 0;
                for coordinate in coordinates {
                    match service.recompute_one(coordinate).await {
                        Ok(()) => ok += 1,
                        Err(err) => {
                            tracing::warn!(%coordinate, "recompute failed: {err}");
                        }
                    }
                }
                ok
            }
        }
    }
}
