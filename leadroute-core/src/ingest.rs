//! Lead intake
//!
//! [`LeadIntake`] is the single path from raw fields to a routed lead, used
//! by both the push endpoint and the batch source scan. [`SourceProcessor`]
//! walks the tabular source row by row; one bad row never stops the scan.

use crate::normalize::{normalize_lead, RawLead, TimestampMode, ValidationError};
use crate::router::{DeliveryRouter, RoutingOutcome};
use crate::source::{SourceError, TabularSource};
use crate::store::{InsertOutcome, LeadStore};
use leadroute_common::Error;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntakeOutcome {
    /// New lead stored and routed
    Inserted(RoutingOutcome),
    /// Lead id already stored; nothing changed
    Duplicate { lead_id: String },
}

#[derive(Debug, Error)]
pub enum IntakeError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Store(#[from] Error),
}

#[derive(Clone)]
pub struct LeadIntake {
    store: LeadStore,
    router: Arc<DeliveryRouter>,
}

impl LeadIntake {
    pub fn new(store: LeadStore, router: Arc<DeliveryRouter>) -> Self {
        Self { store, router }
    }

    pub fn router(&self) -> &Arc<DeliveryRouter> {
        &self.router
    }

    /// Validate, persist and (for new leads) route one lead
    pub async fn accept(&self, raw: &RawLead, mode: TimestampMode) -> Result<IntakeOutcome, IntakeError> {
        let draft = normalize_lead(raw, mode)?;

        if self.store.insert(&draft).await? == InsertOutcome::DuplicateSkipped {
            info!(lead_id = %draft.id, "Duplicate lead skipped");
            return Ok(IntakeOutcome::Duplicate { lead_id: draft.id });
        }

        let lead = self
            .store
            .get(&draft.id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("lead {} vanished after insert", draft.id)))?;

        let outcome = self.router.route(&lead).await?;
        Ok(IntakeOutcome::Inserted(outcome))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IngestSummary {
    pub rows: usize,
    pub inserted: usize,
    pub duplicates: usize,
    pub invalid: usize,
    /// New leads with at least one channel delivered
    pub sent: usize,
    /// New leads resolved to a client but delivered nowhere
    pub undelivered: usize,
    pub unresolved: usize,
    pub store_errors: usize,
    pub mark_failures: usize,
}

pub struct SourceProcessor {
    source: Arc<dyn TabularSource>,
    intake: LeadIntake,
    row_pause: Duration,
}

impl SourceProcessor {
    pub fn new(source: Arc<dyn TabularSource>, intake: LeadIntake, row_pause: Duration) -> Self {
        Self {
            source,
            intake,
            row_pause,
        }
    }

    /// Scan the source once.
    ///
    /// A row is marked processed once its lead is stored (new or duplicate).
    /// Rows failing validation or hitting a store error stay unmarked.
    pub async fn process(&self, force: bool) -> Result<IngestSummary, SourceError> {
        let rows = self.source.fetch_unprocessed_rows(force).await?;
        let mut summary = IngestSummary {
            rows: rows.len(),
            ..Default::default()
        };

        for (idx, row) in rows.iter().enumerate() {
            if idx > 0 && !self.row_pause.is_zero() {
                tokio::time::sleep(self.row_pause).await;
            }

            let persisted = match self.intake.accept(&row.to_raw_lead(), TimestampMode::Strict).await {
                Ok(IntakeOutcome::Inserted(outcome)) => {
                    summary.inserted += 1;
                    if !outcome.resolved {
                        summary.unresolved += 1;
                    } else if outcome.is_sent() {
                        summary.sent += 1;
                    } else {
                        summary.undelivered += 1;
                    }
                    true
                }
                Ok(IntakeOutcome::Duplicate { .. }) => {
                    summary.duplicates += 1;
                    true
                }
                Err(IntakeError::Validation(e)) => {
                    warn!(row = row.row_number, error = %e, "Source row rejected");
                    summary.invalid += 1;
                    false
                }
                Err(IntakeError::Store(e)) => {
                    error!(row = row.row_number, error = %e, "Store failure while ingesting row");
                    summary.store_errors += 1;
                    false
                }
            };

            if persisted && !row.is_processed() {
                if let Err(e) = self.source.mark_processed(row.row_number).await {
                    warn!(row = row.row_number, error = %e, "Failed to mark source row processed");
                    summary.mark_failures += 1;
                }
            }
        }

        info!(
            rows = summary.rows,
            inserted = summary.inserted,
            duplicates = summary.duplicates,
            invalid = summary.invalid,
            sent = summary.sent,
            unresolved = summary.unresolved,
            "Source scan complete"
        );
        Ok(summary)
    }
}
