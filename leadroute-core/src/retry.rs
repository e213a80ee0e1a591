//! Delivery status reporting and bounded retries
//!
//! Per lead and status column the lifecycle is:
//! pending → delivered (terminal), or pending → error → error ... until a
//! retry delivers or `delivery_attempts` reaches the bound.

use crate::channels::ChannelKind;
use crate::router::{ChannelOutcome, DeliveryRouter};
use crate::store::{LeadFilter, LeadStore};
use leadroute_common::db::{Client, DeliveryState, Lead, StatusColumn};
use leadroute_common::Result;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ColumnCounts {
    pub delivered: usize,
    pub error: usize,
    pub pending: usize,
}

impl ColumnCounts {
    fn add(&mut self, state: DeliveryState) {
        match state {
            DeliveryState::Delivered => self.delivered += 1,
            DeliveryState::Error => self.error += 1,
            DeliveryState::Pending => self.pending += 1,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LeadStatusLine {
    pub id: String,
    pub created_at: String,
    pub tag: String,
    pub client_id: Option<String>,
    pub sheet_status: Option<String>,
    pub sheet_time: Option<String>,
    pub crm_status: Option<String>,
    pub crm_time: Option<String>,
    pub delivery_attempts: i64,
}

impl From<&Lead> for LeadStatusLine {
    fn from(lead: &Lead) -> Self {
        Self {
            id: lead.id.clone(),
            created_at: leadroute_common::time::format_lead_timestamp(&lead.created_at),
            tag: lead.tag.clone(),
            client_id: lead.client_id.clone(),
            sheet_status: lead.sheet_delivery_status.clone(),
            sheet_time: delivery_time_text(lead, StatusColumn::Sheet),
            crm_status: lead.crm_delivery_status.clone(),
            crm_time: delivery_time_text(lead, StatusColumn::Crm),
            delivery_attempts: lead.delivery_attempts,
        }
    }
}

fn delivery_time_text(lead: &Lead, column: StatusColumn) -> Option<String> {
    lead.delivery_time(column)
        .map(|t| leadroute_common::time::format_lead_timestamp(&t))
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub total: usize,
    pub per_column: BTreeMap<StatusColumn, ColumnCounts>,
    /// Present only for full reports
    pub leads: Option<Vec<LeadStatusLine>>,
}

#[derive(Debug, Clone)]
pub struct RetryRequest {
    pub tag: Option<String>,
    pub max_attempts: i64,
    pub targets: Vec<StatusColumn>,
    pub dry_run: bool,
}

impl RetryRequest {
    /// Retry every column with the given attempt bound
    pub fn sweep(max_attempts: i64) -> Self {
        Self {
            tag: None,
            max_attempts,
            targets: StatusColumn::ALL.to_vec(),
            dry_run: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RetrySummary {
    /// Unresolved leads plus leads with a targeted channel still to deliver
    pub candidates: usize,
    /// Candidate ids (dry runs only)
    pub candidate_ids: Vec<String>,
    /// Leads where at least one channel was invoked
    pub attempted: usize,
    /// Leads where a requested channel now reports delivered
    pub succeeded: usize,
    pub failed: usize,
    /// Tag resolves to no client
    pub unresolved: usize,
    /// Selected by the query but no eligible targeted channel is left to
    /// deliver; not counted as candidates
    pub settled: usize,
    /// Store failures while resolving
    pub errors: usize,
}

enum RetryPlan {
    Unresolved,
    Settled,
    Dispatch(Client, Vec<ChannelKind>),
}

pub struct RetryService {
    store: LeadStore,
    router: Arc<DeliveryRouter>,
}

impl RetryService {
    pub fn new(store: LeadStore, router: Arc<DeliveryRouter>) -> Self {
        Self { store, router }
    }

    /// Per-column delivered / error / pending counts over matching leads
    pub async fn status_report(&self, filter: &LeadFilter, full: bool) -> Result<StatusReport> {
        let leads = self.store.query(filter).await?;

        let mut per_column: BTreeMap<StatusColumn, ColumnCounts> =
            StatusColumn::ALL.iter().map(|&c| (c, ColumnCounts::default())).collect();
        for lead in &leads {
            for column in StatusColumn::ALL {
                per_column.entry(column).or_default().add(lead.state(column));
            }
        }

        Ok(StatusReport {
            total: leads.len(),
            per_column,
            leads: full.then(|| leads.iter().map(LeadStatusLine::from).collect()),
        })
    }

    /// Work left for one selected lead, without side effects
    async fn plan(&self, lead: &Lead, targets: &[StatusColumn]) -> Result<RetryPlan> {
        let Some(client) = self.router.directory().resolve(&lead.tag).await? else {
            return Ok(RetryPlan::Unresolved);
        };

        let kinds: Vec<_> = self
            .router
            .eligible_channels(lead, &client)
            .into_iter()
            .filter(|kind| {
                let column = kind.column();
                targets.contains(&column) && lead.state(column) != DeliveryState::Delivered
            })
            .collect();

        if kinds.is_empty() {
            Ok(RetryPlan::Settled)
        } else {
            Ok(RetryPlan::Dispatch(client, kinds))
        }
    }

    pub async fn retry(&self, request: &RetryRequest) -> Result<RetrySummary> {
        let selected = self
            .store
            .retry_candidates(request.tag.as_deref(), request.max_attempts, &request.targets)
            .await?;

        let mut summary = RetrySummary::default();
        let mut planned = Vec::new();
        for lead in selected {
            match self.plan(&lead, &request.targets).await {
                Ok(RetryPlan::Settled) => summary.settled += 1,
                Ok(plan) => planned.push((lead, plan)),
                Err(e) => {
                    warn!(lead_id = %lead.id, error = %e, "Retry: client lookup failed");
                    summary.errors += 1;
                }
            }
        }
        summary.candidates = planned.len();

        if request.dry_run {
            summary.candidate_ids = planned.iter().map(|(lead, _)| lead.id.clone()).collect();
            info!(candidates = summary.candidates, settled = summary.settled, "Retry dry run");
            return Ok(summary);
        }

        for (lead, plan) in &planned {
            let RetryPlan::Dispatch(client, kinds) = plan else {
                warn!(lead_id = %lead.id, tag = %lead.tag, "Retry: tag still resolves to no client");
                summary.unresolved += 1;
                continue;
            };

            if lead.client_id.as_deref() != Some(client.id.as_str()) {
                if let Err(e) = self.store.update_client(&lead.id, &client.id).await {
                    warn!(lead_id = %lead.id, error = %e, "Retry: failed to record client assignment");
                }
            }

            let outcome = self.router.dispatch(lead, client, kinds).await;
            summary.attempted += 1;

            let delivered = kinds
                .iter()
                .any(|kind| outcome.per_channel.get(kind).is_some_and(ChannelOutcome::is_delivered));
            if delivered {
                summary.succeeded += 1;
            } else {
                summary.failed += 1;
            }
        }

        info!(
            candidates = summary.candidates,
            attempted = summary.attempted,
            succeeded = summary.succeeded,
            failed = summary.failed,
            unresolved = summary.unresolved,
            settled = summary.settled,
            "Retry pass complete"
        );
        Ok(summary)
    }
}
