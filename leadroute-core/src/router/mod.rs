//! Delivery routing
//!
//! Resolves a lead's client, selects its channels through the rule table and
//! fans the lead out to every selected channel. One channel failing never
//! prevents another from delivering; a lead counts as sent when at least one
//! channel delivered.

pub mod rules;

pub use rules::{DestinationSet, RoutingRule, RuleTable, TagPredicate};

use crate::channels::{ChannelKind, DeliveryChannel};
use crate::directory::ClientDirectory;
use crate::store::LeadStore;
use futures::future::join_all;
use leadroute_common::db::{Client, Lead};
use leadroute_common::time::now_utc_naive;
use leadroute_common::Result;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{error, info, warn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "status", rename_all = "snake_case")]
pub enum ChannelOutcome {
    /// Status text written to the column
    Delivered(String),
    /// `error: ...` status written to the column
    Error(String),
    /// Channel not selected for this lead
    Skipped,
}

impl ChannelOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, ChannelOutcome::Delivered(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoutingOutcome {
    pub lead_id: String,
    pub resolved: bool,
    pub client_id: Option<String>,
    pub per_channel: BTreeMap<ChannelKind, ChannelOutcome>,
}

impl RoutingOutcome {
    pub fn unresolved(lead_id: impl Into<String>) -> Self {
        Self {
            lead_id: lead_id.into(),
            resolved: false,
            client_id: None,
            per_channel: BTreeMap::new(),
        }
    }

    /// At least one channel delivered
    pub fn is_sent(&self) -> bool {
        self.per_channel.values().any(ChannelOutcome::is_delivered)
    }

    pub fn attempted(&self) -> usize {
        self.per_channel
            .values()
            .filter(|o| !matches!(o, ChannelOutcome::Skipped))
            .count()
    }
}

pub struct DeliveryRouter {
    store: LeadStore,
    directory: ClientDirectory,
    rules: RuleTable,
    channels: HashMap<ChannelKind, Arc<dyn DeliveryChannel>>,
}

impl DeliveryRouter {
    pub fn new(store: LeadStore, directory: ClientDirectory, rules: RuleTable) -> Self {
        Self {
            store,
            directory,
            rules,
            channels: HashMap::new(),
        }
    }

    /// Register a channel; replaces any channel of the same kind
    pub fn with_channel(mut self, channel: Arc<dyn DeliveryChannel>) -> Self {
        self.channels.insert(channel.kind(), channel);
        self
    }

    pub fn directory(&self) -> &ClientDirectory {
        &self.directory
    }

    /// Reload the client cache
    pub async fn refresh(&self) -> Result<usize> {
        self.directory.refresh().await
    }

    /// Channels the rule table selects for this lead and client
    pub fn eligible_channels(&self, lead: &Lead, client: &Client) -> Vec<ChannelKind> {
        match self.rules.select(&lead.tag, client) {
            Some(selection) => selection.channels,
            None => {
                warn!(lead_id = %lead.id, tag = %lead.tag, "No routing rule matched");
                Vec::new()
            }
        }
    }

    /// One best-effort delivery pass for `lead`.
    ///
    /// Errors only when the store fails during client resolution; an unknown
    /// tag yields an unresolved outcome and the lead is left for later sweeps.
    pub async fn route(&self, lead: &Lead) -> Result<RoutingOutcome> {
        let Some(client) = self.directory.resolve(&lead.tag).await? else {
            warn!(lead_id = %lead.id, tag = %lead.tag, "No client for tag, lead kept undelivered");
            return Ok(RoutingOutcome::unresolved(&lead.id));
        };

        if lead.client_id.as_deref() != Some(client.id.as_str()) {
            if let Err(e) = self.store.update_client(&lead.id, &client.id).await {
                error!(lead_id = %lead.id, client_id = %client.id, error = %e, "Failed to record client assignment");
            }
        }

        let eligible = self.eligible_channels(lead, &client);
        let outcome = self.dispatch(lead, &client, &eligible).await;

        info!(
            lead_id = %lead.id,
            client = %client.name,
            attempted = outcome.attempted(),
            sent = outcome.is_sent(),
            "Lead routed"
        );
        Ok(outcome)
    }

    /// Invoke `kinds` concurrently, then record each outcome in turn.
    ///
    /// Every failed invocation stores an error status and counts one attempt.
    /// Registered channels not in `kinds` are reported as skipped.
    pub async fn dispatch(&self, lead: &Lead, client: &Client, kinds: &[ChannelKind]) -> RoutingOutcome {
        let invocations = kinds.iter().map(|&kind| async move {
            let result = match self.channels.get(&kind) {
                Some(channel) => channel.deliver(lead, client).await,
                None => Err(crate::channels::ChannelError::NotConfigured(format!(
                    "channel {} not available",
                    kind
                ))),
            };
            (kind, result)
        });
        let results = join_all(invocations).await;

        let mut per_channel: BTreeMap<ChannelKind, ChannelOutcome> = self
            .channels
            .keys()
            .map(|&kind| (kind, ChannelOutcome::Skipped))
            .collect();

        for (kind, result) in results {
            let column = kind.column();
            let outcome = match result {
                Ok(status) => {
                    if let Err(e) = self
                        .store
                        .update_channel_status(&lead.id, column, &status, now_utc_naive())
                        .await
                    {
                        error!(lead_id = %lead.id, channel = %kind, error = %e, "Failed to record delivery");
                    }
                    ChannelOutcome::Delivered(status)
                }
                Err(err) => {
                    let status = err.status_text();
                    warn!(lead_id = %lead.id, channel = %kind, status = %status, "Delivery failed");
                    if let Err(e) = self.store.record_failure(&lead.id, column, &status).await {
                        error!(lead_id = %lead.id, channel = %kind, error = %e, "Failed to record delivery failure");
                    }
                    ChannelOutcome::Error(status)
                }
            };
            per_channel.insert(kind, outcome);
        }

        RoutingOutcome {
            lead_id: lead.id.clone(),
            resolved: true,
            client_id: Some(client.id.clone()),
            per_channel,
        }
    }
}
