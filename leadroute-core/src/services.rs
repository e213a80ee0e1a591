//! Service graph assembly from configuration
//!
//! Both binaries build the same store → directory → router → intake/retry
//! graph; this module is the one place that wiring lives.

use crate::channels::{build_http_client, FixedCrmChannel, SheetChannel, WebhookChannel};
use crate::directory::ClientDirectory;
use crate::ingest::{LeadIntake, SourceProcessor};
use crate::retry::RetryService;
use crate::router::{DeliveryRouter, RuleTable};
use crate::sheets::SheetsClient;
use crate::source::SheetsSource;
use crate::store::{ClientStore, LeadStore, RawWebhookStore};
use leadroute_common::config::TomlConfig;
use leadroute_common::{Error, Result};
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Clone)]
pub struct Services {
    pub pool: SqlitePool,
    pub store: LeadStore,
    pub router: Arc<DeliveryRouter>,
    pub intake: LeadIntake,
    pub retry: Arc<RetryService>,
    pub raw_webhooks: RawWebhookStore,
    pub sheets: SheetsClient,
    pub http: reqwest::Client,
}

impl Services {
    /// Build every service and load the client directory
    pub async fn build(config: &TomlConfig, pool: SqlitePool) -> Result<Self> {
        let http = build_http_client(config.http_timeout())
            .map_err(|e| Error::Internal(format!("Failed to build HTTP client: {}", e)))?;
        let sheets = SheetsClient::new(
            http.clone(),
            config.sheets.api_base.clone(),
            config.sheets.access_token.clone(),
        );
        if !sheets.has_token() {
            warn!("No Sheets access token configured; spreadsheet delivery and source scans will fail");
        }

        let store = LeadStore::new(pool.clone());
        let directory = ClientDirectory::open(ClientStore::new(pool.clone())).await?;

        let fixed_crm_pattern = config.fixed_crm.as_ref().map(|c| c.tag_pattern.as_str());
        let rules = RuleTable::with_defaults(fixed_crm_pattern)
            .map_err(|e| Error::Config(format!("Invalid fixed_crm.tag_pattern: {}", e)))?;

        let mut router = DeliveryRouter::new(store.clone(), directory, rules)
            .with_channel(Arc::new(SheetChannel::new(sheets.clone())))
            .with_channel(Arc::new(WebhookChannel::new(http.clone(), config.http.source_marker.clone())));
        if let Some(fixed_crm) = &config.fixed_crm {
            router = router.with_channel(Arc::new(FixedCrmChannel::new(
                http.clone(),
                fixed_crm,
                config.http.source_marker.clone(),
            )));
            info!(pattern = %fixed_crm.tag_pattern, "Fixed CRM override enabled");
        }
        let router = Arc::new(router);

        Ok(Self {
            intake: LeadIntake::new(store.clone(), router.clone()),
            retry: Arc::new(RetryService::new(store.clone(), router.clone())),
            raw_webhooks: RawWebhookStore::new(pool.clone()),
            pool,
            store,
            router,
            sheets,
            http,
        })
    }

    /// Source scanner, if a source is configured
    pub fn source_processor(&self, config: &TomlConfig) -> Option<SourceProcessor> {
        let source = config.source.as_ref()?;
        let sheets_source = SheetsSource::new(self.sheets.clone(), &source.spreadsheet_id, &source.sheet_name);
        Some(SourceProcessor::new(
            Arc::new(sheets_source),
            self.intake.clone(),
            Duration::from_millis(config.daemon.row_pause_ms),
        ))
    }
}
