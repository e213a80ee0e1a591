//! Shared fixtures for leadroute-core integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::header::AUTHORIZATION;
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::routing::post;
use axum::{Json, Router};
use chrono::NaiveDateTime;
use leadroute_common::db::{init_database, Client, Lead, LeadDraft, NewClient};
use leadroute_core::channels::{ChannelError, ChannelKind, DeliveryChannel};
use leadroute_core::directory::{AddClientOutcome, ClientDirectory};
use leadroute_core::router::{DeliveryRouter, RuleTable};
use leadroute_core::source::{select_rows, SourceError, SourceRow, TabularSource};
use leadroute_core::store::{ClientStore, LeadStore};
use serde_json::{json, Value};
use sqlx::SqlitePool;
use std::sync::atomic::{AtomicBool, AtomicU16, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

pub const PHONE: &str = "79001234567";

/// Fresh database in a temp dir; keep the `TempDir` alive for the test
pub async fn test_db() -> (TempDir, SqlitePool) {
    let dir = TempDir::new().unwrap();
    let pool = init_database(&dir.path().join("leads.db")).await.unwrap();
    (dir, pool)
}

pub fn draft(id: &str, tag: &str) -> LeadDraft {
    LeadDraft {
        id: id.to_string(),
        created_at: NaiveDateTime::parse_from_str("2024-01-01 10:00:00", "%Y-%m-%d %H:%M:%S").unwrap(),
        phone: PHONE.to_string(),
        tag: tag.to_string(),
        original_tag: tag.to_string(),
    }
}

pub async fn stored_lead(store: &LeadStore, id: &str, tag: &str) -> Lead {
    store.insert(&draft(id, tag)).await.unwrap();
    store.get(id).await.unwrap().unwrap()
}

pub fn crm_client(tag: &str, webhook_url: &str) -> NewClient {
    NewClient {
        name: format!("{} client", tag),
        tag: tag.to_string(),
        use_crm: true,
        webhook_url: Some(webhook_url.to_string()),
        ..Default::default()
    }
}

pub fn sheet_and_crm_client(tag: &str) -> NewClient {
    NewClient {
        name: format!("{} client", tag),
        tag: tag.to_string(),
        spreadsheet_id: Some("sheet-1".to_string()),
        sheet_name: Some("Leads".to_string()),
        use_crm: true,
        webhook_url: Some("http://127.0.0.1:9/hook".to_string()),
    }
}

pub async fn add_client(directory: &ClientDirectory, client: NewClient) -> String {
    match directory.add(client).await.unwrap() {
        AddClientOutcome::Added(id) => id,
        AddClientOutcome::DuplicateTag => panic!("duplicate tag in fixture"),
    }
}

/// Router over `pool` with the given channels registered
pub async fn build_router(
    pool: &SqlitePool,
    channels: Vec<Arc<dyn DeliveryChannel>>,
    fixed_crm_pattern: Option<&str>,
) -> Arc<DeliveryRouter> {
    let directory = ClientDirectory::open(ClientStore::new(pool.clone())).await.unwrap();
    let rules = RuleTable::with_defaults(fixed_crm_pattern).unwrap();
    let mut router = DeliveryRouter::new(LeadStore::new(pool.clone()), directory, rules);
    for channel in channels {
        router = router.with_channel(channel);
    }
    Arc::new(router)
}

pub fn as_channel(channel: &Arc<MockChannel>) -> Arc<dyn DeliveryChannel> {
    channel.clone()
}

/// Channel answering from a switch instead of the network
pub struct MockChannel {
    kind: ChannelKind,
    failing: AtomicBool,
    calls: AtomicUsize,
}

impl MockChannel {
    pub fn ok(kind: ChannelKind) -> Arc<Self> {
        Arc::new(Self {
            kind,
            failing: AtomicBool::new(false),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn failing(kind: ChannelKind) -> Arc<Self> {
        let channel = Self::ok(kind);
        channel.set_failing(true);
        channel
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DeliveryChannel for MockChannel {
    fn kind(&self) -> ChannelKind {
        self.kind
    }

    async fn deliver(&self, _lead: &Lead, _client: &Client) -> Result<String, ChannelError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            Err(ChannelError::Network("connection refused".to_string()))
        } else {
            Ok("delivered".to_string())
        }
    }
}

/// In-memory spreadsheet standing in for the tabular source
pub struct MockSource {
    values: Mutex<Vec<Vec<String>>>,
    marked: Mutex<Vec<usize>>,
}

impl MockSource {
    pub fn new(rows: Vec<Vec<String>>) -> Arc<Self> {
        Arc::new(Self {
            values: Mutex::new(rows),
            marked: Mutex::new(Vec::new()),
        })
    }

    pub fn marked(&self) -> Vec<usize> {
        self.marked.lock().unwrap().clone()
    }
}

/// Source row in sheet column order: created_at, id, phone, -, tag
pub fn source_row(created_at: &str, id: &str, phone: &str, tag: &str) -> Vec<String> {
    [created_at, id, phone, "", tag].iter().map(|c| c.to_string()).collect()
}

#[async_trait]
impl TabularSource for MockSource {
    async fn fetch_unprocessed_rows(&self, force: bool) -> Result<Vec<SourceRow>, SourceError> {
        let values = self.values.lock().unwrap().clone();
        Ok(select_rows(values, force))
    }

    async fn mark_processed(&self, row_number: usize) -> Result<(), SourceError> {
        let mut values = self.values.lock().unwrap();
        let row = &mut values[row_number - 2];
        if row.len() < 9 {
            row.resize(9, String::new());
        }
        row[8] = "✅".to_string();
        self.marked.lock().unwrap().push(row_number);
        Ok(())
    }
}

/// Local HTTP server playing the client CRM webhook and the fixed CRM
#[derive(Clone)]
pub struct MockCrm {
    pub base_url: String,
    requests: Arc<Mutex<Vec<(String, Value)>>>,
    hook_status: Arc<AtomicU16>,
}

impl MockCrm {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub fn set_hook_status(&self, status: u16) {
        self.hook_status.store(status, Ordering::SeqCst);
    }

    pub fn requests(&self) -> Vec<(String, Value)> {
        self.requests.lock().unwrap().clone()
    }

    fn record(&self, path: &str, body: Value) {
        self.requests.lock().unwrap().push((path.to_string(), body));
    }
}

pub async fn spawn_mock_crm(hook_status: u16) -> MockCrm {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let crm = MockCrm {
        base_url: format!("http://{}", addr),
        requests: Arc::new(Mutex::new(Vec::new())),
        hook_status: Arc::new(AtomicU16::new(hook_status)),
    };

    let app = Router::new()
        .route("/hook", post(hook))
        .route("/contact", post(contact))
        .route("/deal", post(deal))
        .route("/broken", post(broken))
        .with_state(crm.clone());

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    crm
}

async fn hook(State(crm): State<MockCrm>, Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    crm.record("/hook", body);
    let status = StatusCode::from_u16(crm.hook_status.load(Ordering::SeqCst)).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(json!({ "ok": status.is_success() })))
}

async fn contact(State(crm): State<MockCrm>, Json(body): Json<Value>) -> Json<Value> {
    crm.record("/contact", body);
    Json(json!({ "result": 101 }))
}

async fn deal(State(crm): State<MockCrm>, Json(body): Json<Value>) -> Json<Value> {
    crm.record("/deal", body);
    Json(json!({ "result": "202" }))
}

async fn broken(State(crm): State<MockCrm>, Json(body): Json<Value>) -> Json<Value> {
    crm.record("/broken", body);
    Json(json!({ "error": "ACCESS_DENIED" }))
}

/// One request seen by the Sheets stand-in
#[derive(Debug, Clone)]
pub struct SheetsRequest {
    pub method: String,
    pub path: String,
    pub query: String,
    pub authorization: String,
    pub body: Value,
}

/// Google Sheets v4 stand-in serving spreadsheet `sheet-1` with one tab `Leads`
#[derive(Clone)]
pub struct MockSheets {
    pub base_url: String,
    requests: Arc<Mutex<Vec<SheetsRequest>>>,
    values: Arc<Mutex<Vec<Vec<Value>>>>,
}

impl MockSheets {
    pub fn set_values(&self, values: Vec<Vec<Value>>) {
        *self.values.lock().unwrap() = values;
    }

    pub fn requests(&self) -> Vec<SheetsRequest> {
        self.requests.lock().unwrap().clone()
    }
}

pub const SPREADSHEET_ID: &str = "sheet-1";
pub const SHEET_NAME: &str = "Leads";

pub async fn spawn_mock_sheets() -> MockSheets {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let sheets = MockSheets {
        base_url: format!("http://{}/v4", addr),
        requests: Arc::new(Mutex::new(Vec::new())),
        values: Arc::new(Mutex::new(Vec::new())),
    };

    let app = Router::new().fallback(sheets_api).with_state(sheets.clone());
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    sheets
}

async fn sheets_api(
    State(sheets): State<MockSheets>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> (StatusCode, Json<Value>) {
    let path = uri.path().to_string();
    sheets.requests.lock().unwrap().push(SheetsRequest {
        method: method.to_string(),
        path: path.clone(),
        query: uri.query().unwrap_or_default().to_string(),
        authorization: headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string(),
        body: serde_json::from_slice(&body).unwrap_or(Value::Null),
    });

    let spreadsheet = format!("/v4/spreadsheets/{}", SPREADSHEET_ID);
    let Some(rest) = path.strip_prefix(&spreadsheet) else {
        return (StatusCode::NOT_FOUND, Json(json!({ "error": { "code": 404 } })));
    };

    match (method, rest) {
        (Method::GET, "") => (
            StatusCode::OK,
            Json(json!({ "sheets": [{ "properties": { "title": SHEET_NAME } }] })),
        ),
        (Method::GET, _) => {
            let values = sheets.values.lock().unwrap().clone();
            (StatusCode::OK, Json(json!({ "range": rest, "values": values })))
        }
        (Method::PUT, _) | (Method::POST, _) => (StatusCode::OK, Json(json!({}))),
        _ => (StatusCode::METHOD_NOT_ALLOWED, Json(json!({}))),
    }
}
