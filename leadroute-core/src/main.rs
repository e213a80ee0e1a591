//! leadroute - administrative CLI
//!
//! Database setup, client management, one-shot and periodic source scans,
//! delivery status reports and retries.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use chrono::{NaiveDate, NaiveDateTime};
use clap::{Args, Parser, Subcommand};
use leadroute_common::config::TomlConfig;
use leadroute_common::db::{init_database, ClientUpdate, NewClient, StatusColumn};
use leadroute_common::logging::init_tracing;
use leadroute_common::time::{format_lead_timestamp, parse_lead_timestamp};
use leadroute_core::channels::probe::{probe_sheet, probe_webhook};
use leadroute_core::daemon::Daemon;
use leadroute_core::directory::AddClientOutcome;
use leadroute_core::retry::RetryRequest;
use leadroute_core::store::LeadFilter;
use leadroute_core::Services;
use tokio::signal;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "leadroute")]
#[command(about = "Lead routing and delivery administration")]
#[command(version)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, global = true, env = "LEADROUTE_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create the database and tables
    InitDb,
    /// Register a new client
    AddClient(AddClientArgs),
    /// Change fields of an existing client
    UpdateClient(UpdateClientArgs),
    /// List registered clients
    ListClients,
    /// Scan the lead source once
    ProcessData {
        /// Also re-process rows already marked processed
        #[arg(long)]
        force: bool,
    },
    /// Scan the lead source periodically until interrupted
    RunDaemon {
        /// Minutes between scans (overrides the configured interval)
        #[arg(long)]
        interval: Option<u64>,
    },
    /// Delivery status counts per channel
    DeliveryStatus {
        #[arg(long)]
        tag: Option<String>,
        /// Only leads created at or after this time (YYYY-MM-DD [HH:MM:SS])
        #[arg(long)]
        since: Option<String>,
        /// Print every matching lead
        #[arg(long)]
        full: bool,
    },
    /// Re-attempt failed or pending deliveries
    RetryDelivery {
        #[arg(long)]
        tag: Option<String>,
        #[arg(long)]
        max_attempts: Option<i64>,
        /// Channel column to retry (sheet, crm); defaults to both
        #[arg(long)]
        target: Vec<StatusColumn>,
        /// List candidates without delivering
        #[arg(long)]
        dry_run: bool,
    },
}

#[derive(Args, Debug)]
struct AddClientArgs {
    #[arg(long)]
    name: String,
    #[arg(long)]
    tag: String,
    #[arg(long)]
    spreadsheet_id: Option<String>,
    #[arg(long)]
    sheet_name: Option<String>,
    #[arg(long)]
    use_crm: bool,
    #[arg(long)]
    webhook_url: Option<String>,
    /// Register without probing the destinations
    #[arg(long)]
    skip_verify: bool,
}

#[derive(Args, Debug)]
struct UpdateClientArgs {
    /// Client id
    id: String,
    #[arg(long)]
    name: Option<String>,
    #[arg(long)]
    tag: Option<String>,
    #[arg(long)]
    spreadsheet_id: Option<String>,
    #[arg(long)]
    sheet_name: Option<String>,
    #[arg(long)]
    use_crm: Option<bool>,
    #[arg(long)]
    webhook_url: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = TomlConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;
    init_tracing(&config.logging).context("Failed to initialize logging")?;

    let pool = init_database(&config.database_path)
        .await
        .with_context(|| format!("Failed to open database at {}", config.database_path.display()))?;

    if matches!(cli.command, Command::InitDb) {
        println!("Database ready at {}", config.database_path.display());
        return Ok(());
    }

    let services = Services::build(&config, pool)
        .await
        .context("Failed to initialize services")?;

    match cli.command {
        Command::InitDb => {}
        Command::AddClient(args) => add_client(&services, &config, args).await?,
        Command::UpdateClient(args) => update_client(&services, args).await?,
        Command::ListClients => list_clients(&services).await?,
        Command::ProcessData { force } => {
            let processor = services
                .source_processor(&config)
                .ok_or_else(|| anyhow!("No [source] configured"))?;
            match processor.process(force).await {
                Ok(summary) => println!(
                    "Rows: {}  inserted: {}  duplicates: {}  invalid: {}  sent: {}  undelivered: {}  unresolved: {}  errors: {}",
                    summary.rows,
                    summary.inserted,
                    summary.duplicates,
                    summary.invalid,
                    summary.sent,
                    summary.undelivered,
                    summary.unresolved,
                    summary.store_errors + summary.mark_failures,
                ),
                Err(e) => {
                    warn!(error = %e, "Source scan failed");
                    println!("Source scan failed: {}", e);
                }
            }
        }
        Command::RunDaemon { interval } => {
            let mut daemon = Daemon::new(services.source_processor(&config), services.retry.clone(), &config.daemon);
            if let Some(minutes) = interval {
                daemon = daemon.with_interval(Duration::from_secs(minutes.max(1) * 60));
            }
            let ticks = daemon.run_until(shutdown_signal()).await;
            info!(ticks, "Daemon stopped");
        }
        Command::DeliveryStatus { tag, since, full } => {
            let since = since.as_deref().map(parse_since).transpose()?;
            let report = services
                .retry
                .status_report(&LeadFilter { tag, since }, full)
                .await
                .context("Failed to query delivery status")?;

            println!("Leads: {}", report.total);
            for (column, counts) in &report.per_column {
                println!(
                    "  {:<6} delivered: {}  error: {}  pending: {}",
                    column, counts.delivered, counts.error, counts.pending
                );
            }
            for line in report.leads.iter().flatten() {
                println!(
                    "{}  {}  {}  client={}  sheet={} @ {}  crm={} @ {}  attempts={}",
                    line.id,
                    line.created_at,
                    line.tag,
                    line.client_id.as_deref().unwrap_or("-"),
                    line.sheet_status.as_deref().unwrap_or("-"),
                    line.sheet_time.as_deref().unwrap_or("-"),
                    line.crm_status.as_deref().unwrap_or("-"),
                    line.crm_time.as_deref().unwrap_or("-"),
                    line.delivery_attempts,
                );
            }
        }
        Command::RetryDelivery {
            tag,
            max_attempts,
            target,
            dry_run,
        } => {
            let request = RetryRequest {
                tag,
                max_attempts: max_attempts.unwrap_or(config.daemon.max_attempts),
                targets: if target.is_empty() { StatusColumn::ALL.to_vec() } else { target },
                dry_run,
            };
            let summary = services.retry.retry(&request).await.context("Retry failed")?;

            if dry_run {
                println!("Candidates: {}", summary.candidates);
                for id in &summary.candidate_ids {
                    println!("  {}", id);
                }
            } else {
                println!(
                    "Candidates: {}  attempted: {}  succeeded: {}  failed: {}  unresolved: {}  settled: {}",
                    summary.candidates,
                    summary.attempted,
                    summary.succeeded,
                    summary.failed,
                    summary.unresolved,
                    summary.settled,
                );
            }
        }
    }

    Ok(())
}

async fn add_client(services: &Services, config: &TomlConfig, args: AddClientArgs) -> Result<()> {
    let client = NewClient {
        name: args.name,
        tag: args.tag,
        spreadsheet_id: args.spreadsheet_id,
        sheet_name: args.sheet_name,
        use_crm: args.use_crm,
        webhook_url: args.webhook_url,
    };

    if args.skip_verify {
        warn!(tag = %client.tag, "Skipping destination verification");
    } else {
        verify_destinations(services, config, &client).await?;
    }

    match services.router.directory().add(client).await.context("Failed to add client")? {
        AddClientOutcome::Added(id) => {
            println!("Client added: {}", id);
            Ok(())
        }
        AddClientOutcome::DuplicateTag => bail!("A client with this tag already exists"),
    }
}

async fn verify_destinations(services: &Services, config: &TomlConfig, client: &NewClient) -> Result<()> {
    if let (Some(spreadsheet_id), Some(sheet_name)) = (&client.spreadsheet_id, &client.sheet_name) {
        probe_sheet(&services.sheets, spreadsheet_id, sheet_name)
            .await
            .map_err(|e| anyhow!("Spreadsheet check failed: {}", e))?;
    }

    if client.use_crm {
        let url = client
            .webhook_url
            .as_deref()
            .filter(|u| !u.trim().is_empty())
            .ok_or_else(|| anyhow!("--use-crm requires --webhook-url"))?;
        probe_webhook(&services.http, url, Duration::from_secs(config.http.probe_timeout_secs))
            .await
            .map_err(|e| anyhow!("Webhook check failed: {}", e))?;
    }

    Ok(())
}

async fn update_client(services: &Services, args: UpdateClientArgs) -> Result<()> {
    let update = ClientUpdate {
        name: args.name,
        tag: args.tag,
        spreadsheet_id: args.spreadsheet_id,
        sheet_name: args.sheet_name,
        use_crm: args.use_crm,
        webhook_url: args.webhook_url,
    };

    if services
        .router
        .directory()
        .update(&args.id, update)
        .await
        .context("Failed to update client")?
    {
        println!("Client updated: {}", args.id);
    } else {
        println!("Client not updated (unknown id, nothing to change, or tag in use)");
    }
    Ok(())
}

async fn list_clients(services: &Services) -> Result<()> {
    let clients = services.router.directory().list().await.context("Failed to list clients")?;
    println!("Clients: {}", clients.len());
    for client in clients {
        println!(
            "{}  {}  tag={}  sheet={}  crm={}  created={}",
            client.id,
            client.name,
            client.tag,
            client
                .sheet_destination()
                .map(|(id, name)| format!("{}/{}", id, name))
                .unwrap_or_else(|| "-".to_string()),
            client.crm_webhook().unwrap_or("-"),
            format_lead_timestamp(&client.created_at),
        );
    }
    Ok(())
}

fn parse_since(value: &str) -> Result<NaiveDateTime> {
    if let Some(ts) = parse_lead_timestamp(value) {
        return Ok(ts);
    }
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .ok_or_else(|| anyhow!("Invalid --since value '{}': expected YYYY-MM-DD [HH:MM:SS]", value))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received terminate signal, shutting down"),
    }
}
