//! `lmdctl` — operator CLI for the listing-monitor admin REST surface.
//!
//! This binary talks to a running `lmd-daemon` over HTTP; it holds no store
//! or scheduler state of its own. Point it at a daemon with `--server` or
//! `LMD_SERVER_URL` (default `http://127.0.0.1:8080`).

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::ApiClient;

#[derive(Parser)]
#[command(name = "lmdctl")]
#[command(about = "Listing-monitor admin CLI", long_about = None)]
struct Cli {
    /// Base URL of the lmd-daemon admin surface.
    #[arg(long, env = "LMD_SERVER_URL", default_value = "http://127.0.0.1:8080", global = true)]
    server: String,

    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Daemon health check.
    Health,

    /// Fleet-wide status (target/subscriber counts, uptime).
    Status,

    /// Force an out-of-schedule reconciliation sweep.
    Reconcile,

    /// Polling target commands.
    Target {
        #[command(subcommand)]
        cmd: TargetCmd,
    },

    /// Change-event subscriber commands.
    Subscriber {
        #[command(subcommand)]
        cmd: SubscriberCmd,
    },

    /// Outbox event query commands.
    Events {
        #[command(subcommand)]
        cmd: EventsCmd,
    },
}

#[derive(Subcommand)]
enum EventsCmd {
    /// Page through the outbox, newest first.
    List {
        /// PENDING | IN_FLIGHT | PROCESSED | FAILED
        #[arg(long)]
        status: Option<String>,
        #[arg(long, default_value_t = 50)]
        limit: i64,
        #[arg(long, default_value_t = 0)]
        offset: i64,
    },
}

#[derive(Subcommand)]
enum TargetCmd {
    /// List all targets.
    List,
    /// Fetch one target by id.
    Get {
        id: String,
    },
    /// Register a new target.
    Create {
        /// Unique target id.
        #[arg(long)]
        id: String,
        /// Listing source URL.
        #[arg(long)]
        url: String,
        /// Fields to diff (repeatable).
        #[arg(long = "field", required = true)]
        tracked_fields: Vec<String>,
        /// Seconds a listing may go unseen before being marked REMOVED.
        #[arg(long)]
        grace_period_secs: Option<u64>,
        /// Register the target disabled (no polling until enabled).
        #[arg(long)]
        disabled: bool,
    },
    /// Replace a target wholesale from a JSON file.
    Update {
        id: String,
        /// Path to a JSON file containing the full target document.
        #[arg(long)]
        file: String,
    },
    /// Delete a target.
    Delete {
        id: String,
    },
    /// Force an immediate poll of one target, bypassing its schedule.
    Poll {
        id: String,
    },
}

#[derive(Subcommand)]
enum SubscriberCmd {
    /// List all subscribers.
    List,
    /// Register a new subscriber.
    Create {
        #[arg(long)]
        id: String,
        /// webhook | websocket | email
        #[arg(long = "type")]
        kind: String,
        #[arg(long)]
        endpoint: String,
        #[arg(long, default_value_t = 5000)]
        timeout_ms: u64,
        /// Name of the env var holding the HMAC signing secret.
        #[arg(long)]
        webhook_secret_env: Option<String>,
        /// Register the subscriber disabled.
        #[arg(long)]
        disabled: bool,
    },
    /// Replace a subscriber wholesale from a JSON file.
    Update {
        id: String,
        #[arg(long)]
        file: String,
    },
    /// Delete a subscriber.
    Delete {
        id: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .init();

    let cli = Cli::parse();
    let client = ApiClient::new(cli.server);

    match cli.cmd {
        Commands::Health => commands::status::health(&client).await,
        Commands::Status => commands::status::status(&client).await,
        Commands::Reconcile => commands::status::reconcile(&client).await,

        Commands::Target { cmd } => match cmd {
            TargetCmd::List => commands::targets::list(&client).await,
            TargetCmd::Get { id } => commands::targets::get(&client, &id).await,
            TargetCmd::Create { id, url, tracked_fields, grace_period_secs, disabled } => {
                commands::targets::create(&client, id, url, tracked_fields, grace_period_secs, disabled).await
            }
            TargetCmd::Update { id, file } => commands::targets::update(&client, &id, &file).await,
            TargetCmd::Delete { id } => commands::targets::delete(&client, &id).await,
            TargetCmd::Poll { id } => commands::targets::poll(&client, &id).await,
        },

        Commands::Subscriber { cmd } => match cmd {
            SubscriberCmd::List => commands::subscribers::list(&client).await,
            SubscriberCmd::Create { id, kind, endpoint, timeout_ms, webhook_secret_env, disabled } => {
                commands::subscribers::create(&client, id, kind, endpoint, timeout_ms, webhook_secret_env, disabled).await
            }
            SubscriberCmd::Update { id, file } => commands::subscribers::update(&client, &id, &file).await,
            SubscriberCmd::Delete { id } => commands::subscribers::delete(&client, &id).await,
        },

        Commands::Events { cmd } => match cmd {
            EventsCmd::List { status, limit, offset } => commands::events::list(&client, status, limit, offset).await,
        },
    }
}
