use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod chart;
mod config;
mod db;
mod decide;
mod dispatch;
mod error;
mod mailer;
mod models;
mod run;
mod server;
mod signal;
mod trends;

use config::Config;
use db::PgStore;
use mailer::{Mailer, ResendMailer};
use run::RunDeps;
use trends::SerpApiTrends;

#[derive(Parser)]
#[command(name = "trendily-alerts")]
#[command(about = "Search-trend alert engine for Trendily", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the HTTP trigger interface
    Serve {
        #[arg(long, default_value = "0.0.0.0")]
        host: String,
        #[arg(long, default_value_t = 8080)]
        port: u16,
    },
    /// Evaluate every subscription once and dispatch qualifying alerts
    Run {
        /// Bypass threshold and cooldown gating
        #[arg(long, default_value_t = false)]
        forced: bool,
    },
    /// Create or upgrade the database schema
    InitDb,
    /// Load sample subscriptions
    Seed,
    /// Import subscriptions from a CSV file (email,query,threshold)
    Import {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Send one delivery-test email
    EmailTest {
        #[arg(long)]
        to: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "trendily_alerts=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = Config::from_env();
    let database_url = std::env::var("DATABASE_URL")
        .context("DATABASE_URL must be set to a Postgres instance")?;

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .context("failed to connect to Postgres")?;

    match cli.command {
        Commands::Serve { host, port } => {
            let state = Arc::new(server::AppState {
                deps: build_deps(config, pool)?,
            });
            server::serve(state, &host, port).await?;
        }
        Commands::Run { forced } => {
            config.mailer_key()?;
            let deps = build_deps(config, pool)?;
            let report = run::execute(&deps, forced).await?;

            println!(
                "Alert sweep finished: {} sent across {} attempts.",
                report.sent, report.attempts
            );
            for outcome in &report.outcomes {
                let annotation = match (&outcome.reason, &outcome.error) {
                    (Some(reason), _) => format!(" ({reason})"),
                    (None, Some(detail)) => format!(" ({}: {})", detail.kind, detail.message),
                    (None, None) => String::new(),
                };
                println!(
                    "- \"{}\" to {}: {}{}",
                    outcome.keyword, outcome.email, outcome.status, annotation
                );
            }
        }
        Commands::InitDb => {
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            db::seed(&pool).await?;
            println!("Seed subscriptions inserted.");
        }
        Commands::Import { csv } => {
            let upserted = db::import_csv(&pool, &csv).await?;
            println!("Upserted {upserted} subscriptions from {}.", csv.display());
        }
        Commands::EmailTest { to } => {
            let key = config.mailer_key()?.to_string();
            let sender = ResendMailer::new(key)?;
            sender.send(&mailer::delivery_test_message(&to)).await?;
            println!("Test email queued for {to}.");
        }
    }

    Ok(())
}

fn build_deps(config: Config, pool: PgPool) -> anyhow::Result<RunDeps> {
    let trends = SerpApiTrends::new(config.serpapi_key.clone().unwrap_or_default())?;
    let mailer = ResendMailer::new(config.resend_api_key.clone().unwrap_or_default())?;
    Ok(RunDeps {
        store: Arc::new(PgStore::new(pool)),
        trends: Arc::new(trends),
        mailer: Arc::new(mailer),
        config,
    })
}

