use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use pulse_core::{Requester, RunOutcome, Trigger};
use pulse_engine::{build_scheduler, Engine, EngineConfig};
use pulse_store::PgRecordStore;
use pulse_web::AppState;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "pulse-cli")]
#[command(about = "Website Pulse command-line interface")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run one sweep over every registered site.
    Sweep,
    /// Run an on-demand check for one registered url.
    Check {
        url: String,
        #[arg(long, default_value = "operator")]
        user: String,
    },
    /// Serve the JSON API, plus cron sweeps when enabled.
    Serve,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = EngineConfig::from_env()?;

    match cli.command.unwrap_or(Commands::Sweep) {
        Commands::Sweep => {
            let engine = Engine::connect(&config).await?;
            match engine.run(Trigger::Scheduled).await? {
                RunOutcome::SweepComplete {
                    checked,
                    alerted,
                    failed,
                } => {
                    println!("sweep complete: checked={checked} alerted={alerted} failed={failed}");
                }
                other => println!("unexpected outcome: {other:?}"),
            }
        }
        Commands::Check { url, user } => {
            let engine = Engine::connect(&config).await?;
            let requester = Requester {
                user_id: user,
                email: None,
            };
            match engine.run(Trigger::OnDemand { url, requester }).await? {
                RunOutcome::CheckComplete {
                    url,
                    status,
                    sentiment_score,
                } => {
                    println!(
                        "check complete: url={url} status={} sentiment={sentiment_score}",
                        status.as_str()
                    );
                }
                RunOutcome::RecordNotFound { url } => {
                    println!("check failed: {url} is not registered");
                }
                other => println!("unexpected outcome: {other:?}"),
            }
        }
        Commands::Serve => {
            let store = Arc::new(PgRecordStore::connect(&config.database_url).await?);
            let engine = Arc::new(Engine::with_store(store.clone(), &config)?);

            if let Some(mut sched) = build_scheduler(engine.clone(), &config).await? {
                sched.start().await?;
            }

            let addr = std::env::var("PULSE_WEB_ADDR").unwrap_or_else(|_| "0.0.0.0:8000".to_string());
            pulse_web::serve(&addr, AppState::new(store, engine)).await?;
        }
    }

    Ok(())
}
