mod args;
mod config;
mod dirs;

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use app_api::{AggregateRequest, AppContext};
use http_api::{HttpState, generate_admin_token};
use metering_app::{AppState, JobRequest, run_with_retry};

use crate::args::{Cli, Command};
use crate::config::ConfigLoad;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "llm_metering=info,metering_app=info,metering_db=info,tower_http=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let default_dir = dirs::default_data_dir()?;
    let config_file = cli
        .config
        .clone()
        .unwrap_or_else(|| config::default_config_file(&default_dir));
    let load = config::load_or_create(&config_file, generate_admin_token)?;
    if load.created {
        info!(file = %load.file.display(), "created default config");
    }
    let data_dir = load.config.data_dir.clone().unwrap_or(default_dir);

    let app_state = AppState::new(load.config.app_config(&data_dir)?);
    app_state
        .initialize()
        .context("failed to initialize database")?;
    let context = AppContext {
        app_state,
        app_data_dir: data_dir,
    };

    match cli.command.unwrap_or(Command::Serve { port: None }) {
        Command::Serve { port } => serve(context, load, port).await,
        Command::Aggregate {
            granularity,
            start,
            end,
        } => {
            let request = AggregateRequest {
                granularity,
                start,
                end,
            };
            let outcome =
                tokio::task::spawn_blocking(move || app_api::aggregate_usage(&context, request))
                    .await??;
            println!("{}", serde_json::to_string_pretty(&outcome)?);
            Ok(())
        }
    }
}

async fn serve(context: AppContext, load: ConfigLoad, port: Option<u16>) -> Result<()> {
    let ConfigLoad { config, file, .. } = load;
    let token = match config.admin_token.filter(|token| !token.trim().is_empty()) {
        Some(token) => token,
        None => {
            let token = generate_admin_token();
            warn!(file = %file.display(), "no admin_token configured; using a token for this run only");
            println!("Admin token for this run: {token}");
            token
        }
    };

    if config.aggregation_interval_secs > 0 {
        spawn_aggregation_loop(
            context.app_state.clone(),
            Duration::from_secs(config.aggregation_interval_secs),
        );
    } else {
        info!("scheduled aggregation disabled");
    }

    let state = HttpState::with_admin_token(context, token);
    let router = http_api::router(state);

    let addr = SocketAddr::from(([127, 0, 0, 1], port.unwrap_or(config.port)));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("bind {addr}"))?;
    info!(addr = %listener.local_addr()?, "metering api listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

fn spawn_aggregation_loop(state: AppState, every: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let services = state.services.clone();
            let policy = state.config.retry;
            let result = tokio::task::spawn_blocking(move || {
                run_with_retry(&policy, std::thread::sleep, |_| {
                    services.aggregation.run(&JobRequest::all())
                })
            })
            .await;
            match result {
                Ok(Ok(outcome)) => {
                    info!(upserted = outcome.upserted, "scheduled aggregation finished")
                }
                Ok(Err(err)) => error!(error = %err, "scheduled aggregation gave up"),
                Err(err) => error!(error = %err, "scheduled aggregation task failed"),
            }
        }
    });
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
