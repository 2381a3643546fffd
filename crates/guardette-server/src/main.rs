//! Guardette Server - Entry point

use std::sync::Arc;

use anyhow::Context;
use guardette_config::{keys, ConfigLoader};
use guardette_core::Gateway;
use guardette_server::{cli, spawn_policy_watcher, Args, Command, GatewayServer};
use guardette_telemetry::{init_logging, init_metrics, LogConfig};
use tracing::{error, info, warn};

#[tokio::main]
async fn main() {
    let args = match Command::from_env() {
        Ok(Command::Run(args)) => args,
        Ok(Command::Help) => {
            print!("{}", cli::HELP);
            return;
        }
        Ok(Command::Version) => {
            println!("guardette-server {}", guardette_server::VERSION);
            return;
        }
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = run(args).await {
        error!(error = %format!("{e:#}"), "guardette failed to start");
        eprintln!("guardette-server: {e:#}");
        std::process::exit(1);
    }
}

async fn run(args: Args) -> anyhow::Result<()> {
    let mut loader = match &args.env_file {
        Some(path) => ConfigLoader::new().with_dotenv(path)?,
        None => ConfigLoader::new().with_optional_dotenv(".env")?,
    };
    if let Some(policy) = &args.policy {
        loader = loader.with_override(keys::POLICY_PATH, policy.display().to_string());
    }
    if args.watch {
        loader = loader.with_override(keys::WATCH_POLICY, "true");
    }
    let config = Arc::new(loader.load().context("invalid configuration")?);

    init_logging(&LogConfig::new(config.log_level.clone(), config.log_json))?;
    if let Err(e) = init_metrics() {
        warn!(error = %e, "metrics disabled");
    }

    info!(
        version = guardette_server::VERSION,
        policy = %config.policy_path.display(),
        secret_manager = config.secret_manager.as_str(),
        "starting guardette"
    );

    let gateway = Gateway::builder(Arc::clone(&config))
        .policy_file(config.policy_path.clone())
        .build()
        .await
        .context("failed to load policy")?;
    let gateway = Arc::new(gateway);

    let _watcher = if config.watch_policy {
        Some(spawn_policy_watcher(Arc::clone(&gateway), config.policy_path.clone())?)
    } else {
        None
    };

    GatewayServer::new(gateway)
        .run(config.listen_addr, async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;
    Ok(())
}
