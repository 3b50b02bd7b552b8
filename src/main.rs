//! Daemon entry point: authenticate against the authority, then probe the
//! remote API through the policy-governed dispatcher.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use backstop::auth::{ClientCredentialsProvider, TokenProvider};
use backstop::client::RestClient;
use backstop::config::AppConfig;
use backstop::{ApiRequest, Dispatcher, PolicyRegistry, TracingObserver};

#[derive(Debug, Parser)]
#[command(name = "backstop", about = "Resilient client daemon for a remote data API")]
struct Cli {
    /// Path to the JSON settings file.
    #[arg(long, default_value = "appsettings.json")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let config = AppConfig::from_file(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;

    let auth_http = reqwest::Client::builder()
        .timeout(config.api.request_timeout())
        .build()
        .context("building token client")?;
    let tokens = Arc::new(ClientCredentialsProvider::new(
        auth_http,
        config.auth.token_url.clone(),
        config.auth.client_id.clone(),
        config.auth.client_secret.clone(),
        config.auth.scope.clone(),
    ));

    // Acquire once up front so credential problems fail the process before
    // any API traffic, the same way the original daemon reported "token
    // acquired" before its first call.
    tokens.bearer_token().await.context("acquiring bearer token")?;
    info!("token acquired");

    let transport = Arc::new(RestClient::new(
        &config.api.base_url,
        tokens,
        config.api.default_headers()?,
        config.api.request_timeout(),
    )?);

    let registry =
        Arc::new(PolicyRegistry::with_standard_policies(config.retry.retrying_policy()?));
    let cancel = CancellationToken::new();
    let dispatcher = Dispatcher::new(registry, transport)?
        .with_observer(Arc::new(TracingObserver::new("api-dispatch")))
        .with_cancellation(cancel.clone());

    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("shutdown signal received; cancelling in-flight waits");
                cancel.cancel();
            }
        }
    });

    let probe = ApiRequest::get(&config.api.probe_path);
    match dispatcher.dispatch(probe).await {
        Ok(response) => {
            info!(
                status = %response.status(),
                bytes = response.text().len(),
                path = %config.api.probe_path,
                "probe succeeded"
            );
            Ok(())
        }
        Err(err) => {
            error!(%err, path = %config.api.probe_path, "probe failed");
            Err(err.into())
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,backstop=debug"));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}
