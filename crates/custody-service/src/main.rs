//! `custodyd`: runs the payment listener.
//!
//! Usage: `custodyd [config.json]`
//!
//! Payment notifications arrive as newline-delimited JSON on standard
//! input; the message-bus bridge that produces them runs outside this
//! process.
//!
//! The administrative surface is not served from here. A transport embeds
//! [`custody_service::AdminApi`] built from the same verifier and registry:
//! `POST /nodes` passes the raw request body to `create_node`, `GET /nodes`
//! calls `list_nodes`, `GET /template` calls `assigned_app_ids` and
//! `GET /_hc` calls `health`. Each handler returns a `ResponseView`; the
//! transport serializes it as the body and answers with its `status()`.

use std::{
    io::{BufRead, BufReader},
    process::ExitCode,
    sync::Arc,
    thread,
    time::Duration,
};

use custody_crypto::{CredentialSealer, PrivateKey};
use custody_registry::{ApplicationPool, CustodyRegistry, NodeStore};
use custody_service::{HttpPublisher, KernelRpc, NotificationListener, PaymentFlow};
use custody_types::{MembershipOracle, Notification, Result, ServiceConfig};
use custody_verifier::{CachedMembership, FallbackMembership, PayloadVerifier};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

const NOTIFICATION_BUFFER: usize = 64;

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn build_flow(config: &ServiceConfig) -> Result<PaymentFlow> {
    let store = NodeStore::open(
        &config.database.path,
        Duration::from_millis(config.database.busy_timeout_ms),
    )?;
    let pool = ApplicationPool::load(&config.apps_path)?;
    let sealer = CredentialSealer::new(PrivateKey::from_seed_hex(&config.service.private_key)?);
    tracing::info!(
        service_public_key = %sealer.public_key().to_hex(),
        pool_size = pool.len(),
        "credential sealer ready"
    );

    let rpc = Arc::new(KernelRpc::new(&config.rpc)?);
    let directory = Arc::new(FallbackMembership::new(
        rpc.clone(),
        config.fallback_nodes.clone(),
        config.environment,
    ));
    let oracle: Arc<dyn MembershipOracle> = Arc::new(CachedMembership::new(
        directory,
        Duration::from_millis(config.membership_cache_ttl_ms),
    ));
    let publisher = Arc::new(HttpPublisher::new(&config.publisher)?);

    let registry = CustodyRegistry::new(store, pool, sealer, publisher);
    Ok(PaymentFlow::new(
        config.fee.clone(),
        config.service.client_id.clone(),
        rpc,
        PayloadVerifier::new(oracle),
        registry,
    ))
}

/// Forwards NDJSON notifications from `input` on a dedicated OS thread,
/// so a pending read never holds up shutdown. `sender` is dropped at end of
/// input, which closes the listener.
fn spawn_line_reader<R>(input: R, sender: mpsc::Sender<Notification>) -> std::io::Result<()>
where
    R: BufRead + Send + 'static,
{
    thread::Builder::new()
        .name("custodyd-input".into())
        .spawn(move || {
            for line in input.lines() {
                let line = match line {
                    Ok(line) => line,
                    Err(e) => {
                        tracing::error!(error = %e, "input read failed");
                        break;
                    }
                };
                if line.trim().is_empty() {
                    continue;
                }
                match serde_json::from_str::<Notification>(&line) {
                    Ok(notification) => {
                        if sender.blocking_send(notification).is_err() {
                            break;
                        }
                    }
                    Err(e) => tracing::warn!(error = %e, "undecodable notification skipped"),
                }
            }
        })
        .map(drop)
}

#[tokio::main]
async fn main() -> ExitCode {
    let path = std::env::args().nth(1).unwrap_or_else(|| "config.json".into());
    let config = match ServiceConfig::load(&path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("custodyd: {e}");
            return ExitCode::FAILURE;
        }
    };
    init_tracing(config.log.json);
    tracing::info!(
        config = %path,
        environment = ?config.environment,
        version = custody_types::constants::VERSION,
        "custodyd starting"
    );

    let flow = match build_flow(&config) {
        Ok(flow) => flow,
        Err(e) => {
            tracing::error!(error = %e, "startup failed");
            return ExitCode::FAILURE;
        }
    };

    let (sender, receiver) = mpsc::channel(NOTIFICATION_BUFFER);
    if let Err(e) = spawn_line_reader(BufReader::new(std::io::stdin()), sender) {
        tracing::error!(error = %e, "input reader failed to start");
        return ExitCode::FAILURE;
    }
    let mut listener = tokio::spawn(NotificationListener::new(flow).run(receiver));

    let joined = tokio::select! {
        joined = &mut listener => joined,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutdown signal received");
            listener.abort();
            return ExitCode::SUCCESS;
        }
    };

    match joined {
        Ok(stats) => {
            tracing::info!(?stats, "input closed, custodyd stopped");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "listener task failed");
            ExitCode::FAILURE
        }
    }
}
