use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::writer::MakeWriterExt;

use call_notify::config::AppConfig;
use call_notify::llm::{LazyProvider, LlmProvider};
use call_notify::notify::{MailTransport, Notifier, SmtpMailer};
use call_notify::pipeline::{CallProcessor, CallSummarizer, RecipientRouter, Roster};
use call_notify::webhook::webhook_routes;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Install rustls crypto provider before any TLS usage
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    dotenvy::dotenv().ok();

    let config = AppConfig::from_env().context("Failed to load configuration")?;

    // Initialize tracing. The appender guard must live until shutdown.
    let filter = || {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    let _log_guard = match &config.log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "call-notify.log");
            let (file_writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::fmt()
                .with_env_filter(filter())
                .with_target(false)
                .with_writer(std::io::stderr.and(file_writer))
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter())
                .with_target(false)
                .init();
            None
        }
    };

    // ── Roster ──────────────────────────────────────────────────────────
    let roster = match &config.roster_file {
        Some(path) => Roster::from_file(path)
            .with_context(|| format!("Failed to load roster from {}", path.display()))?,
        None => Roster::default_firm(),
    };
    let roster = Arc::new(roster);

    // ── LLM clients (built on first use) ────────────────────────────────
    let summary_llm: Arc<dyn LlmProvider> = Arc::new(LazyProvider::new(config.summary_llm.clone()));
    let router_llm: Arc<dyn LlmProvider> = Arc::new(LazyProvider::new(config.router_llm.clone()));

    // ── Mail ────────────────────────────────────────────────────────────
    let mailer = SmtpMailer::new(config.mail.clone());
    let from_address = mailer.from_address().to_string();
    let transport: Arc<dyn MailTransport> = Arc::new(mailer);

    // ── Pipeline ────────────────────────────────────────────────────────
    let processor = Arc::new(CallProcessor::new(
        CallSummarizer::new(
            summary_llm,
            config.classification_policy.clone(),
            config.llm_timeout,
        ),
        RecipientRouter::new(router_llm, Arc::clone(&roster), config.llm_timeout),
        Notifier::new(transport, from_address),
    ));

    let addr = config.server.socket_addr();
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        %addr,
        summary_backend = config.summary_llm.backend.as_str(),
        summary_model = %config.summary_llm.model,
        router_backend = config.router_llm.backend.as_str(),
        router_model = %config.router_llm.model,
        policy = config.classification_policy.name(),
        roster_size = roster.len(),
        smtp_host = %config.mail.host,
        "call-notify starting"
    );

    let app = webhook_routes(processor);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;

    tracing::info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
