use std::collections::HashMap;
use std::sync::Arc;

use secrecy::SecretString;

use sprachbot::admin::AdminGate;
use sprachbot::channels::{Channel, LogChannel, WhatsAppChannel};
use sprachbot::config::AppConfig;
use sprachbot::dispatch::Dispatcher;
use sprachbot::error::ConfigError;
use sprachbot::gateway::Gateway;
use sprachbot::ledger::CostLedger;
use sprachbot::llm::{LlmBackend, LlmConfig, LlmProvider, create_provider};
use sprachbot::routing::{ProviderId, RoutingTable};
use sprachbot::server::{AppState, router};
use sprachbot::store::{LibSqlRepository, UserRepository};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = AppConfig::from_env().unwrap_or_else(|e| {
        eprintln!("Error: {e}");
        std::process::exit(1);
    });

    eprintln!("🇩🇪 Sprachbot v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Webhook: http://0.0.0.0:{}/webhook", config.port);
    eprintln!("   Admin API: http://0.0.0.0:{}/admin/pending", config.port);
    eprintln!("   Admins: {}", config.admin_numbers.len());

    // ── Routing table (misconfiguration is fatal here, never per-message) ─
    let table = Arc::new(RoutingTable::new(config.routing.clone()).unwrap_or_else(|e| {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }));

    // ── Provider clients ─────────────────────────────────────────────────
    let mut clients: HashMap<ProviderId, Arc<dyn LlmProvider>> = HashMap::new();
    for provider in table.fallback_order() {
        let spec = table.spec(provider).expect("provider in fallback order");
        let api_key = api_key_for(spec.backend).unwrap_or_else(|e| {
            eprintln!("Error: {e}");
            std::process::exit(1);
        });
        let client = create_provider(&LlmConfig {
            backend: spec.backend,
            api_key,
            model: spec.model.clone(),
        })?;
        eprintln!("   Provider: {} → {}", provider, spec.model);
        clients.insert(provider.clone(), client);
    }

    // ── Database ─────────────────────────────────────────────────────────
    let repo: Arc<dyn UserRepository> = Arc::new(
        LibSqlRepository::new_local(&config.db_path)
            .await
            .unwrap_or_else(|e| {
                eprintln!(
                    "Error: Failed to open database at {}: {e}",
                    config.db_path.display()
                );
                std::process::exit(1);
            }),
    );
    eprintln!("   Database: {}", config.db_path.display());

    // ── Channel ──────────────────────────────────────────────────────────
    let channel: Arc<dyn Channel> = match &config.twilio {
        Some(twilio) => {
            eprintln!("   Channel: whatsapp ({})", twilio.from_number);
            Arc::new(WhatsAppChannel::new(
                twilio.account_sid.clone(),
                twilio.auth_token.clone(),
                twilio.from_number.clone(),
            ))
        }
        None => {
            eprintln!("   Channel: log only (TWILIO_ACCOUNT_SID not set)");
            Arc::new(LogChannel)
        }
    };

    // ── Tutor notes ──────────────────────────────────────────────────────
    let tutor_notes = match &config.tutor_notes_path {
        Some(path) => match tokio::fs::read_to_string(path).await {
            Ok(notes) => {
                eprintln!("   Tutor notes: {} chars from {}", notes.len(), path.display());
                Some(notes)
            }
            Err(e) => {
                eprintln!("   Warning: could not read tutor notes {}: {e}", path.display());
                None
            }
        },
        None => None,
    };

    // ── Core wiring ──────────────────────────────────────────────────────
    let ledger = Arc::new(CostLedger::new());
    let dispatcher = Arc::new(Dispatcher::new(clients, table.clone(), ledger.clone())?);
    let gate = Arc::new(AdminGate::new(
        repo.clone(),
        channel.clone(),
        config.admin_numbers.clone(),
    ));
    let gateway = Arc::new(Gateway::new(
        repo.clone(),
        gate.clone(),
        dispatcher,
        table,
        ledger.clone(),
        tutor_notes,
    ));

    let state = Arc::new(AppState {
        gateway,
        channel,
        repo,
        gate,
        admin_secret: config.admin_secret.clone(),
        ledger,
    });

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.port)).await?;
    tracing::info!(port = config.port, "Sprachbot listening");
    axum::serve(listener, router(state)).await?;

    Ok(())
}

/// Resolve the API key environment variable for a backend kind.
fn api_key_for(backend: LlmBackend) -> Result<SecretString, ConfigError> {
    let var = match backend {
        LlmBackend::Anthropic => "ANTHROPIC_API_KEY",
        LlmBackend::OpenAi => "OPENAI_API_KEY",
    };
    std::env::var(var)
        .map(SecretString::from)
        .map_err(|_| ConfigError::MissingEnvVar(var.to_string()))
}
