use std::sync::Arc;

use club_history::config::{AdminConfig, MiningConfig};
use club_history::llm::{LlmBackend, LlmConfig, create_provider};
use club_history::mining::{EventMiner, LlmMiner};
use club_history::server::{AppState, api_routes};
use club_history::store::{EventStore, LibSqlBackend};
use club_history::tasks::{RefreshRunner, TaskRegistry};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    // Read API key from environment
    let api_key = std::env::var("LLM_API_KEY").unwrap_or_else(|_| {
        eprintln!("Error: LLM_API_KEY not set");
        eprintln!("  export LLM_API_KEY=sk-...");
        std::process::exit(1);
    });

    let backend = match std::env::var("CLUB_HISTORY_LLM_BACKEND").ok().as_deref() {
        Some("openai") => LlmBackend::OpenAi,
        _ => LlmBackend::Anthropic,
    };

    let model = std::env::var("CLUB_HISTORY_MODEL")
        .unwrap_or_else(|_| "claude-sonnet-4-20250514".to_string());

    let port: u16 = std::env::var("CLUB_HISTORY_PORT")
        .unwrap_or_else(|_| "8080".to_string())
        .parse()
        .unwrap_or(8080);

    let db_path = std::env::var("CLUB_HISTORY_DB_PATH")
        .unwrap_or_else(|_| "./data/club-history.db".to_string());

    eprintln!("⚽ Club History v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Model: {}", model);
    eprintln!("   API: http://0.0.0.0:{}/api", port);

    // LLM provider + miner
    let llm_config = LlmConfig {
        backend,
        api_key: secrecy::SecretString::from(api_key),
        model,
    };
    let llm = create_provider(&llm_config)?;
    let miner: Arc<dyn EventMiner> = Arc::new(LlmMiner::new(llm));

    // ── Database ────────────────────────────────────────────────────
    let store: Arc<dyn EventStore> = Arc::new(
        LibSqlBackend::new_local(std::path::Path::new(&db_path))
            .await
            .unwrap_or_else(|e| {
                eprintln!("Error: Failed to open database at {}: {}", db_path, e);
                std::process::exit(1);
            }),
    );
    eprintln!("   Database: {}", db_path);

    // ── Refresh machinery ───────────────────────────────────────────
    let mining_config = MiningConfig::from_env();
    eprintln!(
        "   Mining window: {}-{} in {}-year chunks",
        mining_config.min_year, mining_config.max_year, mining_config.chunk_years
    );

    let registry = TaskRegistry::new();
    let runner = Arc::new(RefreshRunner::new(
        Arc::clone(&store),
        Arc::clone(&miner),
        mining_config.clone(),
    ));

    let admin = AdminConfig::from_env();
    if admin.is_none() {
        eprintln!("   Admin auth: disabled (set ADMIN_USERNAME / ADMIN_PASSWORD)");
    }

    // ── HTTP server ─────────────────────────────────────────────────
    let app = api_routes(AppState {
        store,
        registry,
        runner,
        miner,
        mining: mining_config,
        admin,
    });

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;
    tracing::info!(port, "Club History server started");
    axum::serve(listener, app).await?;

    Ok(())
}
