use std::sync::Arc;

use synopsis_assist::config::{ServerConfig, StoreBackend, SynopsisConfig};
use synopsis_assist::llm::{LlmConfig, create_provider};
use synopsis_assist::research::{GitHubRepoSource, LlmSynthesizer, SemanticScholarSource};
use synopsis_assist::store::{InMemorySessionStore, LibSqlSessionStore, SessionStore};
use synopsis_assist::synopsis::synopsis_routes;
use synopsis_assist::{Collaborators, build_state};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // A missing .env is fine; real env vars still apply
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let server = ServerConfig::from_env()?;
    let config = SynopsisConfig::from_env();

    eprintln!("📝 Synopsis Assist v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Model: {}", server.model);
    eprintln!("   API: http://0.0.0.0:{}/api", server.port);
    eprintln!("   Documents: {}", server.output_dir.display());

    let llm = create_provider(&LlmConfig {
        base_url: server.llm_base_url.clone(),
        api_key: server.llm_api_key.clone(),
        model: server.model.clone(),
    })?;

    // ── Store ────────────────────────────────────────────────────────────
    let store: Arc<dyn SessionStore> = match &server.store {
        StoreBackend::LibSql { path } => Arc::new(LibSqlSessionStore::new_local(path).await.unwrap_or_else(|e| {
            eprintln!("Error: Failed to open database at {}: {}", path.display(), e);
            std::process::exit(1);
        })),
        StoreBackend::Memory => {
            tracing::warn!("Using in-memory session store; sessions are lost on restart");
            Arc::new(InMemorySessionStore::new())
        }
    };

    let state = build_state(
        Collaborators {
            store,
            llm: llm.clone(),
            repositories: Arc::new(GitHubRepoSource::new(server.github_token.clone())),
            papers: Arc::new(SemanticScholarSource::new()),
            synthesizer: Arc::new(LlmSynthesizer::new(llm)),
        },
        &config,
        server.output_dir.clone(),
    );

    let app = synopsis_routes(state);
    let addr = format!("0.0.0.0:{}", server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Synopsis API listening on {}", addr);

    axum::serve(listener, app).await?;
    Ok(())
}
