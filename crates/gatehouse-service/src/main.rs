use clap::{Parser, ValueEnum};
use gatehouse_core::PolicyStoreConfig;
use gatehouse_service::{build_router, ServiceConfig, ServiceState};
use std::net::SocketAddr;
use tracing::info;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum PolicyStoreMode {
    Auto,
    Memory,
    Postgres,
}

#[derive(Debug, Parser)]
#[command(name = "gatehoused", version, about = "Gatehouse policy evaluation REST service")]
struct Cli {
    /// Socket address to bind, e.g. 127.0.0.1:8080
    #[arg(long, default_value = "127.0.0.1:8080")]
    listen: SocketAddr,
    /// Policy persistence backend. `auto` picks postgres when a database url is configured.
    #[arg(long, value_enum, default_value_t = PolicyStoreMode::Auto, env = "GATEHOUSE_POLICY_STORE")]
    policy_store: PolicyStoreMode,
    /// PostgreSQL url for policy persistence.
    #[arg(long, env = "GATEHOUSE_DATABASE_URL")]
    database_url: Option<String>,
    /// Max PostgreSQL pool connections.
    #[arg(long, default_value_t = 5, env = "GATEHOUSE_PG_MAX_CONNECTIONS")]
    pg_max_connections: u32,
}

fn resolve_policy_store(cli: &Cli) -> anyhow::Result<PolicyStoreConfig> {
    let resolved_url = cli
        .database_url
        .clone()
        .or_else(|| std::env::var("DATABASE_URL").ok());

    let store = match cli.policy_store {
        PolicyStoreMode::Memory => PolicyStoreConfig::Memory,
        PolicyStoreMode::Postgres => {
            let database_url = resolved_url.ok_or_else(|| {
                anyhow::anyhow!("policy_store=postgres requires --database-url or DATABASE_URL")
            })?;
            PolicyStoreConfig::postgres(database_url, cli.pg_max_connections)
        }
        PolicyStoreMode::Auto => {
            if let Some(database_url) = resolved_url {
                PolicyStoreConfig::postgres(database_url, cli.pg_max_connections)
            } else {
                PolicyStoreConfig::Memory
            }
        }
    };

    Ok(store)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "gatehouse_service=info,info".to_string()),
        )
        .init();

    let cli = Cli::parse();
    let policy_store = resolve_policy_store(&cli)?;
    let state = ServiceState::bootstrap(ServiceConfig { policy_store }).await?;
    let app = build_router(state.clone());

    let listener = tokio::net::TcpListener::bind(cli.listen).await?;
    info!(
        "gatehouse-service listening on {} (policy store: {})",
        listener.local_addr()?,
        state.store.backend_label()
    );

    axum::serve(listener, app).await?;

    Ok(())
}
