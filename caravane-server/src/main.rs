//! 大篷车服务器主程序

use anyhow::{Context, Result};
use caravane_admin::{init_tracing, ConfigManager, StorageBackend};
use caravane_core::{Actor, Role};
use caravane_database::{DatabasePool, MemoryStore, PgStore, Store};
use caravane_web::{AppState, WebServer};
use caravane_workflow::{seed_demo, WorkflowEngine};
use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

/// 服务器命令行参数
#[derive(Parser, Debug)]
#[command(name = "caravane-server")]
#[command(about = "医疗大篷车分诊与转诊服务")]
struct Args {
    /// 服务器端口，覆盖配置文件
    #[arg(short, long)]
    port: Option<u16>,

    /// 配置文件路径
    #[arg(short, long, default_value = "config/caravane.toml")]
    config: String,

    /// 日志级别，覆盖配置文件与 RUST_LOG
    #[arg(short, long)]
    log_level: Option<String>,

    /// 启动时写入演示数据
    #[arg(long)]
    seed_demo: bool,
}

async fn open_store(manager: &ConfigManager) -> Result<Arc<dyn Store>> {
    let database = manager.get_config().await.database;
    match database.backend {
        StorageBackend::Memory => {
            info!("Using in-memory store");
            Ok(Arc::new(MemoryStore::new()))
        }
        StorageBackend::Postgres => {
            let pool = DatabasePool::connect(
                &database.connection_string,
                database.max_connections,
                database.min_connections,
                database.connect_timeout(),
            )
            .await
            .context("Failed to connect to PostgreSQL")?;

            let store = PgStore::new(pool);
            store
                .create_tables()
                .await
                .context("Failed to create database schema")?;
            info!("Using PostgreSQL store");
            Ok(Arc::new(store))
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let manager = ConfigManager::new(&args.config)?;
    if let Some(port) = args.port {
        manager.set_value("server.port", port).await?;
    }
    let config = manager.get_config().await;

    init_tracing(&config.logging, args.log_level.as_deref())?;
    info!("Starting {}...", config.server.name);

    let store = open_store(&manager).await?;
    let engine = WorkflowEngine::new(store)
        .with_timeout(config.workflow.operation_timeout())
        .with_max_page_size(config.workflow.max_page_size);

    if args.seed_demo {
        let system = Actor::new(Uuid::new_v4(), Role::Admin);
        let demo = seed_demo(&engine, &system)
            .await
            .context("Failed to seed demo data")?;
        info!("Demo care event: {} ({})", demo.care_event.name, demo.care_event.id);
        for clinician in [&demo.intake, &demo.generalist, &demo.neurologist, &demo.psychiatrist] {
            info!(
                "  {} -> x-actor-id: {}, x-actor-role: {}",
                clinician.username, clinician.id, clinician.role
            );
        }
    }

    let addr: SocketAddr = config
        .server
        .bind_address()
        .parse()
        .with_context(|| format!("Invalid bind address {}", config.server.bind_address()))?;

    info!("Server configuration:");
    info!("  listen address: {}", addr);
    info!("  storage backend: {:?}", config.database.backend);
    info!("  operation timeout: {:?}", config.workflow.operation_timeout());

    let state = AppState::new(engine, config.workflow.default_page_size);
    let server = WebServer::new(
        addr,
        state,
        config.server.request_timeout(),
        config.server.enable_cors,
    );

    if let Err(e) = server.run().await {
        error!("Server failed: {:#}", e);
        return Err(e);
    }

    Ok(())
}
