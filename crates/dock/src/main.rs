/// Easy SDS - Dock
///
/// 存储节点代理程序，运行在可访问 Ceph 集群的节点上，负责执行存储操作

use std::sync::Arc;
use tracing::info;

mod config;
mod node;
mod storage;
mod ws;

use common::models::constants::CEPH_DRIVER_NAME;
use node::NodeManager;
use storage::rbd::SystemCommandRunner;
use storage::{CephConfig, StorageManager};
use ws::{RpcHandlerRegistry, WsClient};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 加载配置
    dotenvy::dotenv().ok();
    let cfg = config::Config::from_env()?;

    // 初始化日志
    // 可以通过环境变量 RUST_LOG 覆盖日志级别，例如：
    // RUST_LOG=dock=debug cargo run
    tracing_subscriber::fmt()
        .with_target(false)
        .with_thread_ids(true)
        .with_line_number(true)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cfg.log_level)),
        )
        .init();

    info!("🚀 启动 Easy SDS Dock...");
    info!("✅ 配置加载成功");

    // 初始化存储
    info!("💾 加载驱动配置: {}", cfg.ceph_config);
    let ceph_config = CephConfig::load(&cfg.ceph_config)?;
    let storage = Arc::new(StorageManager::new(
        ceph_config,
        Arc::new(SystemCommandRunner),
        cfg.default_pool.clone(),
    ));
    info!("💾 存储管理器已初始化，默认存储池: {}", storage.default_pool());

    // 创建 RPC 处理器注册表
    let handler_registry = Arc::new(RpcHandlerRegistry::new(storage));
    info!("✅ RPC 处理器已初始化");

    let node_manager = NodeManager::new(
        cfg.node_id.clone(),
        cfg.node_name.clone(),
        cfg.node_ip.clone(),
        CEPH_DRIVER_NAME,
    );

    // 创建 WebSocket 客户端
    let ws_client = WsClient::new(
        cfg.server_ws_url.clone(),
        node_manager.clone(),
        handler_registry,
        cfg.heartbeat_interval,
    );

    info!("🎯 连接到 Controller: {}", cfg.server_ws_url);
    info!("📌 节点 ID: {} ({})", node_manager.node_id(), node_manager.hostname());

    // 运行 WebSocket 客户端（会自动重连）
    ws_client.run().await.map_err(|e| anyhow::anyhow!("{}", e))?;

    Ok(())
}
