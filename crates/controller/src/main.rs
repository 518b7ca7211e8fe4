/// Easy SDS - Controller
///
/// 控制器主程序，接受 Dock 的 WebSocket 连接并维护在线 Dock 列表

use axum::{routing::get, Router};
use std::net::SocketAddr;
use std::time::Duration;
use tower_http::trace::TraceLayer;
use tracing::info;

use controller::app_state::AppState;
use controller::config::Config;
use controller::ws::{self, DockConnectionManager};

/// 心跳超时检查间隔（秒）
const HEARTBEAT_CHECK_INTERVAL: u64 = 30;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 加载环境变量
    dotenvy::dotenv().ok();
    let cfg = Config::from_env()?;

    // 初始化日志
    tracing_subscriber::fmt()
        .with_target(false)
        .with_thread_ids(true)
        .with_line_number(true)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cfg.log_level)),
        )
        .init();

    info!("🚀 启动 Easy SDS Controller...");
    info!("✅ 配置加载成功");

    let dock_manager = DockConnectionManager::new();
    let app_state = AppState::new(dock_manager.clone(), Duration::from_secs(cfg.rpc_timeout_secs));

    dock_manager.start_heartbeat_monitor(cfg.dock_timeout_secs, HEARTBEAT_CHECK_INTERVAL);
    info!("✅ 心跳监控任务已启动（{}秒超时检测）", cfg.dock_timeout_secs);

    let app = Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_handler))
        .route("/ws/dock", get(ws::handle_dock_websocket))
        .layer(TraceLayer::new_for_http())
        .with_state(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], cfg.server_port));
    info!("🎯 服务器监听在 http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn root_handler() -> &'static str {
    "Easy SDS Controller v1"
}

async fn health_handler() -> &'static str {
    "OK"
}
