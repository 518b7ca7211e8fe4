/// 配置管理

use common::models::constants::DEFAULT_HEARTBEAT_INTERVAL;
use serde::Deserialize;

use crate::node::local_hostname;
use crate::storage::config::DEFAULT_DRIVER_CONFIG;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub node_id: String,
    pub node_name: String,
    pub node_ip: String,
    pub server_ws_url: String,
    pub heartbeat_interval: u64,
    pub log_level: String,
    /// Ceph 驱动配置文件路径
    pub ceph_config: String,
    /// 请求未指定存储池时使用的存储池
    pub default_pool: String,
}

impl Config {
    /// 从环境变量加载配置
    pub fn from_env() -> anyhow::Result<Self> {
        let node_id = std::env::var("NODE_ID")
            .unwrap_or_else(|_| uuid::Uuid::new_v4().to_string());

        let node_name = std::env::var("NODE_NAME").unwrap_or_else(|_| local_hostname());

        let node_ip = std::env::var("NODE_IP")
            .unwrap_or_else(|_| "127.0.0.1".to_string());

        let server_ws_url = std::env::var("SERVER_WS_URL")
            .unwrap_or_else(|_| "ws://localhost:3000/ws/dock".to_string());

        let heartbeat_interval = match std::env::var("HEARTBEAT_INTERVAL") {
            Ok(v) => v.parse()?,
            Err(_) => DEFAULT_HEARTBEAT_INTERVAL,
        };

        let log_level = std::env::var("LOG_LEVEL")
            .unwrap_or_else(|_| "info".to_string());

        let ceph_config = std::env::var("CEPH_CONFIG")
            .unwrap_or_else(|_| DEFAULT_DRIVER_CONFIG.to_string());

        let default_pool = std::env::var("DEFAULT_POOL")
            .unwrap_or_else(|_| "rbd".to_string());

        Ok(Self {
            node_id,
            node_name,
            node_ip,
            server_ws_url,
            heartbeat_interval,
            log_level,
            ceph_config,
            default_pool,
        })
    }
}
