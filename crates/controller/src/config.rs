/// 配置管理

use common::models::constants::{DEFAULT_DOCK_TIMEOUT, DEFAULT_RPC_TIMEOUT, DEFAULT_SERVER_PORT};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server_port: u16,
    /// 单次 Dock 调用的超时（秒）
    pub rpc_timeout_secs: u64,
    /// Dock 心跳超时（秒），超时后连接被清理
    pub dock_timeout_secs: u64,
    pub log_level: String,
}

impl Config {
    /// 从环境变量加载配置
    pub fn from_env() -> anyhow::Result<Self> {
        let server_port = match std::env::var("SERVER_PORT") {
            Ok(v) => v.parse()?,
            Err(_) => DEFAULT_SERVER_PORT,
        };

        let rpc_timeout_secs = match std::env::var("RPC_TIMEOUT_SECS") {
            Ok(v) => v.parse()?,
            Err(_) => DEFAULT_RPC_TIMEOUT,
        };

        let dock_timeout_secs = match std::env::var("DOCK_TIMEOUT_SECS") {
            Ok(v) => v.parse()?,
            Err(_) => DEFAULT_DOCK_TIMEOUT,
        };

        let log_level = std::env::var("LOG_LEVEL")
            .unwrap_or_else(|_| "info".to_string());

        Ok(Self {
            server_port,
            rpc_timeout_secs,
            dock_timeout_secs,
            log_level,
        })
    }
}
