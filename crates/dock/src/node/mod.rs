/// 节点信息管理模块
///
/// 负责 Dock 节点的身份信息，以及注册、心跳消息的构造

use common::ws_rpc::{HeartbeatRequest, RegisterRequest};
use tracing::debug;

/// 节点信息管理器
#[derive(Clone)]
pub struct NodeManager {
    /// 节点ID
    node_id: String,
    /// 主机名
    hostname: String,
    /// IP地址
    ip_address: String,
    /// 驱动名称
    driver_name: String,
}

impl NodeManager {
    /// 创建新的节点管理器
    pub fn new(
        node_id: impl Into<String>,
        hostname: impl Into<String>,
        ip_address: impl Into<String>,
        driver_name: impl Into<String>,
    ) -> Self {
        Self {
            node_id: node_id.into(),
            hostname: hostname.into(),
            ip_address: ip_address.into(),
            driver_name: driver_name.into(),
        }
    }

    /// 获取节点ID
    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    /// 获取主机名
    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    /// 注册请求
    pub fn register_request(&self) -> RegisterRequest {
        debug!("构造注册请求: node_id={}", self.node_id);
        RegisterRequest {
            node_id: self.node_id.clone(),
            hostname: self.hostname.clone(),
            ip_address: self.ip_address.clone(),
            driver_name: self.driver_name.clone(),
        }
    }

    /// 心跳
    pub fn heartbeat(&self) -> HeartbeatRequest {
        HeartbeatRequest {
            node_id: self.node_id.clone(),
            timestamp: chrono::Utc::now().timestamp(),
        }
    }
}

/// 获取本机主机名
pub fn local_hostname() -> String {
    hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "unknown".to_string())
}
