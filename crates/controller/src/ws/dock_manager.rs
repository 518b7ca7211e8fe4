/// Dock 连接管理器
///
/// 负责管理所有 Dock 的 WebSocket 连接，以及 Controller 发起的请求与响应的配对

use common::models::StoragePoolSpec;
use common::ws_rpc::{RpcError, RpcErrorCode, RpcMessage};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, oneshot, RwLock};
use tracing::{debug, info, warn};

/// 等待响应的请求
type PendingRequest = oneshot::Sender<Result<RpcMessage, RpcError>>;

/// Dock 连接信息
pub struct DockConnection {
    pub node_id: String,
    pub hostname: String,
    pub ip_address: String,
    pub driver_name: String,

    /// 发送消息的通道
    pub sender: mpsc::UnboundedSender<RpcMessage>,

    last_heartbeat: RwLock<Instant>,

    /// Dock 最近一次上报的存储池清单
    pools: RwLock<Vec<StoragePoolSpec>>,

    /// request_id -> 等待者
    pending_requests: RwLock<HashMap<String, PendingRequest>>,
}

impl DockConnection {
    /// 发送 RPC 请求并等待响应
    pub async fn call(
        &self,
        method: &str,
        payload: serde_json::Value,
        timeout: Duration,
    ) -> Result<RpcMessage, RpcError> {
        let msg = RpcMessage::request(method, payload);
        let request_id = msg.id.clone();

        info!("📤 [Controller -> Dock] 发送请求: node={}, method={}, id={}",
              self.node_id, method, request_id);

        let (tx, rx) = oneshot::channel();
        self.pending_requests.write().await.insert(request_id.clone(), tx);

        if self.sender.send(msg).is_err() {
            self.pending_requests.write().await.remove(&request_id);
            return Err(RpcError::connection_closed());
        }

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => {
                self.pending_requests.write().await.remove(&request_id);
                Err(RpcError::internal_error("响应通道被关闭"))
            }
            Err(_) => {
                self.pending_requests.write().await.remove(&request_id);
                Err(RpcError::timeout(format!("请求超时: {}", request_id)))
            }
        }
    }

    /// 处理收到的响应消息，唤醒对应的等待者
    pub async fn handle_response(&self, response: RpcMessage) {
        let request_id = response.id.clone();

        let Some(sender) = self.pending_requests.write().await.remove(&request_id) else {
            debug!("收到未预期的响应: {}", request_id);
            return;
        };

        let result = match response.error {
            Some(error_info) => {
                warn!("📥 [Dock -> Controller] 收到错误响应: node={}, id={}, code={}, message={}",
                      self.node_id, request_id, error_info.code, error_info.message);
                let code = RpcErrorCode::from_code(&error_info.code)
                    .unwrap_or(RpcErrorCode::InternalError);
                Err(RpcError {
                    code,
                    message: error_info.message,
                    details: error_info.details,
                })
            }
            None => {
                info!("📥 [Dock -> Controller] 收到响应: node={}, id={}", self.node_id, request_id);
                Ok(response)
            }
        };

        if sender.send(result).is_err() {
            warn!("无法发送响应，等待者已关闭: {}", request_id);
        }
    }

    /// 更新最后心跳时间
    pub async fn update_heartbeat(&self) {
        *self.last_heartbeat.write().await = Instant::now();
    }

    /// 距离上次心跳的时间（秒）
    pub async fn heartbeat_elapsed(&self) -> u64 {
        self.last_heartbeat.read().await.elapsed().as_secs()
    }

    /// 更新存储池清单
    pub async fn update_pools(&self, pools: Vec<StoragePoolSpec>) {
        *self.pools.write().await = pools;
    }

    /// 最近一次上报的存储池清单
    pub async fn pools(&self) -> Vec<StoragePoolSpec> {
        self.pools.read().await.clone()
    }
}

/// Dock 连接管理器
#[derive(Clone, Default)]
pub struct DockConnectionManager {
    /// node_id -> DockConnection
    connections: Arc<RwLock<HashMap<String, Arc<DockConnection>>>>,
}

impl DockConnectionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册新的 Dock 连接，同一节点重连时替换旧连接
    pub async fn register(
        &self,
        node_id: String,
        hostname: String,
        ip_address: String,
        driver_name: String,
        sender: mpsc::UnboundedSender<RpcMessage>,
    ) -> Arc<DockConnection> {
        let connection = Arc::new(DockConnection {
            node_id: node_id.clone(),
            hostname,
            ip_address,
            driver_name,
            sender,
            last_heartbeat: RwLock::new(Instant::now()),
            pools: RwLock::new(Vec::new()),
            pending_requests: RwLock::new(HashMap::new()),
        });

        self.connections.write().await.insert(node_id.clone(), connection.clone());

        info!("Dock 已注册: {}", node_id);
        connection
    }

    /// 注销 Dock 连接
    ///
    /// 只移除与传入连接相同的实例，避免旧连接关闭时注销重连后的新连接
    pub async fn unregister(&self, connection: &Arc<DockConnection>) {
        let mut connections = self.connections.write().await;
        let same = connections
            .get(&connection.node_id)
            .is_some_and(|c| Arc::ptr_eq(c, connection));
        if same {
            connections.remove(&connection.node_id);
            info!("Dock 已注销: {}", connection.node_id);
        }
    }

    /// 获取指定节点的连接
    pub async fn get(&self, node_id: &str) -> Option<Arc<DockConnection>> {
        self.connections.read().await.get(node_id).cloned()
    }

    /// 所有在线节点 ID
    pub async fn list_nodes(&self) -> Vec<String> {
        let mut nodes: Vec<String> = self.connections.read().await.keys().cloned().collect();
        nodes.sort();
        nodes
    }

    pub async fn count(&self) -> usize {
        self.connections.read().await.len()
    }

    pub async fn is_online(&self, node_id: &str) -> bool {
        self.connections.read().await.contains_key(node_id)
    }

    /// 清理心跳超时的连接，返回被清理的节点 ID
    pub async fn cleanup_timeout_connections(&self, timeout_secs: u64) -> Vec<String> {
        let mut to_remove = Vec::new();

        {
            let connections = self.connections.read().await;
            for (node_id, conn) in connections.iter() {
                let elapsed = conn.heartbeat_elapsed().await;
                if elapsed > timeout_secs {
                    warn!("Dock 心跳超时: {} ({}秒)", node_id, elapsed);
                    to_remove.push(node_id.clone());
                }
            }
        }

        if !to_remove.is_empty() {
            let mut connections = self.connections.write().await;
            for node_id in &to_remove {
                connections.remove(node_id);
                info!("已清理超时 Dock: {}", node_id);
            }
        }

        to_remove
    }

    /// 向指定 Dock 发送 RPC 请求
    pub async fn call(
        &self,
        node_id: &str,
        method: &str,
        payload: serde_json::Value,
        timeout: Duration,
    ) -> Result<RpcMessage, RpcError> {
        let connection = self
            .get(node_id)
            .await
            .ok_or_else(|| RpcError::node_not_found(node_id))?;

        connection.call(method, payload, timeout).await
    }

    /// 启动心跳超时检查任务
    pub fn start_heartbeat_monitor(self, timeout_secs: u64, check_interval_secs: u64) {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(check_interval_secs));

            loop {
                interval.tick().await;

                let removed = self.cleanup_timeout_connections(timeout_secs).await;
                if !removed.is_empty() {
                    warn!("心跳监控: 清理了 {} 个超时 Dock", removed.len());
                }
            }
        });
    }
}
