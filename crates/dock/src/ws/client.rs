/// WebSocket 客户端
///
/// Dock 连接到 Controller 的 WebSocket 客户端：注册、上报存储池、心跳，
/// 并发处理 Controller 发来的 RPC 请求

use common::ws_rpc::{codec, methods, PoolInventory, RpcErrorCode, RpcMessage};
use common::MessageType;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, warn};

use super::handler::RpcHandlerRegistry;
use crate::node::NodeManager;

type ClientResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// WebSocket 客户端状态
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientState {
    Disconnected,
    Connecting,
    Connected,
    Registered,
}

/// Dock 侧 WebSocket 客户端
#[derive(Clone)]
pub struct WsClient {
    server_url: String,
    node_manager: NodeManager,
    state: Arc<RwLock<ClientState>>,
    handler_registry: Arc<RpcHandlerRegistry>,
    /// 秒
    reconnect_interval: u64,
    /// 秒
    heartbeat_interval: u64,
}

impl WsClient {
    /// 创建新的 WebSocket 客户端
    pub fn new(
        server_url: impl Into<String>,
        node_manager: NodeManager,
        handler_registry: Arc<RpcHandlerRegistry>,
        heartbeat_interval: u64,
    ) -> Self {
        Self {
            server_url: server_url.into(),
            node_manager,
            state: Arc::new(RwLock::new(ClientState::Disconnected)),
            handler_registry,
            reconnect_interval: 5,
            heartbeat_interval,
        }
    }

    /// 保持与 Controller 的连接，断开后按固定间隔重连
    pub async fn run(&self) -> ClientResult<()> {
        loop {
            info!("尝试连接到 Controller: {}", self.server_url);

            if let Err(e) = self.connect_and_run().await {
                error!("连接错误: {}", e);
            } else {
                info!("连接已关闭");
            }
            *self.state.write().await = ClientState::Disconnected;

            warn!("{}秒后重新连接...", self.reconnect_interval);
            tokio::time::sleep(Duration::from_secs(self.reconnect_interval)).await;
        }
    }

    async fn set_state(&self, new_state: ClientState) {
        debug!("客户端状态: {:?}", new_state);
        *self.state.write().await = new_state;
    }

    /// 连接、注册，然后运行收发与心跳任务直到连接断开
    async fn connect_and_run(&self) -> ClientResult<()> {
        self.set_state(ClientState::Connecting).await;

        let (ws_stream, _) = connect_async(&self.server_url).await?;
        info!("✅ WebSocket 连接成功");
        self.set_state(ClientState::Connected).await;

        let (mut ws_sender, mut ws_receiver) = ws_stream.split();
        self.register(&mut ws_sender, &mut ws_receiver).await?;
        self.set_state(ClientState::Registered).await;

        let (tx, mut rx) = mpsc::unbounded_channel::<RpcMessage>();

        let registry = self.handler_registry.clone();
        let node_id = self.node_manager.node_id().to_string();
        let tx_inventory = tx.clone();
        tokio::spawn(async move {
            if let Err(e) = Self::send_pool_inventory(&registry, &node_id, &tx_inventory).await {
                warn!("上报存储池清单失败: {}", e);
            }
        });

        let heartbeat_task = self.spawn_heartbeat(tx.clone());

        let send_task = tokio::spawn(async move {
            while let Some(msg) = rx.recv().await {
                let sent = match codec::encode(&msg) {
                    Ok(ws_msg) => ws_sender.send(ws_msg).await.map_err(|e| e.to_string()),
                    Err(e) => {
                        error!("序列化消息失败: {}", e);
                        continue;
                    }
                };
                if let Err(e) = sent {
                    error!("发送消息失败: {}", e);
                    break;
                }
            }
            debug!("发送任务结束");
        });

        let handler_registry = self.handler_registry.clone();
        let recv_task = tokio::spawn(async move {
            while let Some(frame) = ws_receiver.next().await {
                let rpc_msg = match frame.map_err(|e| e.to_string()).map(codec::decode) {
                    Ok(Ok(Some(rpc_msg))) => rpc_msg,
                    Ok(Ok(None)) => continue,
                    Ok(Err(e)) if e.code == RpcErrorCode::ConnectionClosed => break,
                    Ok(Err(e)) => {
                        warn!("解析消息失败: {}", e);
                        continue;
                    }
                    Err(e) => {
                        error!("接收消息错误: {}", e);
                        break;
                    }
                };

                // 每个消息独立处理，慢请求不阻塞后续消息
                let handler_registry = handler_registry.clone();
                let tx = tx.clone();
                tokio::spawn(async move {
                    Self::handle_message(rpc_msg, &handler_registry, &tx).await;
                });
            }
            debug!("接收任务结束");
        });

        join_io_tasks(send_task, recv_task).await;

        heartbeat_task.abort();
        Ok(())
    }

    /// 发送注册请求并等待 ID 匹配的响应
    async fn register(
        &self,
        ws_sender: &mut SplitSink<WsStream, Message>,
        ws_receiver: &mut SplitStream<WsStream>,
    ) -> ClientResult<()> {
        let request = RpcMessage::request(
            methods::REGISTER,
            serde_json::to_value(self.node_manager.register_request())?,
        );
        ws_sender.send(codec::encode(&request)?).await?;
        debug!("已发送注册请求: id={}", request.id);

        while let Some(frame) = ws_receiver.next().await {
            let Some(reply) = codec::decode(frame?)? else {
                continue;
            };
            if reply.id != request.id {
                debug!("注册完成前忽略消息: id={}", reply.id);
                continue;
            }
            if let Some(err) = reply.error {
                return Err(format!("注册失败: {}", err.message).into());
            }
            info!("✅ 注册成功");
            return Ok(());
        }

        Err("注册前连接已关闭".into())
    }

    /// 周期性发送心跳通知，通道关闭时退出
    fn spawn_heartbeat(&self, tx: mpsc::UnboundedSender<RpcMessage>) -> JoinHandle<()> {
        let node_manager = self.node_manager.clone();
        let period = Duration::from_secs(self.heartbeat_interval);

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            loop {
                interval.tick().await;
                let payload = match serde_json::to_value(node_manager.heartbeat()) {
                    Ok(p) => p,
                    Err(e) => {
                        error!("序列化心跳失败: {}", e);
                        continue;
                    }
                };
                if tx.send(RpcMessage::notification(methods::HEARTBEAT, payload)).is_err() {
                    break;
                }
                debug!("发送心跳");
            }
        })
    }

    /// 处理收到的消息
    async fn handle_message(
        rpc_msg: RpcMessage,
        handler_registry: &RpcHandlerRegistry,
        tx: &mpsc::UnboundedSender<RpcMessage>,
    ) {
        debug!("收到消息: type={:?}, method={:?}", rpc_msg.message_type, rpc_msg.method);

        match rpc_msg.message_type {
            MessageType::Request => {
                // 处理请求并发送响应
                let response = handler_registry.handle_request(rpc_msg).await;
                if let Err(e) = tx.send(response) {
                    error!("发送响应失败: {}", e);
                }
            }
            MessageType::Response => {
                debug!("收到未关联的响应: id={}", rpc_msg.id);
            }
            MessageType::Notification => {
                let Some(method) = rpc_msg.method.clone() else {
                    error!("通知缺少方法名");
                    return;
                };
                let payload = rpc_msg.payload.unwrap_or(serde_json::Value::Null);
                if let Err(e) = handler_registry.handle_notification(&method, payload).await {
                    error!("处理通知失败: method={}, error={}", method, e);
                }
            }
        }
    }

    /// 上报存储池清单
    async fn send_pool_inventory(
        registry: &RpcHandlerRegistry,
        node_id: &str,
        tx: &mpsc::UnboundedSender<RpcMessage>,
    ) -> ClientResult<()> {
        let pools = registry.storage().list_pools().await?;
        let count = pools.len();

        let inventory = PoolInventory {
            node_id: node_id.to_string(),
            pools,
            timestamp: chrono::Utc::now().timestamp(),
        };
        let msg = RpcMessage::notification(methods::POOL_INVENTORY, serde_json::to_value(&inventory)?);

        tx.send(msg).map_err(|_| "发送通道已关闭".to_string())?;

        info!("✅ 已上报存储池清单: {} 个存储池", count);
        Ok(())
    }
}

/// 等待收发任务之一结束，并中止另一个
async fn join_io_tasks(mut send_task: JoinHandle<()>, mut recv_task: JoinHandle<()>) {
    tokio::select! {
        _ = &mut send_task => {
            debug!("发送任务已结束");
            recv_task.abort();
        }
        _ = &mut recv_task => {
            debug!("接收任务已结束");
            send_task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::oneshot;

    #[tokio::test]
    async fn test_join_io_tasks_aborts_surviving_task() {
        let (alive_tx, alive_rx) = oneshot::channel::<()>();
        let send_task = tokio::spawn(async {});
        let recv_task = tokio::spawn(async move {
            let _alive = alive_tx;
            std::future::pending::<()>().await;
        });

        join_io_tasks(send_task, recv_task).await;

        // 任务被中止后持有的发送端随之释放
        let closed = tokio::time::timeout(Duration::from_secs(5), alive_rx).await;
        assert!(matches!(closed, Ok(Err(_))));
    }

    #[tokio::test]
    async fn test_join_io_tasks_aborts_sender_when_receiver_ends() {
        let (alive_tx, alive_rx) = oneshot::channel::<()>();
        let send_task = tokio::spawn(async move {
            let _alive = alive_tx;
            std::future::pending::<()>().await;
        });
        let recv_task = tokio::spawn(async {});

        join_io_tasks(send_task, recv_task).await;

        let closed = tokio::time::timeout(Duration::from_secs(5), alive_rx).await;
        assert!(matches!(closed, Ok(Err(_))));
    }
}
