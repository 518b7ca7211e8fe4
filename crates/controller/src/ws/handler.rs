/// WebSocket 连接处理器
///
/// 处理与 Dock 的 WebSocket 连接：注册、心跳、存储池上报以及响应分发

use axum::extract::ws::{Message as AxumWsMessage, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use common::ws_rpc::{
    methods, HeartbeatRequest, MessageType, PoolInventory, RegisterRequest, RegisterResponse,
    RpcErrorCode, RpcMessage,
};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use super::{DockConnection, DockConnectionManager};
use crate::app_state::AppState;

/// 等待注册消息的超时
const REGISTER_TIMEOUT: Duration = Duration::from_secs(10);

/// WebSocket 升级处理器
pub async fn handle_dock_websocket(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let manager = state.dock_manager();
    ws.on_upgrade(move |socket| handle_dock_connection(socket, manager))
}

/// 处理 Dock WebSocket 连接
async fn handle_dock_connection(socket: WebSocket, manager: DockConnectionManager) {
    info!("新的 Dock WebSocket 连接");

    let (mut ws_sender, mut ws_receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<RpcMessage>();

    let (request_id, register_req) = match wait_for_registration(&mut ws_receiver).await {
        Ok(info) => info,
        Err(e) => {
            error!("Dock 注册失败: {}", e);
            let _ = ws_sender.close().await;
            return;
        }
    };

    let register_response = RegisterResponse {
        success: true,
        message: "注册成功".to_string(),
    };
    let response_msg = match serde_json::to_value(&register_response) {
        Ok(value) => RpcMessage::response(request_id, value),
        Err(e) => {
            error!("序列化注册响应失败: {}", e);
            return;
        }
    };

    if let Err(e) = send_message(&mut ws_sender, response_msg).await {
        error!("发送注册响应失败: {}", e);
        return;
    }

    let connection = manager
        .register(
            register_req.node_id.clone(),
            register_req.hostname.clone(),
            register_req.ip_address.clone(),
            register_req.driver_name.clone(),
            tx,
        )
        .await;

    info!("✅ Dock 已连接并注册: node_id={}, hostname={}, ip={}, driver={}",
          register_req.node_id, register_req.hostname, register_req.ip_address, register_req.driver_name);

    let mut send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if let Err(e) = send_message(&mut ws_sender, msg).await {
                error!("发送消息失败: {}", e);
                break;
            }
        }
        debug!("消息发送任务结束");
    });

    let connection_clone = connection.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(result) = ws_receiver.next().await {
            match result {
                Ok(AxumWsMessage::Close(_)) => break,
                Ok(msg) => {
                    if let Err(e) = handle_incoming_message(msg, &connection_clone).await {
                        warn!("处理消息失败: {}", e);
                    }
                }
                Err(e) => {
                    error!("接收消息错误: {}", e);
                    break;
                }
            }
        }
        debug!("消息接收任务结束");
    });

    tokio::select! {
        _ = &mut send_task => {
            recv_task.abort();
        }
        _ = &mut recv_task => {
            send_task.abort();
        }
    }

    manager.unregister(&connection).await;
    info!("Dock 连接已关闭: {}", connection.node_id);
}

/// 等待并解析注册请求，返回请求 ID 和注册信息
async fn wait_for_registration(
    receiver: &mut SplitStream<WebSocket>,
) -> Result<(String, RegisterRequest), String> {
    match tokio::time::timeout(REGISTER_TIMEOUT, receiver.next()).await {
        Ok(Some(Ok(msg))) => {
            let rpc_msg = parse_websocket_message(msg)?
                .ok_or("期望收到注册请求")?;

            if rpc_msg.message_type != MessageType::Request {
                return Err("期望收到注册请求".to_string());
            }

            if rpc_msg.method.as_deref() != Some(methods::REGISTER) {
                return Err(format!("期望 register 方法，收到: {:?}", rpc_msg.method));
            }

            let register_req: RegisterRequest = rpc_msg
                .parse_payload()
                .map_err(|e| format!("解析注册信息失败: {}", e))?;

            Ok((rpc_msg.id, register_req))
        }
        Ok(Some(Err(e))) => Err(format!("接收注册消息错误: {}", e)),
        Ok(None) => Err("连接已关闭".to_string()),
        Err(_) => Err("等待注册消息超时".to_string()),
    }
}

/// 处理收到的消息
async fn handle_incoming_message(
    ws_msg: AxumWsMessage,
    connection: &Arc<DockConnection>,
) -> Result<(), String> {
    let Some(rpc_msg) = parse_websocket_message(ws_msg)? else {
        return Ok(());
    };

    debug!("收到消息: type={:?}, method={:?}, id={}",
           rpc_msg.message_type, rpc_msg.method, rpc_msg.id);

    match rpc_msg.message_type {
        MessageType::Notification => handle_notification(rpc_msg, connection).await,
        MessageType::Request => {
            // Dock 不会向 Controller 发起业务请求
            let method = rpc_msg.method.unwrap_or_default();
            warn!("未知的请求方法: {}", method);
            let error_response = RpcMessage::error_response(
                rpc_msg.id,
                RpcErrorCode::MethodNotFound.as_str(),
                format!("方法不存在: {}", method),
                None,
            );
            connection
                .sender
                .send(error_response)
                .map_err(|_| "发送错误响应失败".to_string())
        }
        MessageType::Response => {
            connection.handle_response(rpc_msg).await;
            Ok(())
        }
    }
}

/// 处理通知消息
async fn handle_notification(msg: RpcMessage, connection: &DockConnection) -> Result<(), String> {
    let method = msg.method.as_deref().ok_or("通知消息缺少方法名")?;

    match method {
        methods::HEARTBEAT => {
            let heartbeat: HeartbeatRequest = msg
                .parse_payload()
                .map_err(|e| format!("解析心跳失败: {}", e))?;
            connection.update_heartbeat().await;
            debug!("收到心跳: node_id={}, timestamp={}", heartbeat.node_id, heartbeat.timestamp);
            Ok(())
        }
        methods::POOL_INVENTORY => {
            let inventory: PoolInventory = msg
                .parse_payload()
                .map_err(|e| format!("解析存储池清单失败: {}", e))?;
            info!("📦 收到存储池清单: node_id={}, pools={}",
                  inventory.node_id, inventory.pools.len());
            connection.update_pools(inventory.pools).await;
            Ok(())
        }
        _ => {
            warn!("未知的通知方法: {}", method);
            Ok(())
        }
    }
}

/// 解析 WebSocket 消息为 RPC 消息，控制帧返回 `None`
fn parse_websocket_message(ws_msg: AxumWsMessage) -> Result<Option<RpcMessage>, String> {
    match ws_msg {
        AxumWsMessage::Text(text) => RpcMessage::from_json(&text)
            .map(Some)
            .map_err(|e| format!("解析 JSON 失败: {}", e)),
        AxumWsMessage::Binary(data) => {
            let text = String::from_utf8(data)
                .map_err(|e| format!("二进制转字符串失败: {}", e))?;
            RpcMessage::from_json(&text)
                .map(Some)
                .map_err(|e| format!("解析 JSON 失败: {}", e))
        }
        AxumWsMessage::Close(_) => Err("连接关闭".to_string()),
        _ => Ok(None),
    }
}

/// 发送 RPC 消息
async fn send_message(
    sender: &mut SplitSink<WebSocket, AxumWsMessage>,
    msg: RpcMessage,
) -> Result<(), String> {
    let json = msg.to_json()
        .map_err(|e| format!("序列化消息失败: {}", e))?;

    sender.send(AxumWsMessage::Text(json))
        .await
        .map_err(|e| format!("发送 WebSocket 消息失败: {}", e))
}
