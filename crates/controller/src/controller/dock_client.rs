/// Dock 客户端
///
/// 每次调度操作使用一个新客户端：先推送目标 Dock 描述，再发起调用，最后关闭

use async_trait::async_trait;
use common::models::DockSpec;
use common::ws_rpc::{DockResponse, RpcError};
use std::time::Duration;
use tracing::debug;

use crate::ws::DockConnectionManager;

/// Dock 客户端接口
#[async_trait]
pub trait DockClient: Send + Sync {
    /// 设置目标 Dock
    async fn update(&mut self, dock: &DockSpec) -> Result<(), RpcError>;

    /// 调用 Dock 方法
    async fn call(&self, method: &str, payload: serde_json::Value) -> Result<DockResponse, RpcError>;

    /// 释放客户端
    async fn close(&mut self);
}

/// 为每次调度操作创建新客户端
pub trait DockConnector: Send + Sync {
    fn new_client(&self) -> Box<dyn DockClient>;
}

/// 基于 WebSocket 连接管理器的 Dock 客户端
pub struct WsDockClient {
    manager: DockConnectionManager,
    timeout: Duration,
    endpoint: Option<String>,
}

impl WsDockClient {
    pub fn new(manager: DockConnectionManager, timeout: Duration) -> Self {
        Self {
            manager,
            timeout,
            endpoint: None,
        }
    }
}

#[async_trait]
impl DockClient for WsDockClient {
    async fn update(&mut self, dock: &DockSpec) -> Result<(), RpcError> {
        if dock.endpoint.is_empty() {
            return Err(RpcError::invalid_params(format!("Dock {} 缺少 endpoint", dock.name)));
        }
        if !self.manager.is_online(&dock.endpoint).await {
            return Err(RpcError::node_offline(&dock.endpoint));
        }
        self.endpoint = Some(dock.endpoint.clone());
        Ok(())
    }

    async fn call(&self, method: &str, payload: serde_json::Value) -> Result<DockResponse, RpcError> {
        let endpoint = self
            .endpoint
            .as_deref()
            .ok_or_else(|| RpcError::invalid_request("未设置目标 Dock"))?;

        let response = self.manager.call(endpoint, method, payload, self.timeout).await?;
        response.parse_payload()
    }

    async fn close(&mut self) {
        if let Some(endpoint) = self.endpoint.take() {
            debug!("关闭 Dock 客户端: endpoint={}", endpoint);
        }
    }
}

/// 创建 [`WsDockClient`] 的连接器
#[derive(Clone)]
pub struct WsDockConnector {
    manager: DockConnectionManager,
    timeout: Duration,
}

impl WsDockConnector {
    pub fn new(manager: DockConnectionManager, timeout: Duration) -> Self {
        Self { manager, timeout }
    }
}

impl DockConnector for WsDockConnector {
    fn new_client(&self) -> Box<dyn DockClient> {
        Box::new(WsDockClient::new(self.manager.clone(), self.timeout))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::ws_rpc::{RpcErrorCode, RpcMessage};
    use serde_json::json;
    use tokio::sync::mpsc;

    fn dock(endpoint: &str) -> DockSpec {
        DockSpec {
            id: "dock-001".to_string(),
            name: "ceph-dock".to_string(),
            endpoint: endpoint.to_string(),
            driver_name: "ceph".to_string(),
        }
    }

    #[tokio::test]
    async fn test_update_requires_online_dock() {
        let manager = DockConnectionManager::new();
        let mut client = WsDockClient::new(manager, Duration::from_secs(1));

        let err = client.update(&dock("")).await.unwrap_err();
        assert_eq!(err.code, RpcErrorCode::InvalidParams);

        let err = client.update(&dock("dock-1")).await.unwrap_err();
        assert_eq!(err.code, RpcErrorCode::NodeOffline);

        let err = client.call("list_pools", json!({})).await.unwrap_err();
        assert_eq!(err.code, RpcErrorCode::InvalidRequest);
    }

    #[tokio::test]
    async fn test_call_decodes_dock_response() {
        let manager = DockConnectionManager::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let conn = manager
            .register("dock-1".into(), "host-a".into(), "10.0.0.5".into(), "ceph".into(), tx)
            .await;

        tokio::spawn(async move {
            let request = rx.recv().await.unwrap();
            let body = serde_json::to_value(DockResponse::fail("VOLUME_NOT_FOUND", "missing")).unwrap();
            conn.handle_response(RpcMessage::response(request.id, body)).await;
        });

        let connector = WsDockConnector::new(manager, Duration::from_secs(5));
        let mut client = connector.new_client();
        client.update(&dock("dock-1")).await.unwrap();
        let resp = client.call("pull_volume", json!({"id": "x"})).await.unwrap();
        client.close().await;

        assert_eq!(resp.error.unwrap().code, "VOLUME_NOT_FOUND");
    }
}
