/// 卷控制器
///
/// 创建和查询类操作返回 `Result`：传输失败为 `Error::Rpc`，Dock 业务错误为 `Error::Dock`。
/// 删除类操作总是返回 `Response`，失败时状态为 `Failure`

use common::models::{
    DockSpec, Response, StoragePoolSpec, VolumeAttachmentSpec, VolumeSnapshotSpec, VolumeSpec,
};
use common::ws_rpc::types::*;
use common::ws_rpc::RpcError;
use common::{Error, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{debug, error, warn};

use super::dock_client::DockConnector;

/// 将 Dock 响应整理为指定类型的结果
pub fn normalize_response<T: DeserializeOwned>(response: DockResponse) -> Result<T> {
    if let Some(err) = response.error {
        return Err(Error::Dock {
            code: err.code,
            description: err.description,
        });
    }

    let result = response
        .result
        .ok_or_else(|| Error::Internal("Dock 响应缺少结果".to_string()))?;

    Ok(serde_json::from_str(&result.message)?)
}

/// 卷控制器
pub struct VolumeController<C> {
    connector: C,
    dock: RwLock<Option<DockSpec>>,
}

impl<C: DockConnector> VolumeController<C> {
    pub fn new(connector: C) -> Self {
        Self {
            connector,
            dock: RwLock::new(None),
        }
    }

    /// 设置目标 Dock
    pub async fn set_dock(&self, dock: DockSpec) {
        debug!("设置目标 Dock: id={}, endpoint={}", dock.id, dock.endpoint);
        *self.dock.write().await = Some(dock);
    }

    /// 推送 Dock 描述并调用方法，无论成功与否都会关闭客户端
    async fn invoke<P: Serialize>(
        &self,
        method: &str,
        opts: &P,
    ) -> std::result::Result<DockResponse, RpcError> {
        let dock = self
            .dock
            .read()
            .await
            .clone()
            .ok_or_else(|| RpcError::invalid_request("未设置目标 Dock"))?;
        let payload = serde_json::to_value(opts)?;

        let mut client = self.connector.new_client();
        let result = match client.update(&dock).await {
            Ok(()) => client.call(method, payload).await,
            Err(e) => Err(e),
        };
        client.close().await;

        if let Err(e) = &result {
            error!("调用 Dock 失败: method={}, dock={}, error={}", method, dock.endpoint, e);
        }
        result
    }

    /// 调用并解析返回的资源对象
    async fn fetch<P: Serialize, T: DeserializeOwned>(&self, method: &str, opts: &P) -> Result<T> {
        let response = self.invoke(method, opts).await?;
        normalize_response(response).map_err(|e| {
            warn!("Dock 操作失败: method={}, error={}", method, e);
            e
        })
    }

    /// 调用不返回资源对象的操作
    async fn remove<P: Serialize>(&self, method: &str, opts: &P) -> Response {
        let response = match self.invoke(method, opts).await {
            Ok(response) => response,
            Err(e) => return Response::transport_failure(e.to_string()),
        };

        match (response.error, response.result) {
            (Some(err), _) => {
                warn!("Dock 操作失败: method={}, code={}, description={}",
                      method, err.code, err.description);
                Response::failure(err.code, err.description)
            }
            (None, result) => Response::success(result.map(|r| r.message).unwrap_or_default()),
        }
    }

    pub async fn create_volume(&self, opts: &CreateVolumeOpts) -> Result<VolumeSpec> {
        self.fetch(methods::CREATE_VOLUME, opts).await
    }

    pub async fn pull_volume(&self, opts: &PullVolumeOpts) -> Result<VolumeSpec> {
        self.fetch(methods::PULL_VOLUME, opts).await
    }

    pub async fn delete_volume(&self, opts: &DeleteVolumeOpts) -> Response {
        self.remove(methods::DELETE_VOLUME, opts).await
    }

    pub async fn create_volume_attachment(
        &self,
        opts: &CreateAttachmentOpts,
    ) -> Result<VolumeAttachmentSpec> {
        self.fetch(methods::CREATE_ATTACHMENT, opts).await
    }

    pub async fn delete_volume_attachment(&self, opts: &DeleteAttachmentOpts) -> Response {
        self.remove(methods::DELETE_ATTACHMENT, opts).await
    }

    pub async fn create_volume_snapshot(
        &self,
        opts: &CreateVolumeSnapshotOpts,
    ) -> Result<VolumeSnapshotSpec> {
        self.fetch(methods::CREATE_VOLUME_SNAPSHOT, opts).await
    }

    pub async fn pull_volume_snapshot(
        &self,
        opts: &PullVolumeSnapshotOpts,
    ) -> Result<VolumeSnapshotSpec> {
        self.fetch(methods::PULL_VOLUME_SNAPSHOT, opts).await
    }

    pub async fn delete_volume_snapshot(&self, opts: &DeleteVolumeSnapshotOpts) -> Response {
        self.remove(methods::DELETE_VOLUME_SNAPSHOT, opts).await
    }

    /// 查询 Dock 所连集群的存储池
    pub async fn list_pools(&self) -> Result<Vec<StoragePoolSpec>> {
        self.fetch(methods::LIST_POOLS, &ListPoolsOpts {}).await
    }
}
